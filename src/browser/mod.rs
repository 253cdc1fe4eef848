//! Headless browser sessions.
//!
//! A `SessionLauncher` hands out one `PageSession` per scrape. Each session
//! owns its own browser process (or, when connected to a remote browser, its
//! own isolated browser context) and a single page, with the resource
//! blocking policy, spoofed headers, stealth patches and user agent already
//! applied. Sessions are consumed by `release`, so teardown happens at most
//! once.

pub mod binary;
pub mod chromium;
pub mod config;
pub mod network;
pub mod stealth;
pub mod user_agent;

pub use chromium::ChromiumLauncher;
pub use config::{BrowserLaunchConfig, LaunchPreset};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// A single page in an isolated browser, owned by one scrape.
#[async_trait]
pub trait PageSession: Send {
    /// Replace the user agent for subsequent navigations.
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError>;

    /// Navigate and return once the document has been parsed. Does not wait
    /// for network idle. Callers bound this with their own timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Whether `selector` currently matches an element.
    async fn has_element(&mut self, selector: &str) -> bool;

    /// Text content of the document body.
    async fn body_text(&mut self) -> Result<String, BrowserError>;

    /// Click up to `max` elements matching `selector`, `stagger` apart.
    /// Returns how many were clicked.
    async fn click_all(
        &mut self,
        selector: &str,
        max: usize,
        stagger: Duration,
    ) -> Result<usize, BrowserError>;

    /// Serialized DOM of the page as currently rendered.
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Document title, if the page has one.
    async fn title(&mut self) -> Option<String>;

    /// Tear the session down. Errors are logged, not returned.
    async fn release(self: Box<Self>);
}

/// Creates isolated page sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn acquire(&self, user_agent: &str) -> Result<Box<dyn PageSession>, BrowserError>;
}
