//! marketscrape - product page scraping for Amazon and Flipkart.
//!
//! Drives a headless Chromium through a single product page, waits for the
//! page to settle, and reads a flat product record out of the rendered DOM.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod navigation;
pub mod orchestrator;
pub mod profile;
pub mod resolver;
pub mod server;

pub use error::{BrowserError, ErrorKind, ScrapeError};
pub use orchestrator::Scraper;
pub use models::{ScrapeFailure, ScrapeRequest, ScrapeResult, ScrapedProduct};
pub use profile::{Marketplace, ProfileRegistry, SiteProfile};
pub use config::Config;
