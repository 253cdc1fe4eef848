//! Page load, readiness polling, block detection and content expansion.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::browser::PageSession;
use crate::error::ScrapeError;
use crate::profile::SiteProfile;

/// Text fragments that only appear on anti-automation interstitials.
pub const BLOCK_PHRASES: &[&str] = &[
    "To discuss automated access to Amazon data please contact",
    "Sorry, we just need to make sure you're not a robot",
    "Enter the characters you see below",
    "Type the characters you see in this image",
];

/// Whether rendered page text looks like a CAPTCHA or robot-check page.
pub fn is_block_page(text: &str) -> bool {
    let text = text.to_lowercase();
    BLOCK_PHRASES
        .iter()
        .any(|phrase| text.contains(&phrase.to_lowercase()))
}

const MAX_NAVIGATION_RETRIES: u32 = 2;
const MAX_BLOCK_RETRIES: u32 = 1;

/// Upper bound on "read more" clicks per page.
pub const MAX_EXPAND_CLICKS: usize = 6;

/// Retry bounds for one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra navigation attempts after a navigation timeout.
    pub navigation_retries: u32,
    /// Delay before the first navigation retry; doubles per retry.
    pub backoff_base: Duration,
    /// Extra attempts, with a rotated user agent, after a block page.
    pub block_retries: u32,
}

impl RetryPolicy {
    /// Build a policy; retry counts are clamped to 2 navigation and 1 block
    /// retry.
    pub fn new(navigation_retries: u32, backoff_base: Duration, block_retries: u32) -> Self {
        Self {
            navigation_retries: navigation_retries.min(MAX_NAVIGATION_RETRIES),
            backoff_base,
            block_retries: block_retries.min(MAX_BLOCK_RETRIES),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, 0)
    }

    /// Delay before retry number `attempt` (0-based): base, 2x base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_NAVIGATION_RETRIES, Duration::from_secs(1), MAX_BLOCK_RETRIES)
    }
}

/// Bounded waits used while driving a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationTimings {
    pub navigation_timeout: Duration,
    /// Per-selector readiness budget.
    pub readiness_timeout: Duration,
    pub readiness_poll: Duration,
    /// Pause after readiness polling, before inspecting the page.
    pub settle: Duration,
    /// Pause after expansion clicks, before extraction.
    pub expand_settle: Duration,
    pub expand_stagger: Duration,
    pub max_expand_clicks: usize,
}

impl Default for NavigationTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            readiness_timeout: Duration::from_secs(2),
            readiness_poll: Duration::from_millis(100),
            settle: Duration::from_millis(1000),
            expand_settle: Duration::from_millis(500),
            expand_stagger: Duration::from_millis(120),
            max_expand_clicks: MAX_EXPAND_CLICKS,
        }
    }
}

/// Outcome of a successful navigate-and-verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySignal {
    pub navigation_attempts: u32,
    pub readiness_hits: usize,
    pub readiness_total: usize,
}

/// Drives one page through load, readiness and block checks.
#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    policy: RetryPolicy,
    timings: NavigationTimings,
}

impl NavigationController {
    pub fn new(policy: RetryPolicy, timings: NavigationTimings) -> Self {
        Self { policy, timings }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timings(&self) -> &NavigationTimings {
        &self.timings
    }

    /// Navigate, retrying navigation timeouts with exponential backoff.
    /// Returns the number of attempts made.
    pub async fn navigate(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<u32, ScrapeError> {
        let mut attempt = 0;
        loop {
            debug!("Navigation attempt {} for {}", attempt + 1, url);
            match timeout(self.timings.navigation_timeout, session.navigate(url)).await {
                Ok(Ok(())) => return Ok(attempt + 1),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if attempt < self.policy.navigation_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Navigation to {} timed out after {:?}, retrying in {:?}",
                        url, self.timings.navigation_timeout, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(_) => {
                    warn!("Navigation to {} timed out, giving up", url);
                    return Err(ScrapeError::Timeout { stage: "navigation" });
                }
            }
        }
    }

    /// Poll one selector until it appears or its budget runs out.
    async fn wait_for(&self, session: &mut dyn PageSession, selector: &str) -> bool {
        let deadline = Instant::now() + self.timings.readiness_timeout;
        loop {
            if session.has_element(selector).await {
                return true;
            }
            if Instant::now() + self.timings.readiness_poll > deadline {
                return false;
            }
            sleep(self.timings.readiness_poll).await;
        }
    }

    /// Poll every readiness selector. Misses are not errors.
    pub async fn await_readiness(
        &self,
        session: &mut dyn PageSession,
        profile: &SiteProfile,
    ) -> usize {
        let mut hits = 0;
        for selector in &profile.readiness {
            if self.wait_for(session, selector).await {
                debug!("Readiness selector present: {}", selector);
                hits += 1;
            } else {
                debug!("Readiness selector missing: {}", selector);
            }
        }
        hits
    }

    /// Check the rendered text for a block page.
    pub async fn detect_block(&self, session: &mut dyn PageSession) -> Result<bool, ScrapeError> {
        let text = session.body_text().await?;
        Ok(is_block_page(&text))
    }

    /// Navigate, poll readiness, let the page settle and reject block pages.
    pub async fn navigate_and_verify(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        profile: &SiteProfile,
    ) -> Result<ReadySignal, ScrapeError> {
        let navigation_attempts = self.navigate(session, url).await?;
        let readiness_hits = self.await_readiness(session, profile).await;
        sleep(self.timings.settle).await;

        if self.detect_block(session).await? {
            warn!("Block page detected at {}", url);
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            });
        }

        let signal = ReadySignal {
            navigation_attempts,
            readiness_hits,
            readiness_total: profile.readiness.len(),
        };
        info!(
            "Page ready: {}/{} readiness selectors after {} attempt(s)",
            signal.readiness_hits, signal.readiness_total, signal.navigation_attempts
        );
        Ok(signal)
    }

    /// Click the profile's "read more" controls and wait for the page to
    /// re-render. Failures only cost the expanded text.
    pub async fn expand_collapsed(
        &self,
        session: &mut dyn PageSession,
        profile: &SiteProfile,
    ) -> usize {
        let Some(selector) = profile.expander_selector() else {
            return 0;
        };

        let clicked = match session
            .click_all(
                &selector,
                self.timings.max_expand_clicks.min(MAX_EXPAND_CLICKS),
                self.timings.expand_stagger,
            )
            .await
        {
            Ok(n) => n,
            Err(e) => {
                warn!("Expanding collapsed content failed: {}", e);
                0
            }
        };

        if clicked > 0 {
            debug!("Clicked {} expansion controls", clicked);
            sleep(self.timings.expand_settle).await;
        }
        clicked
    }
}

/// Serialisable navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_expand_settle_ms")]
    pub expand_settle_ms: u64,
    #[serde(default = "default_expand_stagger_ms")]
    pub expand_stagger_ms: u64,
    #[serde(default = "default_max_expand_clicks")]
    pub max_expand_clicks: usize,
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_block_retries")]
    pub block_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_readiness_timeout_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_expand_settle_ms() -> u64 {
    500
}

fn default_expand_stagger_ms() -> u64 {
    120
}

fn default_max_expand_clicks() -> usize {
    MAX_EXPAND_CLICKS
}

fn default_navigation_retries() -> u32 {
    MAX_NAVIGATION_RETRIES
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_block_retries() -> u32 {
    MAX_BLOCK_RETRIES
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            settle_ms: default_settle_ms(),
            expand_settle_ms: default_expand_settle_ms(),
            expand_stagger_ms: default_expand_stagger_ms(),
            max_expand_clicks: default_max_expand_clicks(),
            navigation_retries: default_navigation_retries(),
            backoff_ms: default_backoff_ms(),
            block_retries: default_block_retries(),
        }
    }
}

impl NavigationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.navigation_retries,
            Duration::from_millis(self.backoff_ms),
            self.block_retries,
        )
    }

    pub fn timings(&self) -> NavigationTimings {
        NavigationTimings {
            navigation_timeout: Duration::from_secs(self.timeout_secs),
            readiness_timeout: Duration::from_millis(self.readiness_timeout_ms),
            readiness_poll: Duration::from_millis(100),
            settle: Duration::from_millis(self.settle_ms),
            expand_settle: Duration::from_millis(self.expand_settle_ms),
            expand_stagger: Duration::from_millis(self.expand_stagger_ms),
            max_expand_clicks: self.max_expand_clicks.min(MAX_EXPAND_CLICKS),
        }
    }

    pub fn controller(&self) -> NavigationController {
        NavigationController::new(self.retry_policy(), self.timings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::PageSession;
    use crate::error::{BrowserError, ErrorKind};
    use crate::profile::{Marketplace, ProfileRegistry};
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};

    enum Nav {
        Hang,
        Ok,
        Fail,
    }

    struct ScriptedSession {
        navigations: VecDeque<Nav>,
        attempts: u32,
        present: HashSet<String>,
        body: String,
        clicked_with: Option<(String, usize)>,
    }

    impl ScriptedSession {
        fn new(navigations: Vec<Nav>, body: &str) -> Self {
            Self {
                navigations: navigations.into(),
                attempts: 0,
                present: HashSet::new(),
                body: body.to_string(),
                clicked_with: None,
            }
        }
    }

    #[async_trait]
    impl PageSession for ScriptedSession {
        async fn set_user_agent(&mut self, _user_agent: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            self.attempts += 1;
            match self.navigations.pop_front().unwrap_or(Nav::Ok) {
                Nav::Hang => std::future::pending().await,
                Nav::Ok => Ok(()),
                Nav::Fail => Err(BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())),
            }
        }

        async fn has_element(&mut self, selector: &str) -> bool {
            self.present.contains(selector)
        }

        async fn body_text(&mut self) -> Result<String, BrowserError> {
            Ok(self.body.clone())
        }

        async fn click_all(
            &mut self,
            selector: &str,
            max: usize,
            _stagger: Duration,
        ) -> Result<usize, BrowserError> {
            self.clicked_with = Some((selector.to_string(), max));
            Ok(3)
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        async fn title(&mut self) -> Option<String> {
            None
        }

        async fn release(self: Box<Self>) {}
    }

    fn amazon() -> SiteProfile {
        ProfileRegistry::builtin()
            .get(Marketplace::Amazon)
            .cloned()
            .unwrap()
    }

    #[test]
    fn block_phrases_match_case_insensitively() {
        assert!(is_block_page(
            "... sorry, we just need to make sure you're NOT A ROBOT ..."
        ));
        assert!(is_block_page("Enter the characters you see below"));
        assert!(!is_block_page("Add to Cart"));
    }

    #[test]
    fn retry_counts_are_clamped() {
        let policy = RetryPolicy::new(9, Duration::from_secs(1), 4);
        assert_eq!(policy.navigation_retries, 2);
        assert_eq!(policy.block_retries, 1);
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout_is_retried_with_backoff() {
        let controller = NavigationController::default();
        let mut session = ScriptedSession::new(vec![Nav::Hang, Nav::Ok], "");

        let started = Instant::now();
        let attempts = controller
            .navigate(&mut session, "https://www.amazon.in/dp/B0")
            .await
            .unwrap();

        assert_eq!(attempts, 2);
        // One 30s timeout plus the 1s backoff.
        assert!(started.elapsed() >= Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_gives_up_after_retries() {
        let controller = NavigationController::default();
        let mut session = ScriptedSession::new(vec![Nav::Hang, Nav::Hang, Nav::Hang, Nav::Ok], "");

        let err = controller
            .navigate(&mut session, "https://www.amazon.in/dp/B0")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(session.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_errors_are_not_retried() {
        let controller = NavigationController::default();
        let mut session = ScriptedSession::new(vec![Nav::Fail, Nav::Ok], "");

        let err = controller
            .navigate(&mut session, "https://www.amazon.in/dp/B0")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Session);
        assert_eq!(session.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_readiness_selectors_are_not_fatal() {
        let controller = NavigationController::default();
        let profile = amazon();
        let mut session = ScriptedSession::new(vec![Nav::Ok], "Add to Cart");
        session.present.insert("#availability".to_string());

        let signal = controller
            .navigate_and_verify(&mut session, "https://www.amazon.in/dp/B0", &profile)
            .await
            .unwrap();
        assert_eq!(signal.readiness_hits, 1);
        assert_eq!(signal.readiness_total, profile.readiness.len());
    }

    #[tokio::test(start_paused = true)]
    async fn block_page_is_reported() {
        let controller = NavigationController::default();
        let mut session = ScriptedSession::new(
            vec![Nav::Ok],
            "Type the characters you see in this image",
        );

        let err = controller
            .navigate_and_verify(&mut session, "https://www.amazon.in/dp/B0", &amazon())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Blocked);
    }

    #[tokio::test(start_paused = true)]
    async fn expansion_clicks_bounded_controls() {
        let controller = NavigationController::default();
        let mut session = ScriptedSession::new(vec![], "");

        let clicked = controller.expand_collapsed(&mut session, &amazon()).await;
        assert_eq!(clicked, 3);
        let (selector, max) = session.clicked_with.unwrap();
        assert_eq!(selector, r#"[data-hook="review-expand-link"]"#);
        assert_eq!(max, 6);
    }

    #[test]
    fn config_builds_timings() {
        let config: NavigationConfig =
            toml::from_str("timeout_secs = 45\nblock_retries = 3").unwrap();
        let timings = config.timings();
        assert_eq!(timings.navigation_timeout, Duration::from_secs(45));
        assert_eq!(timings.max_expand_clicks, 6);
        assert_eq!(config.retry_policy().block_retries, 1);
    }

    #[test]
    fn configured_expand_clicks_are_clamped() {
        let config: NavigationConfig = toml::from_str("max_expand_clicks = 100").unwrap();
        assert_eq!(config.timings().max_expand_clicks, MAX_EXPAND_CLICKS);

        let config: NavigationConfig = toml::from_str("max_expand_clicks = 2").unwrap();
        assert_eq!(config.timings().max_expand_clicks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_click_budget_is_capped() {
        let timings = NavigationTimings {
            max_expand_clicks: 100,
            ..Default::default()
        };
        let controller = NavigationController::new(RetryPolicy::default(), timings);
        let mut session = ScriptedSession::new(vec![], "");

        controller.expand_collapsed(&mut session, &amazon()).await;
        let (_, max) = session.clicked_with.unwrap();
        assert_eq!(max, MAX_EXPAND_CLICKS);
    }
}
