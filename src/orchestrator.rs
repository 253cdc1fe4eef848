//! The scrape pipeline: resolve, classify, launch, navigate, verify, expand,
//! extract, release.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::browser::user_agent::{random_user_agent, rotate_user_agent};
use crate::browser::{PageSession, SessionLauncher};
use crate::error::ScrapeError;
use crate::extract::extract_from_html;
use crate::navigation::NavigationController;
use crate::models::{ScrapeFailure, ScrapeRequest, ScrapeResult, ScrapedProduct};
use crate::profile::{ProfileRegistry, SiteProfile};
use crate::resolver::ResolveUrl;

/// Validate and normalise a raw URL: non-empty, absolute, http(s).
pub fn validate_url(raw: &str) -> Result<String, ScrapeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::InvalidInput("URL is required".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| ScrapeError::InvalidInput(format!("{}: {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(ScrapeError::InvalidInput(format!(
            "unsupported URL scheme '{}' in {}",
            scheme, trimmed
        ))),
    }
}

/// Release `session`, giving up after `limit`.
async fn release_within(session: Box<dyn PageSession>, limit: Duration) {
    match timeout(limit, session.release()).await {
        Ok(()) => debug!("Browser session released"),
        Err(_) => warn!("Browser session release did not finish within {:?}", limit),
    }
}

/// Runs scrapes. Cheap to clone; every call gets its own browser session.
#[derive(Clone)]
pub struct Scraper {
    registry: Arc<ProfileRegistry>,
    resolver: Arc<dyn ResolveUrl>,
    launcher: Arc<dyn SessionLauncher>,
    navigation: NavigationController,
    launch_timeout: Duration,
    request_deadline: Duration,
    release_timeout: Duration,
}

impl Scraper {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        resolver: Arc<dyn ResolveUrl>,
        launcher: Arc<dyn SessionLauncher>,
        navigation: NavigationController,
    ) -> Self {
        Self {
            registry,
            resolver,
            launcher,
            navigation,
            launch_timeout: Duration::from_secs(20),
            request_deadline: Duration::from_secs(60),
            release_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_launch_timeout(mut self, launch_timeout: Duration) -> Self {
        self.launch_timeout = launch_timeout;
        self
    }

    /// Upper bound on a whole scrape, from URL resolution to the end of
    /// extraction. Release has its own budget on top.
    pub fn with_request_deadline(mut self, request_deadline: Duration) -> Self {
        self.request_deadline = request_deadline;
        self
    }

    pub fn with_release_timeout(mut self, release_timeout: Duration) -> Self {
        self.release_timeout = release_timeout;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Run one scrape. Never panics or returns a raw error; every outcome is
    /// a `ScrapeResult`.
    pub async fn scrape(&self, request: ScrapeRequest) -> ScrapeResult {
        let outcome = AssertUnwindSafe(self.run(&request)).catch_unwind().await;
        match outcome {
            Ok(Ok(product)) => {
                info!(
                    "Scraped {} ({} fields, {} reviews)",
                    product.source_url,
                    product.fields.resolved_field_count(),
                    product.fields.top_reviews.len()
                );
                ScrapeResult::Success(product)
            }
            Ok(Err(e)) => {
                warn!("Scrape of {} failed: {}", request.url, e);
                ScrapeResult::Failure(ScrapeFailure::from(e))
            }
            Err(_) => {
                error!("Scrape of {} panicked", request.url);
                ScrapeResult::Failure(ScrapeFailure::from(ScrapeError::Internal(
                    "scrape task panicked".to_string(),
                )))
            }
        }
    }

    async fn run(&self, request: &ScrapeRequest) -> Result<ScrapedProduct, ScrapeError> {
        let url = validate_url(&request.url)?;
        let deadline = Instant::now() + self.request_deadline;

        let resolved = timeout_at(deadline, self.resolver.resolve(&url))
            .await
            .map_err(|_| ScrapeError::Timeout { stage: "request" })?;
        let profile = match request.marketplace {
            Some(marketplace) => self.registry.get(marketplace),
            None => self.registry.profile_for(&resolved),
        }
        .ok_or_else(|| ScrapeError::UnsupportedSite(resolved.clone()))?;
        info!("Using {} profile for {}", profile.marketplace, resolved);

        let user_agent = random_user_agent();
        let mut session = self.acquire(user_agent, deadline).await?;
        debug!("Browser session acquired");

        // The session is released on every path out of here, including a
        // blown request deadline and a panic inside the pipeline.
        let pipeline =
            AssertUnwindSafe(self.drive(session.as_mut(), &resolved, profile, user_agent));
        let outcome = timeout_at(deadline, pipeline.catch_unwind()).await;

        release_within(session, self.release_timeout).await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ScrapeError::Internal("pipeline panicked".to_string())),
            Err(_) => Err(ScrapeError::Timeout { stage: "request" }),
        }
    }

    /// Acquire a session within the launch timeout and what is left of the
    /// request deadline. The launch runs on its own task so that a session
    /// finishing after the timeout is still released.
    async fn acquire(
        &self,
        user_agent: &'static str,
        deadline: Instant,
    ) -> Result<Box<dyn PageSession>, ScrapeError> {
        let launch_deadline = deadline.min(Instant::now() + self.launch_timeout);
        let stage = if launch_deadline < deadline {
            "browser launch"
        } else {
            "request"
        };

        let launcher = Arc::clone(&self.launcher);
        let mut launch = tokio::spawn(async move { launcher.acquire(user_agent).await });

        match timeout_at(launch_deadline, &mut launch).await {
            Ok(Ok(session)) => Ok(session?),
            Ok(Err(e)) => Err(ScrapeError::Internal(format!("browser launch task failed: {}", e))),
            Err(_) => {
                warn!("Browser launch exceeded its budget, releasing it in the background");
                let release_timeout = self.release_timeout;
                tokio::spawn(async move {
                    if let Ok(Ok(session)) = launch.await {
                        debug!("Late browser session arrived, releasing it");
                        release_within(session, release_timeout).await;
                    }
                });
                Err(ScrapeError::Timeout { stage })
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        profile: &SiteProfile,
        user_agent: &'static str,
    ) -> Result<ScrapedProduct, ScrapeError> {
        let mut user_agent = user_agent;
        let mut block_retries = self.navigation.policy().block_retries;

        loop {
            match self.navigation.navigate_and_verify(session, url, profile).await {
                Ok(_) => break,
                Err(ScrapeError::Blocked { .. }) if block_retries > 0 => {
                    block_retries -= 1;
                    user_agent = rotate_user_agent(user_agent);
                    warn!("Blocked at {}, retrying with a different user agent", url);
                    session.set_user_agent(user_agent).await?;
                }
                Err(e) => return Err(e),
            }
        }

        self.navigation.expand_collapsed(session, profile).await;

        let html = session.content().await?;
        let fields = extract_from_html(&html, profile);

        if fields.title.is_none() {
            let page_title = session.title().await;
            warn!(
                "No product title at {} (page title: {})",
                url,
                page_title.as_deref().unwrap_or("unknown")
            );
            return Err(ScrapeError::MissingTitle { page_title });
        }

        Ok(ScrapedProduct {
            fields,
            marketplace: profile.marketplace,
            source_url: url.to_string(),
            scraped_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn url_validation() {
        assert_eq!(
            validate_url("  https://www.amazon.in/dp/B0  ").unwrap(),
            "https://www.amazon.in/dp/B0"
        );
        for bad in ["", "   ", "amazon.in/dp/B0", "ftp://example.com/x", "javascript:alert(1)"] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{:?}", bad);
        }
    }
}
