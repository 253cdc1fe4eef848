//! Short-link and redirect resolution.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use tracing::{debug, warn};

use crate::browser::user_agent::random_user_agent;

/// Turns a user-supplied URL into the canonical product URL.
#[async_trait]
pub trait ResolveUrl: Send + Sync {
    /// Never fails; on any error the input is returned unchanged.
    async fn resolve(&self, url: &str) -> String;
}

/// Follows redirects with a single GET.
#[derive(Clone)]
pub struct UrlResolver {
    client: Client,
}

impl UrlResolver {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(random_user_agent())
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResolveUrl for UrlResolver {
    async fn resolve(&self, url: &str) -> String {
        match self.client.get(url).send().await {
            Ok(response) => {
                let resolved = response.url().to_string();
                if resolved != url {
                    debug!("Resolved {} -> {}", url, resolved);
                }
                resolved
            }
            Err(e) => {
                warn!("Could not resolve {}, using it as-is: {}", url, e);
                url.to_string()
            }
        }
    }
}

/// Resolver that returns its input, for already-canonical URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl ResolveUrl for PassthroughResolver {
    async fn resolve(&self, url: &str) -> String {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn follows_redirect_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s/abc"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "/hop"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/dp/B0TEST"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dp/B0TEST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let resolver = UrlResolver::new(Duration::from_secs(5)).unwrap();
        let resolved = resolver.resolve(&format!("{}/s/abc", server.uri())).await;
        assert_eq!(resolved, format!("{}/dp/B0TEST", server.uri()));
    }

    #[tokio::test]
    async fn error_status_still_reports_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = UrlResolver::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/dp/B0TEST", server.uri());
        assert_eq!(resolver.resolve(&url).await, url);
    }

    #[tokio::test]
    async fn network_failure_returns_input() {
        let resolver = UrlResolver::new(Duration::from_secs(2)).unwrap();
        let url = "http://127.0.0.1:1/dp/B0TEST";
        assert_eq!(resolver.resolve(url).await, url);
    }

    #[tokio::test]
    async fn malformed_url_returns_input() {
        let resolver = UrlResolver::new(Duration::from_secs(2)).unwrap();
        assert_eq!(resolver.resolve("not a url").await, "not a url");
    }

    #[tokio::test]
    async fn passthrough_returns_input() {
        let url = "https://www.amazon.in/dp/B0TEST";
        assert_eq!(PassthroughResolver.resolve(url).await, url);
    }
}
