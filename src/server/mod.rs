//! HTTP API for scraping product pages.
//!
//! - `POST /api/scrape` runs one scrape and returns the flat product record
//! - `GET /api/health` reports liveness

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use crate::orchestrator::Scraper;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
}

impl AppState {
    pub fn new(scraper: Scraper) -> Self {
        Self {
            scraper: Arc::new(scraper),
        }
    }
}

/// Start the web server.
pub async fn serve(scraper: Scraper, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(scraper));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::browser::{PageSession, SessionLauncher};
    use crate::error::BrowserError;
    use crate::navigation::{NavigationController, NavigationTimings, RetryPolicy};
    use crate::profile::ProfileRegistry;
    use crate::resolver::PassthroughResolver;

    const PRODUCT_PAGE: &str = r#"<html><head><title>Amazon.in</title></head><body>
        <span id="productTitle">Widget</span>
        <div class="a-price"><span class="a-offscreen">₹499</span></div>
    </body></html>"#;

    struct StaticPage(&'static str);

    #[async_trait]
    impl PageSession for StaticPage {
        async fn set_user_agent(&mut self, _user_agent: &str) -> Result<(), BrowserError> {
            Ok(())
        }
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }
        async fn has_element(&mut self, _selector: &str) -> bool {
            true
        }
        async fn body_text(&mut self) -> Result<String, BrowserError> {
            Ok(self.0.to_string())
        }
        async fn click_all(
            &mut self,
            _selector: &str,
            _max: usize,
            _stagger: Duration,
        ) -> Result<usize, BrowserError> {
            Ok(0)
        }
        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(self.0.to_string())
        }
        async fn title(&mut self) -> Option<String> {
            None
        }
        async fn release(self: Box<Self>) {}
    }

    struct StaticLauncher(Option<&'static str>);

    #[async_trait]
    impl SessionLauncher for StaticLauncher {
        async fn acquire(&self, _user_agent: &str) -> Result<Box<dyn PageSession>, BrowserError> {
            match self.0 {
                Some(html) => Ok(Box::new(StaticPage(html))),
                None => Err(BrowserError::Launch("no chrome here".to_string())),
            }
        }
    }

    fn app(page: Option<&'static str>) -> axum::Router {
        let timings = NavigationTimings {
            settle: Duration::ZERO,
            expand_settle: Duration::ZERO,
            ..Default::default()
        };
        let scraper = Scraper::new(
            Arc::new(ProfileRegistry::builtin()),
            Arc::new(PassthroughResolver),
            Arc::new(StaticLauncher(page)),
            NavigationController::new(RetryPolicy::none(), timings),
        );
        create_router(AppState::new(scraper))
    }

    async fn post_scrape(app: axum::Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/scrape")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn scrape_returns_flat_record() {
        let (status, json) = post_scrape(
            app(Some(PRODUCT_PAGE)),
            r#"{"url": "https://www.amazon.in/dp/B0TEST"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["title"], "Widget");
        assert_eq!(json["priceBlockText"], "₹499");
        assert_eq!(json["marketplace"], "amazon");
        assert!(json["scrapedAt"].is_string());
        assert!(json["topReviews"].is_array());
    }

    #[tokio::test]
    async fn empty_or_missing_url_is_bad_request() {
        for body in [r#"{"url": ""}"#, r#"{}"#, "not json", r#"{"url": "  "}"#] {
            let (status, json) = post_scrape(app(Some(PRODUCT_PAGE)), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
            assert!(json["error"].is_string());
        }
    }

    #[tokio::test]
    async fn unknown_marketplace_is_bad_request() {
        let (status, _) = post_scrape(
            app(Some(PRODUCT_PAGE)),
            r#"{"url": "https://www.amazon.in/dp/B0", "marketplace": "ebay"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn launch_failure_is_server_error_without_details() {
        let (status, json) = post_scrape(
            app(None),
            r#"{"url": "https://www.flipkart.com/p/xyz"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json["error"].as_str().unwrap();
        assert!(!message.contains("no chrome here"));
    }

    #[tokio::test]
    async fn blocked_page_maps_to_too_many_requests() {
        let (status, _) = post_scrape(
            app(Some("<html><body>Enter the characters you see below</body></html>")),
            r#"{"url": "https://www.amazon.in/dp/B0"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
