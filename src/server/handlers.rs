//! HTTP request handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::error::ErrorKind;
use crate::models::{ScrapeRequest, ScrapeResult};
use crate::profile::Marketplace;

/// Body of `POST /api/scrape`. Both fields are optional at the JSON level so
/// a missing URL is reported as a 400 rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub marketplace: Option<String>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn bad_request() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        ErrorKind::InvalidInput.user_message(),
    )
}

pub async fn scrape(
    State(state): State<AppState>,
    body: Result<Json<ScrapeBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => {
            debug!("Rejected scrape body: {}", e);
            return bad_request();
        }
    };

    if body.url.trim().is_empty() {
        return bad_request();
    }

    let mut request = ScrapeRequest::new(body.url);
    if let Some(name) = body.marketplace.as_deref().filter(|m| !m.trim().is_empty()) {
        match name.parse::<Marketplace>() {
            Ok(marketplace) => request = request.with_marketplace(marketplace),
            Err(_) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorKind::UnsupportedSite.user_message(),
                )
            }
        }
    }

    match state.scraper.scrape(request).await {
        ScrapeResult::Success(product) => (StatusCode::OK, Json(product)).into_response(),
        ScrapeResult::Failure(failure) => {
            let status = StatusCode::from_u16(failure.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, failure.message())
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
