//! Error types for the scrape pipeline.
//!
//! `BrowserError` covers the browser automation layer, `ScrapeError` is what
//! the pipeline steps return, and `ErrorKind` is the flat classification that
//! leaves the orchestrator inside a failed `ScrapeResult`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Page script failed: {0}")]
    Script(String),
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unavailable,
}

/// Failures raised by a pipeline step.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL: {0}")]
    InvalidInput(String),
    #[error("No marketplace profile for {0}")]
    UnsupportedSite(String),
    #[error("Anti-bot page detected at {url}")]
    Blocked { url: String },
    #[error("Timed out during {stage}")]
    Timeout { stage: &'static str },
    #[error("No product title found")]
    MissingTitle { page_title: Option<String> },
    #[error(transparent)]
    Session(#[from] BrowserError),
    #[error("Unexpected failure: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::InvalidInput(_) => ErrorKind::InvalidInput,
            ScrapeError::UnsupportedSite(_) => ErrorKind::UnsupportedSite,
            ScrapeError::Blocked { .. } => ErrorKind::Blocked,
            ScrapeError::Timeout { .. } => ErrorKind::Timeout,
            ScrapeError::MissingTitle { .. } => ErrorKind::ExtractionFailure,
            ScrapeError::Session(_) => ErrorKind::Session,
            ScrapeError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Stable failure classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedSite,
    Blocked,
    Timeout,
    ExtractionFailure,
    Session,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind of failure.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput | ErrorKind::UnsupportedSite => 400,
            ErrorKind::Blocked => 429,
            ErrorKind::Timeout => 504,
            ErrorKind::ExtractionFailure | ErrorKind::Session | ErrorKind::Internal => 500,
        }
    }

    /// Short message safe to show to end users.
    ///
    /// Never includes selectors, URLs of intermediate hops or error chains.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "A valid product URL is required.",
            ErrorKind::UnsupportedSite => "This website is not supported.",
            ErrorKind::Blocked => "Request blocked by the marketplace. Try again later.",
            ErrorKind::Timeout => {
                "The request timed out. The website may be slow to respond or is blocking requests."
            }
            ErrorKind::ExtractionFailure => {
                "Could not read the product title. The page structure may have changed."
            }
            ErrorKind::Session | ErrorKind::Internal => "Something went wrong. Please try again.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnsupportedSite => "unsupported_site",
            ErrorKind::Blocked => "blocked",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ExtractionFailure => "extraction_failure",
            ErrorKind::Session => "session",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
