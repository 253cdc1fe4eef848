//! Request and result records for one scrape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ScrapeError};
use crate::profile::Marketplace;

/// Input to one scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    /// Skip host classification and use this marketplace's profile.
    #[serde(default)]
    pub marketplace: Option<Marketplace>,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            marketplace: None,
        }
    }

    pub fn with_marketplace(mut self, marketplace: Marketplace) -> Self {
        self.marketplace = Some(marketplace);
        self
    }
}

/// Specification block, in whichever shape the marketplace provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Specifications {
    /// Markup and flattened text of a block without row structure.
    Markup { html: String, text: String },
    /// Key/value pairs built from table rows.
    Table(BTreeMap<String, String>),
}

impl Default for Specifications {
    fn default() -> Self {
        Specifications::Table(BTreeMap::new())
    }
}

impl Specifications {
    pub fn is_empty(&self) -> bool {
        match self {
            Specifications::Table(map) => map.is_empty(),
            Specifications::Markup { html, text } => html.is_empty() && text.is_empty(),
        }
    }
}

/// Fields read from one rendered product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "priceBlockText", skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    #[serde(rename = "discount", skip_serializing_if = "Option::is_none")]
    pub discount_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ratings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_reviews: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_info_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(rename = "fullDescription", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews_medley_text: Option<String>,
    #[serde(default)]
    pub top_reviews: Vec<String>,
    #[serde(default)]
    pub specifications: Specifications,
    #[serde(default)]
    pub feature_bullets: Vec<String>,
}

impl RawExtraction {
    /// Number of single-valued fields that resolved to something.
    pub fn resolved_field_count(&self) -> usize {
        [
            &self.title,
            &self.price_text,
            &self.discount_text,
            &self.image_url,
            &self.rating,
            &self.total_ratings,
            &self.total_reviews,
            &self.availability,
            &self.delivery_time,
            &self.service_info_text,
            &self.category,
            &self.subcategory,
            &self.brand,
            &self.description,
            &self.reviews_medley_text,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// Successful scrape: the extracted fields plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    #[serde(flatten)]
    pub fields: RawExtraction,
    pub marketplace: Marketplace,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
}

/// Failed scrape, classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeFailure {
    pub kind: ErrorKind,
    /// Internal description for logs; not meant for end users.
    pub detail: String,
    /// `<title>` of the page that was loaded, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

impl ScrapeFailure {
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<ScrapeError> for ScrapeFailure {
    fn from(err: ScrapeError) -> Self {
        let kind = err.kind();
        let detail = err.to_string();
        let page_title = match err {
            ScrapeError::MissingTitle { page_title } => page_title,
            _ => None,
        };
        Self {
            kind,
            detail,
            page_title,
        }
    }
}

/// Outcome of one scrape: exactly one of success or failure.
#[derive(Debug, Clone)]
pub enum ScrapeResult {
    Success(ScrapedProduct),
    Failure(ScrapeFailure),
}

impl ScrapeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeResult::Success(_))
    }

    pub fn product(&self) -> Option<&ScrapedProduct> {
        match self {
            ScrapeResult::Success(product) => Some(product),
            ScrapeResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScrapeFailure> {
        match self {
            ScrapeResult::Success(_) => None,
            ScrapeResult::Failure(failure) => Some(failure),
        }
    }
}
