//! Marketplace extraction profiles.
//!
//! A `SiteProfile` is declarative: ordered selector lists per product field
//! (first match wins), review and specification sub-selectors, plus the
//! readiness and expansion selectors the navigation step needs. Profiles are
//! built once at startup and shared read-only.

mod amazon;
mod flipkart;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Supported marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Amazon,
    Flipkart,
}

impl Marketplace {
    pub fn as_str(self) -> &'static str {
        match self {
            Marketplace::Amazon => "amazon",
            Marketplace::Flipkart => "flipkart",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amazon" => Ok(Marketplace::Amazon),
            "flipkart" => Ok(Marketplace::Flipkart),
            other => Err(format!(
                "Unknown marketplace '{}'. Valid options: amazon, flipkart",
                other
            )),
        }
    }
}

/// Ordered selector lists for the single-valued product fields.
///
/// `Option` entries distinguish "profile does not define this field" from
/// "defined but nothing matched"; the former is reported as `Not specified`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelectors {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub discount: Vec<String>,
    pub image: Vec<String>,
    pub rating: Vec<String>,
    pub total_ratings: Vec<String>,
    pub total_reviews: Vec<String>,
    pub availability: Vec<String>,
    pub brand: Vec<String>,
    pub description: Vec<String>,
    pub delivery_time: Option<Vec<String>>,
    pub service_info: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    pub subcategory: Option<Vec<String>>,
    pub reviews_medley: Option<Vec<String>>,
}

/// Review container/text pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSelectors {
    pub container: String,
    pub text: String,
    /// Leading containers that belong to another page slot and are skipped.
    pub skip: usize,
}

/// Shape of the specification block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SpecSelectors {
    /// Rows of key/value cells, e.g. a `<tr><th/><td/></tr>` table.
    Table {
        rows: String,
        key: String,
        value: String,
    },
    /// A block with no per-row structure, captured as markup plus text.
    Markup { container: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub marketplace: Marketplace,
    /// Substring of the resolved host that selects this profile.
    pub host_keyword: String,
    pub fields: FieldSelectors,
    pub reviews: ReviewSelectors,
    pub specifications: SpecSelectors,
    pub detail_bullets: Option<String>,
    /// Advisory selectors polled after navigation.
    pub readiness: Vec<String>,
    /// "Read more" style controls clicked before extraction.
    pub expanders: Vec<String>,
}

impl SiteProfile {
    /// Check the profile invariants.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.fields.title.iter().all(|s| s.trim().is_empty()) {
            return Err(ProfileError::MissingTitle(self.marketplace));
        }
        if self.host_keyword.trim().is_empty() {
            return Err(ProfileError::MissingHostKeyword(self.marketplace));
        }
        Ok(())
    }

    /// Expander selectors joined into one selector group.
    pub fn expander_selector(&self) -> Option<String> {
        if self.expanders.is_empty() {
            None
        } else {
            Some(self.expanders.join(", "))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile for {0} has no title selectors")]
    MissingTitle(Marketplace),
    #[error("Profile for {0} has no host keyword")]
    MissingHostKeyword(Marketplace),
}

/// Lookup table from marketplace to profile.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<SiteProfile>,
    fallback: Marketplace,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    /// Empty registry; URLs that match no keyword classify as `fallback`.
    pub fn new(fallback: Marketplace) -> Self {
        Self {
            profiles: Vec::new(),
            fallback,
        }
    }

    /// Registry with the Amazon and Flipkart profiles, Amazon as fallback.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![amazon::profile(), flipkart::profile()],
            fallback: Marketplace::Amazon,
        }
    }

    /// Add or replace a profile.
    pub fn register(&mut self, profile: SiteProfile) -> Result<(), ProfileError> {
        profile.validate()?;
        self.profiles.retain(|p| p.marketplace != profile.marketplace);
        self.profiles.push(profile);
        Ok(())
    }

    pub fn get(&self, marketplace: Marketplace) -> Option<&SiteProfile> {
        self.profiles.iter().find(|p| p.marketplace == marketplace)
    }

    pub fn profiles(&self) -> &[SiteProfile] {
        &self.profiles
    }

    /// Infer the marketplace from a URL's host. Keywords of the other
    /// marketplaces win over the fallback's own keyword.
    pub fn classify(&self, url: &str) -> Marketplace {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_else(|| url.to_lowercase());

        self.profiles
            .iter()
            .filter(|p| p.marketplace != self.fallback)
            .find(|p| host.contains(&p.host_keyword))
            .map(|p| p.marketplace)
            .unwrap_or(self.fallback)
    }

    /// Profile for a resolved URL, or `None` when its marketplace has no
    /// registered profile.
    pub fn profile_for(&self, url: &str) -> Option<&SiteProfile> {
        self.get(self.classify(url))
    }
}

pub(crate) fn selectors(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
