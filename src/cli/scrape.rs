//! One-shot scrape command.

use serde_json::json;

use crate::models::{ScrapeRequest, ScrapeResult};
use crate::profile::Marketplace;
use crate::config::Config;

pub async fn cmd_scrape(
    config: &Config,
    url: &str,
    marketplace: Option<Marketplace>,
    resolve: bool,
    pretty: bool,
) -> anyhow::Result<()> {
    let scraper = config.build_scraper(resolve)?;

    let mut request = ScrapeRequest::new(url);
    if let Some(marketplace) = marketplace {
        request = request.with_marketplace(marketplace);
    }

    let (value, ok) = match scraper.scrape(request).await {
        ScrapeResult::Success(product) => (serde_json::to_value(&product)?, true),
        ScrapeResult::Failure(failure) => (
            json!({
                "error": failure.message(),
                "kind": failure.kind,
                "status": failure.status_code(),
                "detail": failure.detail,
                "pageTitle": failure.page_title,
            }),
            false,
        ),
    };

    let output = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{}", output);

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
