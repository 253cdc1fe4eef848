//! Field extraction over a rendered page.
//!
//! Every single-valued field is resolved by walking its selector list left to
//! right and taking the first selector whose first match yields non-empty
//! trimmed text. Extraction never touches the network; it runs over the DOM
//! snapshot taken after navigation and expansion.

pub mod dom;
pub mod reviews;
pub mod specs;

use tracing::debug;

use crate::models::RawExtraction;
use crate::profile::SiteProfile;
use dom::{DomNode, HtmlDocument};

/// Placeholder for optional fields the profile does not define.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Attributes tried, in order, for image fields.
const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "content"];

/// First non-empty trimmed text among `selectors`.
pub fn first_text<N: DomNode>(root: &N, selectors: &[String]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        root.select_first(selector)
            .map(|node| node.text_content().trim().to_string())
            .filter(|text| !text.is_empty())
    })
}

/// First non-empty trimmed attribute among `selectors`, trying each of
/// `attributes` on a selector's match before moving to the next selector.
pub fn first_attr<N: DomNode>(
    root: &N,
    selectors: &[String],
    attributes: &[&str],
) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let node = root.select_first(selector)?;
        attributes.iter().find_map(|name| {
            node.attr(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    })
}

/// Resolve an optional profile entry; undefined entries yield the
/// `Not specified` placeholder, defined-but-unmatched ones yield `None`.
fn optional_text<N: DomNode>(root: &N, selectors: Option<&Vec<String>>) -> Option<String> {
    match selectors {
        Some(list) => first_text(root, list),
        None => Some(NOT_SPECIFIED.to_string()),
    }
}

/// Run the full extraction procedure against `root`.
pub fn extract<N: DomNode>(root: &N, profile: &SiteProfile) -> RawExtraction {
    let fields = &profile.fields;

    let extraction = RawExtraction {
        title: first_text(root, &fields.title),
        price_text: first_text(root, &fields.price),
        discount_text: first_text(root, &fields.discount),
        image_url: first_attr(root, &fields.image, IMAGE_ATTRIBUTES),
        rating: first_text(root, &fields.rating),
        total_ratings: first_text(root, &fields.total_ratings),
        total_reviews: first_text(root, &fields.total_reviews),
        availability: first_text(root, &fields.availability),
        delivery_time: optional_text(root, fields.delivery_time.as_ref()),
        service_info_text: optional_text(root, fields.service_info.as_ref()),
        category: optional_text(root, fields.category.as_ref()),
        subcategory: optional_text(root, fields.subcategory.as_ref()),
        brand: first_text(root, &fields.brand),
        description: first_text(root, &fields.description),
        reviews_medley_text: fields
            .reviews_medley
            .as_ref()
            .and_then(|list| first_text(root, list)),
        top_reviews: reviews::collect_reviews(root, &profile.reviews),
        specifications: specs::collect_specifications(root, &profile.specifications),
        feature_bullets: specs::collect_bullets(root, profile.detail_bullets.as_deref()),
    };

    debug!(
        "Extracted {} fields, {} reviews, {} bullets for {}",
        extraction.resolved_field_count(),
        extraction.top_reviews.len(),
        extraction.feature_bullets.len(),
        profile.marketplace
    );

    extraction
}

/// Parse a rendered page snapshot and extract from it.
pub fn extract_from_html(html: &str, profile: &SiteProfile) -> RawExtraction {
    let document = HtmlDocument::parse(html);
    extract(&document.root(), profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Specifications;
    use crate::profile::{Marketplace, ProfileRegistry};

    fn amazon() -> SiteProfile {
        ProfileRegistry::builtin()
            .get(Marketplace::Amazon)
            .cloned()
            .unwrap()
    }

    fn flipkart() -> SiteProfile {
        ProfileRegistry::builtin()
            .get(Marketplace::Flipkart)
            .cloned()
            .unwrap()
    }

    #[test]
    fn amazon_title_and_price() {
        let html = r#"<html><body>
            <span id="productTitle">Widget</span>
            <div class="a-price"><span class="a-offscreen">₹499</span></div>
        </body></html>"#;
        let raw = extract_from_html(html, &amazon());
        assert_eq!(raw.title.as_deref(), Some("Widget"));
        assert_eq!(raw.price_text.as_deref(), Some("₹499"));
    }

    #[test]
    fn first_matching_selector_wins() {
        let html = r#"<html><body>
            <p class="b">from B</p>
            <p class="a">from A</p>
            <p class="c">from C</p>
        </body></html>"#;
        let doc = HtmlDocument::parse(html);
        let list = vec![".a".to_string(), ".b".to_string(), ".c".to_string()];
        assert_eq!(first_text(&doc.root(), &list).as_deref(), Some("from A"));

        let list = vec![".missing".to_string(), ".c".to_string(), ".b".to_string()];
        assert_eq!(first_text(&doc.root(), &list).as_deref(), Some("from C"));
    }

    #[test]
    fn blank_match_falls_through_to_next_selector() {
        let doc = HtmlDocument::parse(r#"<p class="a">   </p><p class="b">B</p>"#);
        let list = vec![".a".to_string(), ".b".to_string()];
        assert_eq!(first_text(&doc.root(), &list).as_deref(), Some("B"));
    }

    #[test]
    fn image_prefers_src_then_data_src_then_content() {
        let doc = HtmlDocument::parse(
            r#"<html><head><meta property="og:image" content="https://img/og.jpg"></head>
            <body><img id="lazy" data-src="https://img/lazy.jpg">
            <img id="both" src="https://img/src.jpg" data-src="https://img/other.jpg"></body></html>"#,
        );
        let root = doc.root();
        let pick = |sel: &str| first_attr(&root, &[sel.to_string()], IMAGE_ATTRIBUTES);
        assert_eq!(pick("#both").as_deref(), Some("https://img/src.jpg"));
        assert_eq!(pick("#lazy").as_deref(), Some("https://img/lazy.jpg"));
        assert_eq!(
            pick(r#"meta[property="og:image"]"#).as_deref(),
            Some("https://img/og.jpg")
        );
    }

    #[test]
    fn undefined_optional_fields_use_placeholder() {
        let mut profile = amazon();
        profile.fields.category = None;
        profile.fields.reviews_medley = None;
        let raw = extract_from_html("<html><body></body></html>", &profile);

        assert_eq!(raw.category.as_deref(), Some(NOT_SPECIFIED));
        // Defined but unmatched.
        assert_eq!(raw.subcategory, None);
        assert_eq!(raw.reviews_medley_text, None);
        assert_eq!(raw.title, None);
    }

    #[test]
    fn amazon_page_fills_collections() {
        let html = r#"<html><body>
            <span id="productTitle"> Phone </span>
            <div data-hook="review"><span data-hook="review-body">top slot</span></div>
            <div data-hook="review"><span data-hook="review-body">Nice screen Read more</span></div>
            <table id="productDetails_techSpec_section_1">
                <tr><th>OS</th><td>Android</td></tr>
            </table>
            <div id="detailBullets_feature_div"><ul><li> Made in India </li></ul></div>
        </body></html>"#;
        let raw = extract_from_html(html, &amazon());
        assert_eq!(raw.title.as_deref(), Some("Phone"));
        assert_eq!(raw.top_reviews, vec!["Nice screen"]);
        assert_eq!(raw.feature_bullets, vec!["Made in India"]);
        let Specifications::Table(map) = raw.specifications else {
            panic!("amazon specs should be a table");
        };
        assert_eq!(map["OS"], "Android");
    }

    #[test]
    fn flipkart_page_has_no_bullets_and_markup_specs() {
        let html = r#"<html><body>
            <h1 class="VU-ZEz">Laptop</h1>
            <div class="Nx9bqj CxhGGd">₹54,990</div>
        </body></html>"#;
        let raw = extract_from_html(html, &flipkart());
        assert_eq!(raw.title.as_deref(), Some("Laptop"));
        assert_eq!(raw.price_text.as_deref(), Some("₹54,990"));
        assert!(raw.feature_bullets.is_empty());
        assert!(raw.specifications.is_empty());
    }
}
