//! Amazon product page profile.

use super::{
    selectors, FieldSelectors, Marketplace, ReviewSelectors, SiteProfile, SpecSelectors,
};

pub fn profile() -> SiteProfile {
    SiteProfile {
        marketplace: Marketplace::Amazon,
        host_keyword: "amazon".to_string(),
        fields: FieldSelectors {
            title: selectors(&["span#productTitle", "h1#title span"]),
            price: selectors(&[
                "span#corePrice_feature_div .a-offscreen",
                "span.priceToPay",
                ".a-price > .a-offscreen",
                ".a-price .a-offscreen",
                ".a-price-whole",
                ".a-price-fraction",
            ]),
            discount: selectors(&[
                "span.basisPrice .a-offscreen",
                ".priceBlockStrikePriceString",
                ".aok-inline-block > .a-price > .a-offscreen",
            ]),
            image: selectors(&[
                "img#landingImage",
                r#"meta[property="og:image"]"#,
                ".a-dynamic-image",
            ]),
            rating: selectors(&["#acrPopover a > span", "#acrPopover"]),
            total_ratings: selectors(&["#acrCustomerReviewText"]),
            total_reviews: selectors(&[r#"[data-hook="cr-filter-info-review-rating-count"]"#]),
            availability: selectors(&[
                "#availability span",
                "#availability .a-color-success",
                "#availability .a-color-state",
            ]),
            brand: selectors(&["#bylineInfo", "a#bylineInfo"]),
            description: selectors(&["#productDescription", "#feature-bullets > ul", "#aplus"]),
            delivery_time: Some(selectors(&[
                "#mir-layout-DELIVERY_BLOCK-slot-PRIMARY_DELIVERY_MESSAGE_LARGE .a-text-bold",
                "[data-cy=delivery-recipe]",
            ])),
            service_info: Some(selectors(&[
                "#icon-farm-container",
                "#product-support-information",
            ])),
            category: Some(selectors(&[
                "#wayfinding-breadcrumbs_feature_div ul > li:first-child a",
                ".a-breadcrumb li:first-child a",
            ])),
            subcategory: Some(selectors(&[
                "#wayfinding-breadcrumbs_feature_div ul > li:last-child a",
                ".a-breadcrumb li:last-child a",
            ])),
            reviews_medley: Some(selectors(&["#reviewsMedley #histogramTable"])),
        },
        reviews: ReviewSelectors {
            container: r#"[data-hook="review"]"#.to_string(),
            text: r#"[data-hook="review-body"]"#.to_string(),
            skip: 1,
        },
        specifications: SpecSelectors::Table {
            rows: "#productDetails_techSpec_section_1 tr".to_string(),
            key: "th".to_string(),
            value: "td".to_string(),
        },
        detail_bullets: Some("#detailBullets_feature_div ul li".to_string()),
        readiness: selectors(&[
            "#add-to-cart-button",
            "#buy-now-button",
            "#availability",
            "[data-hook='review-body']",
            "#feature-bullets",
        ]),
        expanders: selectors(&[r#"[data-hook="review-expand-link"]"#]),
    }
}
