//! Flipkart product page profile.
//!
//! Flipkart ships obfuscated class names that change with every frontend
//! release, so these lists need refreshing when titles stop resolving.

use super::{
    selectors, FieldSelectors, Marketplace, ReviewSelectors, SiteProfile, SpecSelectors,
};

pub fn profile() -> SiteProfile {
    SiteProfile {
        marketplace: Marketplace::Flipkart,
        host_keyword: "flipkart".to_string(),
        fields: FieldSelectors {
            title: selectors(&[".VU-ZEz"]),
            price: selectors(&[".Nx9bqj.CxhGGd"]),
            discount: selectors(&[".yRaY8j"]),
            image: selectors(&[".DByuf4.IZexXJ.jLEJ7H"]),
            rating: selectors(&[".XQDdHH"]),
            total_ratings: selectors(&[
                ".Wphh3N > span > span:nth-of-type(1)",
                ".Wphh3N > span",
            ]),
            total_reviews: selectors(&[".Wphh3N > span > span:nth-of-type(3)"]),
            availability: selectors(&[".nyRpc8"]),
            brand: selectors(&["._7dPnhA > div:nth-of-type(4) > a"]),
            description: selectors(&[
                ".cPHDOP.pqHCzB",
                ".xFVion",
                "div.DojaWF.gdgoEp > div.cPHDOP.col-12-12:nth-of-type(3)",
            ]),
            delivery_time: Some(selectors(&[".Y8v7Fl", ".yiggsN"])),
            service_info: Some(selectors(&[".jHlbt-", ".cvCpHS"])),
            category: Some(selectors(&["._7dPnhA > div:nth-of-type(2) > a"])),
            subcategory: Some(selectors(&["._7dPnhA > div:nth-of-type(3) > a"])),
            reviews_medley: Some(selectors(&["._8-rIO3", ".HO1dRb"])),
        },
        reviews: ReviewSelectors {
            container: ".col.EPCmJX".to_string(),
            text: ".ZmyHeo".to_string(),
            skip: 1,
        },
        specifications: SpecSelectors::Markup {
            container: concat!(
                "#container > div > div._39kFie.N3De93.JxFEK3._48O0EI",
                " > div.DOjaWF.YJG4Cf > div.DOjaWF.gdgoEp.col-8-12 > div.DOjaWF.gdgoEp"
            )
            .to_string(),
        },
        detail_bullets: None,
        readiness: selectors(&[".VU-ZEz", "._7dPnhA > div:nth-of-type(2) > a"]),
        expanders: selectors(&[".QqFHMw._4FgsLt", ".QqFHMw.ik7Tlh"]),
    }
}
