//! Specification blocks and detail bullets.

use std::collections::BTreeMap;

use super::dom::DomNode;
use crate::models::Specifications;
use crate::profile::SpecSelectors;

pub fn collect_specifications<N: DomNode>(root: &N, selectors: &SpecSelectors) -> Specifications {
    match selectors {
        SpecSelectors::Table { rows, key, value } => {
            let mut table = BTreeMap::new();
            for row in root.select_all(rows) {
                let k = row.select_first(key).map(|n| n.text_content().trim().to_string());
                let v = row.select_first(value).map(|n| n.text_content().trim().to_string());
                if let (Some(k), Some(v)) = (k, v) {
                    if !k.is_empty() && !v.is_empty() {
                        table.insert(k, v);
                    }
                }
            }
            Specifications::Table(table)
        }
        SpecSelectors::Markup { container } => match root.select_first(container) {
            Some(block) => Specifications::Markup {
                html: block.inner_html(),
                text: block.flattened_text(),
            },
            None => Specifications::default(),
        },
    }
}

pub fn collect_bullets<N: DomNode>(root: &N, selector: Option<&str>) -> Vec<String> {
    let Some(selector) = selector else {
        return Vec::new();
    };
    root.select_all(selector)
        .iter()
        .map(|n| n.text_content().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|b| !b.is_empty())
        .collect()
}
