//! Minimal DOM interface the extraction procedure runs against.
//!
//! The procedure only needs CSS queries, text content, attributes and inner
//! markup, so it is written against `DomNode` rather than a browser handle.
//! `HtmlDocument` implements it over a `scraper` parse of the rendered page
//! snapshot.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub trait DomNode: Sized {
    /// First descendant matching `selector`. Invalid selectors match nothing.
    fn select_first(&self, selector: &str) -> Option<Self>;

    /// All descendants matching `selector`, in document order.
    fn select_all(&self, selector: &str) -> Vec<Self>;

    /// Concatenated text of all descendant text nodes.
    fn text_content(&self) -> String;

    /// Visible-ish text: text nodes trimmed, empty ones dropped, one per line.
    fn flattened_text(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    fn inner_html(&self) -> String;
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("Skipping unparseable selector {:?}: {:?}", selector, e);
            None
        }
    }
}

impl<'a> DomNode for ElementRef<'a> {
    fn select_first(&self, selector: &str) -> Option<Self> {
        let sel = parse_selector(selector)?;
        self.select(&sel).next()
    }

    fn select_all(&self, selector: &str) -> Vec<Self> {
        match parse_selector(selector) {
            Some(sel) => self.select(&sel).collect(),
            None => Vec::new(),
        }
    }

    fn text_content(&self) -> String {
        self.text().collect()
    }

    fn flattened_text(&self) -> String {
        self.text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(str::to_string)
    }

    fn inner_html(&self) -> String {
        ElementRef::inner_html(self)
    }
}

/// Parsed snapshot of a rendered page.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// Root `<html>` element.
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Text content of `<body>`, or of the whole document when there is none.
    pub fn body_text(&self) -> String {
        let root = self.root();
        root.select_first("body")
            .unwrap_or(root)
            .text_content()
    }

    /// Contents of `<title>`, trimmed.
    pub fn title(&self) -> Option<String> {
        self.root()
            .select_first("title")
            .map(|t| t.text_content().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}
