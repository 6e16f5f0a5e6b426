//! HTML extraction for records and links
//!
//! This module defines the extraction capability the engine consumes and its
//! default HTML implementation:
//! - One record per element matching a CSS selector (text plus attributes)
//! - Links to follow (from <a> tags and canonical links), returned unresolved

use crate::state::Record;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// What an extractor pulls out of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<Record>,

    /// Raw link targets as they appear on the page
    pub links: Vec<String>,
}

/// Extraction failures; never fatal to the crawl
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Invalid CSS selector '{0}'")]
    InvalidSelector(String),

    #[error("Failed to parse document: {0}")]
    Parse(String),
}

/// The extraction capability consumed by the dispatcher
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Result<Extraction, ExtractError>;
}

/// Extracts the elements matching a CSS selector from HTML pages
///
/// Each matching element becomes one record with a `text` field holding its
/// whitespace-collapsed text and one `@name` field per attribute.
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// `rel="nofollow"` links are followed.
///
/// # Example
///
/// ```
/// use ripple_crawl::crawler::{Extractor, HtmlExtractor};
///
/// let extractor = HtmlExtractor::for_class("prodbox").unwrap();
/// let html = r#"<div class="prodbox">Tea <b>4.50</b></div><a href="/more">More</a>"#;
/// let extraction = extractor.extract(html, Some("text/html")).unwrap();
/// assert_eq!(extraction.records[0].get("text"), Some("Tea 4.50"));
/// assert_eq!(extraction.links, vec!["/more".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    selector: Selector,
    selector_source: String,
    anchors: Selector,
    canonical: Selector,
}

impl HtmlExtractor {
    /// Creates an extractor for an arbitrary CSS selector
    pub fn new(selector: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            selector: parse_selector(selector)?,
            selector_source: selector.to_string(),
            anchors: parse_selector("a[href]")?,
            canonical: parse_selector("link[rel='canonical'][href]")?,
        })
    }

    /// Creates an extractor for the elements carrying a CSS class
    pub fn for_class(class: &str) -> Result<Self, ExtractError> {
        let class = class.trim();
        if class.is_empty() || class.contains(char::is_whitespace) {
            return Err(ExtractError::InvalidSelector(class.to_string()));
        }
        Self::new(&format!(".{}", class))
    }

    /// The selector this extractor was built from
    pub fn selector(&self) -> &str {
        &self.selector_source
    }

    fn records(&self, document: &Html) -> Vec<Record> {
        document
            .select(&self.selector)
            .map(|element| element_record(&element))
            .collect()
    }

    fn links(&self, document: &Html) -> Vec<String> {
        let anchors = document
            .select(&self.anchors)
            .filter(|element| element.value().attr("download").is_none());
        let canonical = document.select(&self.canonical);

        anchors
            .chain(canonical)
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .filter(|href| is_followable(href))
            .map(str::to_string)
            .collect()
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &str, content_type: Option<&str>) -> Result<Extraction, ExtractError> {
        if let Some(content_type) = content_type {
            if !is_html(content_type) {
                return Err(ExtractError::UnsupportedContentType(
                    content_type.to_string(),
                ));
            }
        }

        let document = Html::parse_document(body);
        Ok(Extraction {
            records: self.records(&document),
            links: self.links(&document),
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::InvalidSelector(selector.to_string()))
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

fn element_record(element: &ElementRef<'_>) -> Record {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    let mut record = Record::new().with_field("text", text);
    for (name, value) in element.value().attrs() {
        record.insert(format!("@{}", name), value);
    }
    record
}

/// Returns false for links that can never lead to a crawlable page
fn is_followable(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return false;
    }

    let lower = href.to_ascii_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:"))
}
