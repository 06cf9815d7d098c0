//! HTML parser for extracting page metadata and links
//!
//! Parsing never fails: html5ever recovers from malformed markup and any
//! field that cannot be found is left empty.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on the combined length of `Info::paragraphs`, in characters
pub const MAX_PARAGRAPH_CHARS: usize = 2000;

/// A discovered link: visible anchor text and absolute target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub value: String,
}

/// Structured content extracted from one HTML page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub description: String,
    pub paragraphs: Vec<String>,
    /// Links seen on this page only, in document order
    pub links: Vec<Token>,
}

/// Parses an HTML document into `Info`
///
/// # Extraction Rules
///
/// - **title**: first `<title>`, falling back to the first `<h1>`
/// - **description**: `<meta name="description">`, falling back to
///   `<meta property="og:description">`
/// - **paragraphs**: `<p>` text with whitespace collapsed, blank entries
///   dropped, capped at [`MAX_PARAGRAPH_CHARS`] in total
/// - **links**: `<a href>` resolved against `base_url`; `javascript:`,
///   `mailto:`, `tel:`, `data:`, fragment-only and non-http(s) targets skipped
///
/// # Example
///
/// ```
/// use crawl_engine::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let info = parse_html(html, &base_url);
/// assert_eq!(info.title, "Test");
/// assert_eq!(info.links[0].value, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> Info {
    let document = Html::parse_document(html);

    Info {
        title: extract_title(&document),
        description: extract_description(&document),
        paragraphs: cap_paragraphs(extract_paragraphs(&document)),
        links: extract_links(&document, base_url),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Concatenates an element's text nodes with whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

fn extract_description(document: &Html) -> String {
    meta_content(document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(document, r#"meta[property="og:description"]"#))
        .unwrap_or_default()
}

fn extract_paragraphs(document: &Html) -> Vec<String> {
    let Some(selector) = selector("p") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Keeps whole paragraphs while the running total fits the cap
///
/// An oversized first paragraph is cut and marked with `...` so a page with
/// one huge block still yields some text.
fn cap_paragraphs(paragraphs: Vec<String>) -> Vec<String> {
    let mut total = 0;
    let mut kept = Vec::with_capacity(paragraphs.len());

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if total + len > MAX_PARAGRAPH_CHARS {
            if kept.is_empty() {
                let mut cut: String = paragraph.chars().take(MAX_PARAGRAPH_CHARS - 3).collect();
                cut.push_str("...");
                kept.push(cut);
            }
            break;
        }
        total += len;
        kept.push(paragraph);
    }

    kept
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Token> {
    let Some(selector) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let value = resolve_link(href, base_url)?;
            Some(Token {
                name: element_text(element),
                value,
            })
        })
        .collect()
}

/// Resolves an href to an absolute http(s) URL, or `None` if it should be skipped
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}
