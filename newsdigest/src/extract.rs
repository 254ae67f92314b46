use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Node};
use tracing::{info, warn};

use crate::text::truncate_chars;

pub const CONTENT_MAX_CHARS: usize = 5000;

/// Elements whose text never reaches the summarizer.
const STRIPPED_TAGS: [&str; 7] = ["script", "style", "nav", "footer", "header", "noscript", "template"];

/// Reduces arbitrary article pages to bounded plain text.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    client: Client,
    timeout: Duration,
}

impl ContentExtractor {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Returns the cleaned text of the page, or an empty string when the page
    /// could not be fetched or had nothing readable.
    pub async fn extract(&self, url: &str) -> String {
        match self.fetch_page(url).await {
            Ok(Some(html)) => {
                let text = page_text(&html);
                info!(%url, chars = text.chars().count(), "extract: page reduced to text");
                text
            }
            Ok(None) => String::new(),
            Err(e) => {
                warn!(%url, error = %format!("{:#}", e), "extract: failed to fetch article page");
                String::new()
            }
        }
    }

    /// `Ok(None)` for a non-success status or a declared non-HTML content type.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("failed to fetch article page")?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "extract: article fetch failed");
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        if let Some(content_type) = content_type {
            if !is_html(content_type) {
                warn!(%url, %content_type, "extract: not an html page");
                return Ok(None);
            }
        }

        let body = response.text().await.context("failed to read response body")?;
        Ok(Some(body))
    }
}

/// Pages without a `Content-Type` are still parsed; anything declared must be HTML.
fn is_html(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}

/// Visible text of an HTML document, whitespace-normalized and capped at
/// [`CONTENT_MAX_CHARS`] characters.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let raw = visible_text(&document);
    truncate_chars(&normalize_whitespace(&raw), CONTENT_MAX_CHARS)
}

fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| STRIPPED_TAGS.contains(&el.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

/// Trim every line, split lines on double spaces, and join the non-empty
/// fragments with single spaces.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
