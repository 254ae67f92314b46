//! Feed fetcher: one syndication URL in, at most ten normalized articles out.

use std::time::Duration;

use feed_rs::model::{Entry, FeedType};
use feed_rs::parser;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::models::Article;
use crate::text::{strip_html, truncate_chars};

pub const MAX_ARTICLES_PER_FEED: usize = 10;
pub const SNIPPET_MAX_CHARS: usize = 300;
pub const DEFAULT_TITLE: &str = "No Title";

/// Why a single source produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("network error during fetch: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed fetch failed with status: {0}")]
    Status(StatusCode),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// Fetches feeds through a shared HTTP client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    timeout: Duration,
}

impl FeedFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch and normalize a feed. A failing source yields an empty list, the
    /// failure is only logged.
    pub async fn fetch(&self, url: &str, source: &str) -> Vec<Article> {
        match self.try_fetch(url, source).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(%url, %source, error = %e, "feeds: source unavailable");
                Vec::new()
            }
        }
    }

    pub async fn try_fetch(&self, url: &str, source: &str) -> Result<Vec<Article>, FeedError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let bytes = response.bytes().await?;
        let articles = parse_articles(bytes.as_ref(), source)?;
        info!(%url, %source, count = articles.len(), "feeds: fetched");
        Ok(articles)
    }
}

/// Parse a feed document into articles labelled with `source`.
///
/// Pure function of its input: the same bytes always produce the same list.
pub fn parse_articles(body: &[u8], source: &str) -> Result<Vec<Article>, FeedError> {
    let feed = parser::parse(body)?;
    debug!(entries = feed.entries.len(), feed_type = ?feed.feed_type, "feeds: parsed document");

    let articles = feed
        .entries
        .iter()
        .take(MAX_ARTICLES_PER_FEED)
        .map(|entry| EntryFields::from_entry(entry, &feed.feed_type).into_article(source))
        .collect();
    Ok(articles)
}

/// The optional fields we read from a feed entry, extracted once.
#[derive(Debug, Default, Clone, PartialEq)]
struct EntryFields {
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    published: Option<String>,
    media_content: Option<String>,
    media_thumbnail: Option<String>,
    image_enclosure: Option<String>,
}

impl EntryFields {
    fn from_entry(entry: &Entry, feed_type: &FeedType) -> Self {
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone());

        // media:content typed as something other than an image (audio, video) is not a picture
        let media_content = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .filter(|c| {
                c.content_type
                    .as_ref()
                    .map_or(true, |mime| mime.to_string().contains("image"))
            })
            .find_map(|c| c.url.as_ref().map(|u| u.to_string()));

        let media_thumbnail = entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| t.image.uri.clone())
            .find(|uri| !uri.is_empty());

        let image_enclosure = entry
            .links
            .iter()
            .filter(|l| l.rel.as_deref() == Some("enclosure"))
            .find(|l| l.media_type.as_deref().map_or(false, |t| t.contains("image")))
            .map(|l| l.href.clone());

        let published = entry.published.map(|ts| match feed_type {
            FeedType::RSS0 | FeedType::RSS2 => ts.to_rfc2822(),
            _ => ts.to_rfc3339(),
        });

        Self {
            title: entry.title.as_ref().map(|t| t.content.clone()),
            link,
            summary: entry.summary.as_ref().map(|s| s.content.clone()),
            description: entry.content.as_ref().and_then(|c| c.body.clone()),
            published,
            media_content,
            media_thumbnail,
            image_enclosure,
        }
    }

    fn image(&self) -> Option<String> {
        self.media_content
            .clone()
            .or_else(|| self.media_thumbnail.clone())
            .or_else(|| self.image_enclosure.clone())
    }

    fn snippet(&self) -> String {
        self.summary
            .as_deref()
            .or(self.description.as_deref())
            .map(|html| truncate_chars(strip_html(html).trim(), SNIPPET_MAX_CHARS))
            .unwrap_or_default()
    }

    fn into_article(self, source: &str) -> Article {
        Article {
            image: self.image(),
            snippet: self.snippet(),
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            link: self.link.unwrap_or_default(),
            published: self.published,
            source: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rss_with_items(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Test feed</title>
    <link>http://example.com/</link>
    <description>test</description>
    {}
  </channel>
</rss>"#,
            items
        )
    }

    fn numbered_items(n: usize) -> String {
        (0..n)
            .map(|i| {
                format!(
                    "<item><title>Item {i}</title><link>http://example.com/{i}</link>\
                     <description>Body {i}</description></item>"
                )
            })
            .collect()
    }

    #[test]
    fn caps_articles_at_ten() {
        let feed = rss_with_items(&numbered_items(15));
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles.len(), MAX_ARTICLES_PER_FEED);
        assert_eq!(articles[0].title, "Item 0");
        assert_eq!(articles[9].title, "Item 9");
    }

    #[test]
    fn returns_every_entry_below_the_cap() {
        let feed = rss_with_items(&numbered_items(3));
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles.len(), 3);
        assert!(articles.iter().all(|a| a.source == "Tech"));
        assert_eq!(articles[2].link, "http://example.com/2");
    }

    #[test]
    fn missing_title_and_link_get_defaults() {
        let feed = rss_with_items("<item><description>No headline here</description></item>");
        let articles = parse_articles(feed.as_bytes(), "World").expect("parse");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, DEFAULT_TITLE);
        assert_eq!(articles[0].link, "");
        assert_eq!(articles[0].snippet, "No headline here");
        assert_eq!(articles[0].published, None);
    }

    #[test]
    fn snippet_is_plain_text_and_bounded() {
        let long = "word ".repeat(200);
        let item = format!(
            "<item><title>T</title><description><![CDATA[<p><b>Bold</b> {long}</p>]]></description></item>"
        );
        let feed = rss_with_items(&item);
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");

        let snippet = &articles[0].snippet;
        assert!(snippet.starts_with("Bold word"));
        assert!(!snippet.contains('<'));
        assert!(!snippet.contains('>'));
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn media_content_wins_over_thumbnail() {
        let feed = rss_with_items(
            r#"<item><title>T</title>
                <media:thumbnail url="http://img.example.com/thumb.jpg"/>
                <media:content url="http://img.example.com/full.jpg" medium="image"/>
            </item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].image.as_deref(), Some("http://img.example.com/full.jpg"));
    }

    #[test]
    fn thumbnail_used_when_no_media_content() {
        let feed = rss_with_items(
            r#"<item><title>T</title>
                <media:thumbnail url="http://img.example.com/thumb.jpg"/>
            </item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].image.as_deref(), Some("http://img.example.com/thumb.jpg"));
    }

    #[test]
    fn self_closing_media_content_keeps_following_title() {
        let feed = rss_with_items(
            r#"<item><media:content url="http://img.example.com/a.jpg" medium="image"/><title>Real title</title><pubDate>Fri, 15 Mar 2024 09:30:00 GMT</pubDate></item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].title, "Real title");
        assert_eq!(articles[0].image.as_deref(), Some("http://img.example.com/a.jpg"));
        assert_eq!(
            articles[0].published.as_deref(),
            Some("Fri, 15 Mar 2024 09:30:00 +0000")
        );
    }

    #[test]
    fn video_media_content_falls_back_to_thumbnail() {
        let feed = rss_with_items(
            r#"<item><title>Z</title><media:content url="http://cdn.example.com/clip.mp4" type="video/mp4"/><media:thumbnail url="http://img.example.com/t.jpg"/></item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].title, "Z");
        assert_eq!(articles[0].image.as_deref(), Some("http://img.example.com/t.jpg"));
    }

    #[test]
    fn image_enclosure_is_picked_up() {
        let feed = rss_with_items(
            r#"<item><title>T</title>
                <enclosure url="http://img.example.com/enc.png" length="10" type="image/png"/>
            </item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].image.as_deref(), Some("http://img.example.com/enc.png"));
    }

    #[test]
    fn audio_enclosure_is_not_an_image() {
        let feed = rss_with_items(
            r#"<item><title>T</title>
                <enclosure url="http://cdn.example.com/ep.mp3" length="10" type="audio/mpeg"/>
            </item>"#,
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(articles[0].image, None);
    }

    #[test]
    fn atom_entries_use_summary_and_rfc3339_dates() {
        let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:feed</id>
  <updated>2024-03-01T10:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:entry:1</id>
    <link rel="alternate" href="http://example.com/atom/1"/>
    <link rel="enclosure" type="image/jpeg" href="http://img.example.com/a.jpg"/>
    <published>2024-03-01T09:30:00Z</published>
    <updated>2024-03-01T10:00:00Z</updated>
    <summary type="html">&lt;em&gt;Short&lt;/em&gt; summary</summary>
  </entry>
</feed>"#;
        let articles = parse_articles(feed.as_bytes(), "Custom Feed").expect("parse");
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.link, "http://example.com/atom/1");
        assert_eq!(article.snippet, "Short summary");
        assert_eq!(article.image.as_deref(), Some("http://img.example.com/a.jpg"));
        assert_eq!(article.published.as_deref(), Some("2024-03-01T09:30:00+00:00"));
    }

    #[test]
    fn rss_dates_render_as_rfc2822() {
        let feed = rss_with_items(
            "<item><title>T</title><pubDate>Fri, 15 Mar 2024 09:30:00 GMT</pubDate></item>",
        );
        let articles = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(
            articles[0].published.as_deref(),
            Some("Fri, 15 Mar 2024 09:30:00 +0000")
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let feed = rss_with_items(&numbered_items(12));
        let first = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        let second = parse_articles(feed.as_bytes(), "Tech").expect("parse");
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_articles(b"<html><body>not a feed</body></html>", "Tech").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
