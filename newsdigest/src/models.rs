use serde::{Deserialize, Serialize};

use crate::categories::Category;

/// Source label attached to articles coming from a user's own feed URLs.
pub const CUSTOM_FEED_LABEL: &str = "Custom Feed";
/// Source label attached to articles returned by a search.
pub const SEARCH_RESULTS_LABEL: &str = "Search Results";

/// One normalized news item, as returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub image: Option<String>,
    /// Plain text, never longer than `feeds::SNIPPET_MAX_CHARS` characters
    pub snippet: String,
    /// Timestamp as provided by the feed, not interpreted further
    pub published: Option<String>,
    pub source: String,
}

/// Where a batch of articles comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Category(Category),
    Custom(String),
}

impl FeedSource {
    pub fn label(&self) -> &str {
        match self {
            FeedSource::Category(category) => category.name(),
            FeedSource::Custom(_) => CUSTOM_FEED_LABEL,
        }
    }
}

/// A user's selection of categories and custom feed URLs.
///
/// Both lists behave as ordered sets: insertion order is preserved and
/// re-adding an existing entry is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSet {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub custom_feeds: Vec<String>,
}

impl PreferenceSet {
    pub fn new<C, F>(categories: C, custom_feeds: F) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let mut prefs = Self::default();
        prefs.set_categories(categories);
        for feed in custom_feeds {
            prefs.add_custom_feed(feed);
        }
        prefs
    }

    /// Replace the category selection, dropping repeated names.
    pub fn set_categories<C>(&mut self, categories: C)
    where
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.categories.clear();
        for category in categories {
            let category = category.into();
            if !self.categories.contains(&category) {
                self.categories.push(category);
            }
        }
    }

    /// Returns false when the feed was already present.
    pub fn add_custom_feed(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.custom_feeds.contains(&url) {
            return false;
        }
        self.custom_feeds.push(url);
        true
    }

    /// Returns false when the feed was not present.
    pub fn remove_custom_feed(&mut self, url: &str) -> bool {
        let before = self.custom_feeds.len();
        self.custom_feeds.retain(|feed| feed != url);
        self.custom_feeds.len() != before
    }

    /// Sources to fetch, categories first then custom feeds, each in preference order.
    /// Category names that are not in the static table are skipped.
    pub fn sources(&self) -> Vec<FeedSource> {
        self.categories
            .iter()
            .filter_map(|name| name.parse::<Category>().ok())
            .map(FeedSource::Category)
            .chain(self.custom_feeds.iter().cloned().map(FeedSource::Custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_feeds_behave_as_a_set() {
        let mut prefs = PreferenceSet::default();
        assert!(prefs.add_custom_feed("http://a/feed"));
        assert!(prefs.add_custom_feed("http://b/feed"));
        assert!(!prefs.add_custom_feed("http://a/feed"));
        assert_eq!(prefs.custom_feeds, vec!["http://a/feed", "http://b/feed"]);

        assert!(prefs.remove_custom_feed("http://a/feed"));
        assert!(!prefs.remove_custom_feed("http://a/feed"));
        assert_eq!(prefs.custom_feeds, vec!["http://b/feed"]);
    }

    #[test]
    fn sources_skip_unknown_categories_and_keep_order() {
        let prefs = PreferenceSet::new(["Science", "Gardening", "Tech"], ["http://x/feed"]);
        let sources = prefs.sources();

        assert_eq!(
            sources,
            vec![
                FeedSource::Category(Category::Science),
                FeedSource::Category(Category::Tech),
                FeedSource::Custom("http://x/feed".to_string()),
            ]
        );
        let labels: Vec<&str> = sources.iter().map(FeedSource::label).collect();
        assert_eq!(labels, vec!["Science", "Tech", "Custom Feed"]);
    }

    #[test]
    fn article_serializes_with_api_field_names() {
        let article = Article {
            title: "t".into(),
            link: "http://l".into(),
            image: None,
            snippet: "s".into(),
            published: Some("Mon, 01 Jan 2024 00:00:00 +0000".into()),
            source: "Tech".into(),
        };
        let value = serde_json::to_value(&article).expect("serialize");
        assert_eq!(value["image"], serde_json::Value::Null);
        assert_eq!(value["source"], "Tech");
        assert_eq!(value["published"], "Mon, 01 Jan 2024 00:00:00 +0000");
    }
}
