//! Static category table. Each category maps to one Google News RSS feed.

use std::fmt;
use std::str::FromStr;

use url::Url;

const SEARCH_BASE_URL: &str = "https://news.google.com/rss/search";
const LOCALE_PARAMS: [(&str, &str); 3] = [("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tech,
    Sports,
    Business,
    Entertainment,
    World,
    Health,
    Science,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Tech,
        Category::Sports,
        Category::Business,
        Category::Entertainment,
        Category::World,
        Category::Health,
        Category::Science,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Tech => "Tech",
            Category::Sports => "Sports",
            Category::Business => "Business",
            Category::Entertainment => "Entertainment",
            Category::World => "World",
            Category::Health => "Health",
            Category::Science => "Science",
        }
    }

    pub fn feed_url(&self) -> &'static str {
        match self {
            Category::Tech => "https://news.google.com/rss/search?q=technology&hl=en-US&gl=US&ceid=US:en",
            Category::Sports => "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNRFp1ZEdvU0FtVnVHZ0pWVXlnQVAB?hl=en-US&gl=US&ceid=US:en",
            Category::Business => "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNRGx6TVdZU0FtVnVHZ0pWVXlnQVAB?hl=en-US&gl=US&ceid=US:en",
            Category::Entertainment => "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNREpxYW5RU0FtVnVHZ0pWVXlnQVAB?hl=en-US&gl=US&ceid=US:en",
            Category::World => "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNRGx1YlY4U0FtVnVHZ0pWVXlnQVAB?hl=en-US&gl=US&ceid=US:en",
            Category::Health => "https://news.google.com/rss/topics/CAAqIQgKIhtDQkFTRGdvSUwyMHZNR3QwTlRFU0FtVnVLQUFQAQ?hl=en-US&gl=US&ceid=US:en",
            Category::Science => "https://news.google.com/rss/topics/CAAqJggKIiBDQkFTRWdvSUwyMHZNRFp0Y1RjU0FtVnVHZ0pWVXlnQVAB?hl=en-US&gl=US&ceid=US:en",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Names match exactly, as stored in user preferences.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Resolves categories to the feed URL that is actually fetched.
///
/// Production code uses [`CategoryTable::google_news`]; a different base can be
/// swapped in to point every category at another host.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    base: Option<Url>,
    search_base: String,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::google_news()
    }
}

impl CategoryTable {
    pub fn google_news() -> Self {
        Self {
            base: None,
            search_base: SEARCH_BASE_URL.to_string(),
        }
    }

    /// Every category resolves to `{base}/{category name}` and searches go to `{base}/search`.
    pub fn with_base(base: &str) -> Result<Self, url::ParseError> {
        let trimmed = base.trim_end_matches('/');
        let base = Url::parse(&format!("{}/", trimmed))?;
        let search_base = base.join("search")?.to_string();
        Ok(Self {
            base: Some(base),
            search_base,
        })
    }

    pub fn feed_url(&self, category: Category) -> String {
        match &self.base {
            None => category.feed_url().to_string(),
            Some(base) => base
                .join(category.name())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| category.feed_url().to_string()),
        }
    }

    /// Search feed URL with the query percent-encoded into `q`.
    pub fn search_url(&self, query: &str) -> Result<String, url::ParseError> {
        let params = std::iter::once(("q", query)).chain(LOCALE_PARAMS);
        Ok(Url::parse_with_params(&self.search_base, params)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.name().parse::<Category>(), Ok(category));
        }
        assert!("tech".parse::<Category>().is_err());
        assert!("Gardening".parse::<Category>().is_err());
    }

    #[test]
    fn google_news_table_uses_static_urls() {
        let table = CategoryTable::google_news();
        assert_eq!(
            table.feed_url(Category::Tech),
            "https://news.google.com/rss/search?q=technology&hl=en-US&gl=US&ceid=US:en"
        );
    }

    #[test]
    fn search_url_encodes_query() {
        let table = CategoryTable::google_news();
        let url = table.search_url("rust & wasm").expect("search url");
        assert_eq!(
            url,
            "https://news.google.com/rss/search?q=rust+%26+wasm&hl=en-US&gl=US&ceid=US%3Aen"
        );
    }

    #[test]
    fn custom_base_rewrites_every_url() {
        let table = CategoryTable::with_base("http://127.0.0.1:1234/").expect("base");
        assert_eq!(table.feed_url(Category::Health), "http://127.0.0.1:1234/Health");
        assert_eq!(
            table.search_url("ai").expect("search url"),
            "http://127.0.0.1:1234/search?q=ai&hl=en-US&gl=US&ceid=US%3Aen"
        );
    }
}
