use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::categories::CategoryTable;
use crate::feeds::FeedFetcher;
use crate::models::{Article, FeedSource, PreferenceSet, SEARCH_RESULTS_LABEL};

/// Merges the feeds selected in a preference set into one list.
#[derive(Debug, Clone)]
pub struct Aggregator {
    fetcher: FeedFetcher,
    categories: CategoryTable,
    max_concurrency: usize,
}

impl Aggregator {
    pub fn new(fetcher: FeedFetcher, categories: CategoryTable, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            categories,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Articles for every selected source: categories first, then custom feeds,
    /// each group in preference order. Never fails; unavailable sources add nothing.
    pub async fn aggregate(&self, preferences: Option<&PreferenceSet>) -> Vec<Article> {
        let Some(preferences) = preferences else {
            return Vec::new();
        };

        let sources = preferences.sources();
        let source_count = sources.len();

        // buffered() yields results in input order regardless of completion order
        let batches: Vec<Vec<Article>> = stream::iter(sources)
            .map(|source| async move {
                let url = match &source {
                    FeedSource::Category(category) => self.categories.feed_url(*category),
                    FeedSource::Custom(url) => url.clone(),
                };
                self.fetcher.fetch(&url, source.label()).await
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let empty_sources = batches.iter().filter(|b| b.is_empty()).count();
        let articles: Vec<Article> = batches.into_iter().flatten().collect();
        info!(
            sources = source_count,
            empty_sources,
            articles = articles.len(),
            "aggregator: merged feeds"
        );
        articles
    }

    /// Articles matching a free-text query, from the search feed of the category source.
    pub async fn search(&self, query: &str) -> Vec<Article> {
        match self.categories.search_url(query) {
            Ok(url) => self.fetcher.fetch(&url, SEARCH_RESULTS_LABEL).await,
            Err(e) => {
                warn!(%query, error = %e, "aggregator: could not build search url");
                Vec::new()
            }
        }
    }
}
