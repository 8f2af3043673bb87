//! Search aggregation across every configured search capability.
//!
//! A query is sent to all providers at once and the joined results are
//! normalized. One provider failing never aborts the others; it degrades
//! breadth and is reported as a `search` warning.

use super::activity::{ActivityStatus, ActivityTracker, ActivityType};
use crate::error::SearchError;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A normalized search hit. Internal sources carry a synthetic URL so every
/// result can be treated the same way downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// A single search capability (web, internal, ...).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short identifier used in logs and warnings.
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Truncate `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Fans a query out to every provider and joins the results.
pub struct SearchAggregator {
    providers: Vec<Arc<dyn SearchProvider>>,
    max_content_chars: usize,
}

impl SearchAggregator {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, max_content_chars: usize) -> Self {
        Self {
            providers,
            max_content_chars,
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Query all providers concurrently.
    ///
    /// Results are interleaved round-robin across providers, each keeping its
    /// own ranking, so a later cap still leaves every source represented.
    /// Content is truncated to the configured character budget.
    pub async fn search(&self, query: &str, tracker: &mut ActivityTracker) -> Vec<SearchResult> {
        let outcomes = join_all(self.providers.iter().map(|p| p.search(query))).await;

        let mut per_provider = Vec::with_capacity(self.providers.len());
        for (provider, outcome) in self.providers.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => {
                    debug!(provider = provider.name(), query, count = hits.len(), "Search provider returned");
                    per_provider.push(hits.into_iter().map(|mut hit| {
                        let truncated = truncate_chars(&hit.content, self.max_content_chars);
                        if truncated.len() < hit.content.len() {
                            hit.content = truncated.to_string();
                        }
                        hit
                    }));
                }
                Err(e) => {
                    warn!(provider = provider.name(), query, error = %e, "Search provider failed");
                    tracker.add(
                        ActivityType::Search,
                        ActivityStatus::Warning,
                        format!("Search via {} failed for \"{query}\": {e}", provider.name()),
                    );
                }
            }
        }
        interleave(per_provider)
    }
}

/// Take one item from each iterator in turn until all are drained.
fn interleave<I: Iterator<Item = SearchResult>>(mut sources: Vec<I>) -> Vec<SearchResult> {
    let mut merged = Vec::new();
    loop {
        let before = merged.len();
        for source in sources.iter_mut() {
            if let Some(hit) = source.next() {
                merged.push(hit);
            }
        }
        if merged.len() == before {
            return merged;
        }
    }
}

/// A provider that serves fixed results, or always fails.
///
/// Useful for demos and tests that must not touch the network.
pub struct StaticSearchProvider {
    name: String,
    results: Vec<SearchResult>,
    fail: bool,
}

impl StaticSearchProvider {
    pub fn new(name: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            name: name.into(),
            results,
            fail: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if self.fail {
            return Err(SearchError::Request {
                provider: self.name.clone(),
                message: "provider unavailable".to_string(),
            });
        }
        Ok(self.results.clone())
    }
}
