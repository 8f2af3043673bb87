//! DuckDuckGo instant answers.
//!
//! Keyless fallback web search. Only the abstract and related topics are
//! available, so content is short compared to full-page providers.

use crate::http_client;
use async_trait::async_trait;
use serde_json::Value;
use sleuth_core::error::SearchError;
use sleuth_core::research::{SearchProvider, SearchResult};
use tracing::debug;

const PROVIDER: &str = "duckduckgo";
const DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com";

/// Web search using the DuckDuckGo instant answer API.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize, timeout_secs: u64) -> Result<Self, SearchError> {
        Self::with_base_url(DEFAULT_BASE_URL, max_results, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        max_results: usize,
        timeout_secs: u64,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results,
        })
    }
}

/// Topic texts read "Title - description"; use the part before the dash as title.
fn split_topic_text(text: &str) -> (&str, &str) {
    match text.split_once(" - ") {
        Some((title, rest)) if !title.is_empty() => (title, rest),
        _ => (text, text),
    }
}

fn push_topic(results: &mut Vec<SearchResult>, topic: &Value) {
    let (Some(text), Some(url)) = (
        topic.get("Text").and_then(|v| v.as_str()),
        topic.get("FirstURL").and_then(|v| v.as_str()),
    ) else {
        return;
    };
    if text.is_empty() || url.is_empty() {
        return;
    }
    let (title, _) = split_topic_text(text);
    results.push(SearchResult::new(title, url, text));
}

/// Normalize an instant-answer response body.
pub(crate) fn parse_results(body: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(abstract_text) = body.get("AbstractText").and_then(|v| v.as_str())
        && !abstract_text.is_empty()
    {
        let url = body
            .get("AbstractURL")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let title = body
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .or_else(|| body.get("AbstractSource").and_then(|v| v.as_str()))
            .unwrap_or("DuckDuckGo");
        if !url.is_empty() {
            results.push(SearchResult::new(title, url, abstract_text));
        }
    }

    for key in ["Results", "RelatedTopics"] {
        let Some(topics) = body.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for topic in topics {
            // Grouped topics nest their entries one level down.
            match topic.get("Topics").and_then(|v| v.as_array()) {
                Some(nested) => nested.iter().for_each(|t| push_topic(&mut results, t)),
                None => push_topic(&mut results, topic),
            }
        }
    }

    results.truncate(max_results);
    results
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Request {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        // The API answers with a javascript content type, so decode by hand.
        let text = response.text().await.map_err(|e| SearchError::Request {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        let body: Value = serde_json::from_str(&text).map_err(|e| SearchError::ResponseParse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

        let results = parse_results(&body, self.max_results);
        debug!(query, count = results.len(), "DuckDuckGo search complete");
        Ok(results)
    }
}
