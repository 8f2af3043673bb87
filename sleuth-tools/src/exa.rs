//! Exa neural web search.
//!
//! `POST {base}/search` with page text included, so each result already
//! carries the content that extraction reads.

use crate::{env_key, http_client};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sleuth_core::config::ExaConfig;
use sleuth_core::error::SearchError;
use sleuth_core::research::{SearchProvider, SearchResult};
use tracing::debug;

const PROVIDER: &str = "exa";

/// Web search through the Exa API.
pub struct ExaSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    num_results: usize,
}

impl ExaSearch {
    /// Create from configuration, reading the key from `api_key_env`.
    pub fn new(config: &ExaConfig, timeout_secs: u64) -> Result<Self, SearchError> {
        let api_key = env_key(PROVIDER, &config.api_key_env)?;
        Self::with_key(&config.base_url, api_key, config.num_results, timeout_secs)
    }

    pub fn with_key(
        base_url: &str,
        api_key: impl Into<String>,
        num_results: usize,
        timeout_secs: u64,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(PROVIDER, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            num_results,
        })
    }
}

#[derive(Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaHit>,
}

#[derive(Deserialize)]
struct ExaHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

/// Normalize an Exa `/search` response body.
pub(crate) fn parse_results(body: &str) -> Result<Vec<SearchResult>, SearchError> {
    let response: ExaResponse =
        serde_json::from_str(body).map_err(|e| SearchError::ResponseParse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;

    Ok(response
        .results
        .into_iter()
        .filter(|hit| !hit.url.is_empty())
        .map(|hit| {
            let title = hit
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| hit.url.clone());
            SearchResult::new(title, hit.url, hit.text.unwrap_or_default())
        })
        .collect())
}

#[async_trait]
impl SearchProvider for ExaSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let body = json!({
            "query": query,
            "numResults": self.num_results,
            "contents": { "text": true },
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Request {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| SearchError::Request {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(SearchError::Request {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), text),
            });
        }

        let results = parse_results(&text)?;
        debug!(query, count = results.len(), "Exa search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_results() {
        let body = r#"{
            "requestId": "abc",
            "results": [
                {"title": "Best Laptops 2024", "url": "https://a.dev/laptops", "text": "The list..."},
                {"title": null, "url": "https://b.dev/review", "text": "Review body"},
                {"title": "No text", "url": "https://c.dev"}
            ]
        }"#;
        let results = parse_results(body).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Best Laptops 2024");
        assert_eq!(results[0].content, "The list...");
        // A missing title falls back to the URL.
        assert_eq!(results[1].title, "https://b.dev/review");
        assert_eq!(results[2].content, "");
    }

    #[test]
    fn test_parse_results_skips_empty_urls() {
        let body = r#"{"results": [{"title": "x", "url": ""}]}"#;
        assert!(parse_results(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_results_empty_body() {
        assert!(parse_results("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_results_invalid_json() {
        let err = parse_results("<html>").unwrap_err();
        assert!(matches!(err, SearchError::ResponseParse { ref provider, .. } if provider == "exa"));
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let config = ExaConfig {
            api_key_env: "SLEUTH_TEST_UNSET_EXA_KEY".to_string(),
            ..ExaConfig::default()
        };
        let err = ExaSearch::new(&config, 5).err().unwrap();
        assert!(matches!(err, SearchError::NotConfigured { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let exa = ExaSearch::with_key("https://api.exa.ai/", "k", 5, 5).unwrap();
        assert_eq!(exa.base_url, "https://api.exa.ai");
        assert_eq!(exa.name(), "exa");
    }
}
