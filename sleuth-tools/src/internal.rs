//! Internal knowledge-base search.
//!
//! Records from the internal endpoint are normalized to the same
//! title/url/content shape as web results, with `internal://<label>/<id>`
//! URLs and content marked as internal data.

use crate::{env_key, http_client};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use sleuth_core::config::InternalSearchConfig;
use sleuth_core::error::SearchError;
use sleuth_core::research::{SearchProvider, SearchResult};
use tracing::debug;

const PROVIDER: &str = "internal";
pub const INTERNAL_MARKER: &str = "[INTERNAL DATA]";

/// Search against an internal endpoint accepting `POST {"query": ...}`.
pub struct InternalSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    label: String,
}

impl InternalSearch {
    pub fn new(config: &InternalSearchConfig, timeout_secs: u64) -> Result<Self, SearchError> {
        let api_key = config
            .api_key_env
            .as_deref()
            .map(|var| env_key(PROVIDER, var))
            .transpose()?;
        Ok(Self {
            client: http_client(PROVIDER, timeout_secs)?,
            endpoint: config.endpoint.clone(),
            api_key,
            label: config.label.clone(),
        })
    }
}

#[derive(Deserialize)]
struct InternalRecord {
    id: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InternalResponse {
    Wrapped { results: Vec<InternalRecord> },
    Bare(Vec<InternalRecord>),
}

fn record_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalize an internal search response (`{results: [...]}` or a bare array).
pub(crate) fn parse_results(body: &str, label: &str) -> Result<Vec<SearchResult>, SearchError> {
    let response: InternalResponse =
        serde_json::from_str(body).map_err(|e| SearchError::ResponseParse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        })?;
    let records = match response {
        InternalResponse::Wrapped { results } => results,
        InternalResponse::Bare(results) => results,
    };

    Ok(records
        .into_iter()
        .map(|record| {
            let id = record_id(&record.id);
            let title = record
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("{label} record {id}"));
            SearchResult::new(
                title,
                format!("internal://{label}/{}", urlencoding::encode(&id)),
                format!("{INTERNAL_MARKER}\n{}", record.content),
            )
        })
        .collect())
}

#[async_trait]
impl SearchProvider for InternalSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "query": query }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| SearchError::Request {
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

        let results = parse_results(&text, &self.label)?;
        debug!(query, label = %self.label, count = results.len(), "Internal search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_wrapped_results() {
        let body = r#"{"results": [
            {"id": "doc-7", "title": "Procurement policy", "content": "Laptops up to $1200."},
            {"id": 42, "content": "Untitled note"}
        ]}"#;
        let results = parse_results(body, "kb").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Procurement policy");
        assert_eq!(results[0].url, "internal://kb/doc-7");
        assert_eq!(results[0].content, "[INTERNAL DATA]\nLaptops up to $1200.");
        assert_eq!(results[1].title, "kb record 42");
        assert_eq!(results[1].url, "internal://kb/42");
    }

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[{"id": "a b", "title": "Spaces", "content": "x"}]"#;
        let results = parse_results(body, "ontology").unwrap();
        assert_eq!(results[0].url, "internal://ontology/a%20b");
    }

    #[test]
    fn test_parse_invalid_body() {
        let err = parse_results(r#"{"hits": 3}"#, "kb").unwrap_err();
        assert!(matches!(err, SearchError::ResponseParse { .. }));
    }

    #[test]
    fn test_keyless_endpoint() {
        let config = InternalSearchConfig {
            endpoint: "http://127.0.0.1:9/search".to_string(),
            api_key_env: None,
            label: "kb".to_string(),
        };
        let search = InternalSearch::new(&config, 5).unwrap();
        assert!(search.api_key.is_none());
        assert_eq!(search.name(), "internal");
    }
}
