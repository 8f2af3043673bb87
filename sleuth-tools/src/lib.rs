//! # Sleuth Tools
//!
//! Concrete search capabilities for the Sleuth research engine.
//! Each implements [`SearchProvider`] so the aggregator can fan a query out
//! to web and internal sources alike.

pub mod duckduckgo;
pub mod exa;
pub mod internal;

pub use duckduckgo::DuckDuckGoSearch;
pub use exa::ExaSearch;
pub use internal::InternalSearch;

use sleuth_core::config::SearchConfig;
use sleuth_core::error::SearchError;
use sleuth_core::research::SearchProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Upper bound on DuckDuckGo topics kept per query.
const DUCKDUCKGO_MAX_RESULTS: usize = 10;

/// Build every search provider enabled in `config`.
pub fn build_search_providers(
    config: &SearchConfig,
) -> Result<Vec<Arc<dyn SearchProvider>>, SearchError> {
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();

    if let Some(exa) = &config.exa {
        providers.push(Arc::new(ExaSearch::new(exa, config.timeout_secs)?));
    }
    if config.duckduckgo {
        providers.push(Arc::new(DuckDuckGoSearch::new(
            DUCKDUCKGO_MAX_RESULTS,
            config.timeout_secs,
        )?));
    }
    if let Some(internal) = &config.internal {
        providers.push(Arc::new(InternalSearch::new(internal, config.timeout_secs)?));
    }

    if providers.is_empty() {
        return Err(SearchError::NotConfigured {
            provider: "search".to_string(),
            reason: "no search provider is enabled".to_string(),
        });
    }

    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    info!(providers = ?names, "Search providers ready");
    Ok(providers)
}

pub(crate) fn http_client(provider: &str, timeout_secs: u64) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("Sleuth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SearchError::Request {
            provider: provider.to_string(),
            message: format!("Failed to create HTTP client: {e}"),
        })
}

pub(crate) fn env_key(provider: &str, var: &str) -> Result<String, SearchError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SearchError::NotConfigured {
            provider: provider.to_string(),
            reason: format!("environment variable {var} is not set"),
        })
}
