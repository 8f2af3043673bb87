//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/sleuth/config.toml` and/or `.sleuth/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for Sleuth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub server: ServerConfig,
}

impl SleuthConfig {
    /// Check that every credential the configuration refers to is present.
    ///
    /// Called once at process start; a missing key is fatal for the process,
    /// never for an individual research run.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        let mut required: Vec<&str> = Vec::new();
        if !self.llm.is_local() {
            required.push(&self.llm.api_key_env);
        }
        if let Some(exa) = &self.search.exa {
            required.push(&exa.api_key_env);
        }
        if let Some(internal) = &self.search.internal
            && let Some(var) = &internal.api_key_env
        {
            required.push(var);
        }

        for var in required {
            match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::EnvVarMissing {
                        var: var.to_string(),
                    });
                }
            }
        }

        if !self.search.has_any_provider() {
            return Err(ConfigError::Invalid {
                message: "no search provider is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai", "anthropic", or any OpenAI-compatible endpoint name.
    pub provider: String,
    /// Default model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 8000,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Whether the endpoint is a local server that needs no API key.
    pub fn is_local(&self) -> bool {
        self.base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false)
    }

    /// Validate this LLM config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0; every completion will be empty".to_string());
        }
        warnings
    }
}

/// Search capability configuration. Each enabled provider is queried for every search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Exa neural web search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exa: Option<ExaConfig>,
    /// Keyless DuckDuckGo instant answers.
    #[serde(default)]
    pub duckduckgo: bool,
    /// Internal knowledge-base search endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<InternalSearchConfig>,
    /// Per-request HTTP timeout for every search provider.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exa: None,
            duckduckgo: true,
            internal: None,
            timeout_secs: 20,
        }
    }
}

impl SearchConfig {
    pub fn has_any_provider(&self) -> bool {
        self.exa.is_some() || self.duckduckgo || self.internal.is_some()
    }
}

/// Configuration for the Exa web search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub num_results: usize,
}

impl Default for ExaConfig {
    fn default() -> Self {
        Self {
            api_key_env: "EXA_SEARCH_API_KEY".to_string(),
            base_url: "https://api.exa.ai".to_string(),
            num_results: 5,
        }
    }
}

/// Configuration for an internal knowledge-base search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalSearchConfig {
    /// Full URL accepting `POST {"query": ...}`.
    pub endpoint: String,
    /// Optional bearer token env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Label used in result titles and `internal://<label>/` source URLs.
    pub label: String,
}

/// Tunables for a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Planning cycles before reporting is forced.
    pub max_iterations: usize,
    /// Search results considered per query.
    pub max_search_results: usize,
    /// Character budget for each search result fed into a prompt.
    pub max_content_chars: usize,
    /// Total attempts per model call.
    pub max_retry_attempts: u32,
    /// Base delay for linear retry backoff.
    pub retry_delay_ms: u64,
    /// Upper bound on queries the planner may return per iteration.
    pub max_queries_per_plan: usize,
    /// Per-phase model identifiers; empty strings fall back to `llm.model`.
    #[serde(default)]
    pub models: ResearchModels,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_search_results: 5,
            max_content_chars: 20_000,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            max_queries_per_plan: 3,
            models: ResearchModels::default(),
        }
    }
}

impl ResearchConfig {
    /// Validate the research tunables and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_iterations == 0 {
            warnings.push(
                "max_iterations is 0; reports will be written without any searching".to_string(),
            );
        }
        if self.max_retry_attempts == 0 {
            warnings.push(
                "max_retry_attempts is 0; every model call will fail immediately".to_string(),
            );
        }
        if self.max_content_chars == 0 {
            warnings.push("max_content_chars is 0; search content will be discarded".to_string());
        }
        warnings
    }
}

/// Model identifiers per research phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchModels {
    #[serde(default)]
    pub planning: String,
    #[serde(default)]
    pub extraction: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub report: String,
}

impl ResearchModels {
    /// Fill every unset phase model with `default_model`.
    pub fn resolved(&self, default_model: &str) -> ResearchModels {
        let pick = |m: &str| {
            if m.trim().is_empty() {
                default_model.to_string()
            } else {
                m.to_string()
            }
        };
        ResearchModels {
            planning: pick(&self.planning),
            extraction: pick(&self.extraction),
            analysis: pick(&self.analysis),
            report: pick(&self.report),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. Workspace-local config (`.sleuth/config.toml`)
/// 4. User config (`~/.config/sleuth/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "sleuth", "sleuth") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SLEUTH_LLM__MODEL, SLEUTH_RESEARCH__MAX_ITERATIONS, etc.
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
