//! Error types for the Sleuth research core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering LLM invocation, search, configuration, and research-run domains.

use std::path::PathBuf;

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum SleuthError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions and structured-output coercion.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Model failed to call {tool} tool")]
    MissingToolCall { tool: String },

    #[error("Structured result does not match schema: {message}")]
    SchemaMismatch { message: String },
}

/// Errors from search capabilities.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search provider '{provider}' request failed: {message}")]
    Request { provider: String, message: String },

    #[error("Search provider '{provider}' returned an unreadable response: {message}")]
    ResponseParse { provider: String, message: String },

    #[error("Search provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from a research run or the request that starts one.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Topic is required")]
    EmptyTopic,

    #[error("Invalid research request: {message}")]
    InvalidRequest { message: String },

    #[error("Model call failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
}

/// A type alias for results using the top-level `SleuthError`.
pub type Result<T> = std::result::Result<T, SleuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = SleuthError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_missing_tool_call() {
        let err = LlmError::MissingToolCall {
            tool: "submit_result".into(),
        };
        assert_eq!(err.to_string(), "Model failed to call submit_result tool");
    }

    #[test]
    fn test_error_display_search() {
        let err = SleuthError::Search(SearchError::Request {
            provider: "exa".into(),
            message: "HTTP 503".into(),
        });
        assert_eq!(
            err.to_string(),
            "Search error: Search provider 'exa' request failed: HTTP 503"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = SleuthError::Config(ConfigError::EnvVarMissing {
            var: "EXA_SEARCH_API_KEY".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable not set: EXA_SEARCH_API_KEY"
        );
    }

    #[test]
    fn test_error_display_research() {
        let err = SleuthError::Research(ResearchError::RetriesExhausted {
            attempts: 3,
            message: "timeout".into(),
        });
        assert_eq!(
            err.to_string(),
            "Research error: Model call failed after 3 attempts: timeout"
        );
        assert_eq!(ResearchError::EmptyTopic.to_string(), "Topic is required");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SleuthError = io_err.into();
        assert!(matches!(err, SleuthError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: SleuthError = serde_err.into();
        assert!(matches!(err, SleuthError::Serialization(_)));
    }
}
