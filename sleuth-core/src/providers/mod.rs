//! LLM provider implementations.
//!
//! Provides concrete implementations of the `LlmProvider` trait for:
//! - OpenAI-compatible APIs (OpenAI, Azure, Ollama, vLLM, LM Studio)
//! - Anthropic Messages API (Claude models)
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod anthropic;
pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// Create an LLM provider based on the configuration.
///
/// `"anthropic"` selects the native Messages API; any other provider name is
/// treated as an OpenAI-compatible endpoint.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    tracing::debug!(provider = %config.provider, model = %config.model, "Creating LLM provider");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(config)?)),
        _ => Ok(Arc::new(OpenAiCompatibleProvider::new(config)?)),
    }
}

/// Create a provider using a pre-resolved API key.
pub fn create_provider_with_key(
    config: &LlmConfig,
    api_key: String,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new_with_key(config, api_key)?)),
        _ => Ok(Arc::new(OpenAiCompatibleProvider::new_with_key(
            config, api_key,
        )?)),
    }
}
