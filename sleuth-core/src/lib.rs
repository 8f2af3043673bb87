//! # Sleuth Core
//!
//! Core library for the Sleuth deep-research engine.
//! Provides the model invocation layer (brain), LLM providers, the research
//! orchestrator with its search aggregation and activity streaming, the HTTP
//! gateway, configuration, and fundamental types.

pub mod brain;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod research;
pub mod schema;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider, ModelCall, ModelOutput, RetryPolicy};
pub use config::{SleuthConfig, load_config};
pub use error::{ConfigError, LlmError, ResearchError, Result, SearchError, SleuthError};
pub use research::{
    ActivityEvent, ActivityStatus, ActivityType, DeepResearch, ResearchEvent, ResearchOutcome,
    ResearchRequest, ResearchState, SearchAggregator, SearchProvider, SearchResult, StreamSink,
};
pub use types::{CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage};
