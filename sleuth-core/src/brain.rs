//! Brain module: LLM provider abstraction and the model invocation layer.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions and the
//! [`Brain`], which wraps a provider with structured-output coercion and
//! retry. Structured results are obtained uniformly through a single forced
//! `submit_result` tool call, whatever the backend.

use crate::config::{LlmConfig, ResearchConfig};
use crate::error::{LlmError, ResearchError};
use crate::research::activity::{ActivityStatus, ActivityTracker, ActivityType};
use crate::research::state::ResearchState;
use crate::schema::OutputSchema;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolChoice,
    ToolDefinition,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the tool the model must call to return a structured result.
pub const SUBMIT_TOOL_NAME: &str = "submit_result";

/// Appended to the system text of every structured call.
pub const STRUCTURED_OUTPUT_INSTRUCTION: &str =
    "IMPORTANT: You must respond ONLY by calling the 'submit_result' tool with your answer.";

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the default model name.
    fn model_name(&self) -> &str;

    /// Return whether this provider supports tool/function calling.
    fn supports_tools(&self) -> bool {
        true
    }
}

/// Linear retry policy: the Nth retry waits `N * delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(
            config.max_retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Delay before the retry that follows `failed_attempts` failures.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        self.delay * failed_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResearchConfig::default())
    }
}

/// A single model invocation request.
#[derive(Debug, Clone)]
pub struct ModelCall {
    /// Model identifier; empty means the provider's default.
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    /// When present, the result must validate against this schema.
    pub schema: Option<&'static OutputSchema>,
    /// Activity type used for retry warnings.
    pub activity_type: ActivityType,
}

impl ModelCall {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            schema: None,
            activity_type: ActivityType::Generate,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: &'static OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_activity(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = activity_type;
        self
    }
}

/// The result of a model invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Text(String),
    Structured(Value),
}

/// The Brain wraps an LLM provider with structured invocation and retry.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    temperature: f32,
    max_tokens: usize,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        let defaults = LlmConfig::default();
        Self {
            provider,
            retry,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Build a brain whose generation settings come from configuration.
    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        llm: &LlmConfig,
        research: &ResearchConfig,
    ) -> Self {
        Self {
            provider,
            retry: RetryPolicy::from_config(research),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Invoke the model with retry, returning free text or a validated value.
    ///
    /// On success the state's token and step counters are advanced exactly
    /// once. Failed attempts never touch the counters.
    pub async fn call_model(
        &self,
        call: ModelCall,
        state: &mut ResearchState,
        tracker: &mut ActivityTracker,
    ) -> Result<ModelOutput, ResearchError> {
        self.call_with_retry(&call, state, tracker, Ok).await
    }

    /// Invoke the model without a schema and return its text.
    pub async fn call_text(
        &self,
        mut call: ModelCall,
        state: &mut ResearchState,
        tracker: &mut ActivityTracker,
    ) -> Result<String, ResearchError> {
        call.schema = None;
        self.call_with_retry(&call, state, tracker, |output| match output {
            ModelOutput::Text(text) => Ok(text),
            ModelOutput::Structured(value) => Ok(value.to_string()),
        })
        .await
    }

    /// Invoke the model with a schema and deserialize the validated result.
    ///
    /// A value that validates but fails to deserialize into `T` counts as a
    /// schema mismatch and is retried like any other failure.
    pub async fn call_structured<T: DeserializeOwned>(
        &self,
        call: ModelCall,
        state: &mut ResearchState,
        tracker: &mut ActivityTracker,
    ) -> Result<T, ResearchError> {
        if call.schema.is_none() {
            return Err(ResearchError::InvalidRequest {
                message: "structured call issued without a schema".to_string(),
            });
        }
        self.call_with_retry(&call, state, tracker, decode_structured)
            .await
    }

    async fn call_with_retry<T, F>(
        &self,
        call: &ModelCall,
        state: &mut ResearchState,
        tracker: &mut ActivityTracker,
        decode: F,
    ) -> Result<T, ResearchError>
    where
        F: Fn(ModelOutput) -> Result<T, LlmError>,
    {
        let max_attempts = self.retry.max_attempts;
        let mut attempts: u32 = 0;
        let mut last_error: Option<LlmError> = None;

        while attempts < max_attempts {
            let outcome = match self.invoke_once(call).await {
                Ok((output, usage)) => decode(output).map(|value| (value, usage)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok((value, usage)) => {
                    state.record_model_call(&usage);
                    debug!(
                        model = %call.model,
                        tokens = usage.total(),
                        completed_steps = state.completed_steps(),
                        "Model call succeeded"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    attempts += 1;
                    warn!(
                        attempt = attempts,
                        max = max_attempts,
                        model = %call.model,
                        error = %e,
                        "Model call failed"
                    );
                    if attempts < max_attempts {
                        tracker.add(
                            call.activity_type,
                            ActivityStatus::Warning,
                            format!(
                                "Model call failed, attempt {attempts}/{max_attempts}: {e}. Retrying..."
                            ),
                        );
                        tokio::time::sleep(self.retry.backoff(attempts)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ResearchError::RetriesExhausted {
            attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("Failed after {max_attempts} attempts")),
        })
    }

    /// Perform exactly one provider call and interpret its response.
    ///
    /// Returns the output together with the usage reported for the call.
    /// Does not touch any run state; used directly by callers outside a run.
    pub async fn invoke_once(&self, call: &ModelCall) -> Result<(ModelOutput, TokenUsage), LlmError> {
        let request = self.build_request(call);
        let response = self.provider.complete(request).await?;

        match call.schema {
            None => {
                let text = response.message.content.joined_text();
                if text.trim().is_empty() {
                    return Err(LlmError::ResponseParse {
                        message: "Model returned an empty response".to_string(),
                    });
                }
                Ok((ModelOutput::Text(text), response.usage))
            }
            Some(schema) => {
                let arguments = extract_submit_arguments(&response.message.content)?;
                schema
                    .validate(&arguments)
                    .map_err(|message| LlmError::SchemaMismatch { message })?;
                Ok((ModelOutput::Structured(arguments), response.usage))
            }
        }
    }

    fn build_request(&self, call: &ModelCall) -> CompletionRequest {
        let system = match (&call.system, call.schema) {
            (Some(system), Some(_)) => Some(format!("{system}\n\n{STRUCTURED_OUTPUT_INSTRUCTION}")),
            (None, Some(_)) => Some(STRUCTURED_OUTPUT_INSTRUCTION.to_string()),
            (system, None) => system.clone(),
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(&call.prompt));

        let (tools, tool_choice) = match call.schema {
            Some(schema) => (
                Some(vec![submit_tool_definition(schema)]),
                ToolChoice::Required(SUBMIT_TOOL_NAME.to_string()),
            ),
            None => (None, ToolChoice::Auto),
        };

        CompletionRequest {
            messages,
            tools,
            tool_choice,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            model: (!call.model.is_empty()).then(|| call.model.clone()),
        }
    }
}

/// The forced tool whose input schema mirrors the expected result.
pub fn submit_tool_definition(schema: &OutputSchema) -> ToolDefinition {
    ToolDefinition {
        name: SUBMIT_TOOL_NAME.to_string(),
        description: format!("Submit the final structured result: {}", schema.description),
        parameters: schema.to_json_schema(),
    }
}

fn extract_submit_arguments(content: &Content) -> Result<Value, LlmError> {
    content
        .tool_calls()
        .into_iter()
        .find(|call| call.name == SUBMIT_TOOL_NAME)
        .map(|call| call.arguments.clone())
        .ok_or_else(|| LlmError::MissingToolCall {
            tool: SUBMIT_TOOL_NAME.to_string(),
        })
}

fn decode_structured<T: DeserializeOwned>(output: ModelOutput) -> Result<T, LlmError> {
    match output {
        ModelOutput::Structured(value) => {
            serde_json::from_value(value).map_err(|e| LlmError::SchemaMismatch {
                message: e.to_string(),
            })
        }
        ModelOutput::Text(_) => Err(LlmError::MissingToolCall {
            tool: SUBMIT_TOOL_NAME.to_string(),
        }),
    }
}

type MockHandler =
    Box<dyn Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync>;

/// A mock LLM provider for testing and development.
///
/// Queued responses are served first, in order. When the queue is empty the
/// optional handler answers; without a handler a fixed text is returned.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    handler: Option<MockHandler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that answers every call through `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
    }

    /// Queue a failure to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Create a tool call response for testing.
    pub fn tool_call_response(tool_name: &str, arguments: Value) -> CompletionResponse {
        let call_id = format!("call_{}", uuid::Uuid::new_v4());
        CompletionResponse {
            message: Message::new(
                Role::Assistant,
                Content::tool_call(&call_id, tool_name, arguments),
            ),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 30,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    /// Create a `submit_result` tool call response for testing.
    pub fn submit_response(arguments: Value) -> CompletionResponse {
        Self::tool_call_response(SUBMIT_TOOL_NAME, arguments)
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let queued = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(result) = queued {
            return result;
        }
        match &self.handler {
            Some(handler) => handler(&request),
            None => Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
