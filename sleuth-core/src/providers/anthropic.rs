//! Anthropic Messages API provider implementation.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - System message is a top-level `system` field, not in the messages array
//! - Tool calls use `tool_use` content blocks and `tool_choice: {"type": "tool"}`

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolChoice,
    ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration.
    ///
    /// Returns `LlmError::AuthFailed` if the key environment variable is not set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::AuthFailed {
            provider: format!("Anthropic (env var '{}' not set)", config.api_key_env),
        })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Anthropic provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build the JSON request body for the Anthropic Messages API.
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let max_tokens = request.max_tokens.unwrap_or(4096);

        let (system_text, non_system_messages) = Self::extract_system_message(&request.messages);

        let messages_json: Vec<Value> = non_system_messages
            .iter()
            .map(|msg| Self::message_to_anthropic_json(msg))
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "messages": messages_json,
        });

        if let Some(system) = &system_text {
            body["system"] = Value::String(system.clone());
        }

        if let Some(tools) = &request.tools
            && !tools.is_empty()
        {
            let tools_json: Vec<Value> = tools.iter().map(Self::tool_definition_to_json).collect();
            body["tools"] = Value::Array(tools_json);
            body["tool_choice"] = match &request.tool_choice {
                ToolChoice::Auto => json!({ "type": "auto" }),
                ToolChoice::Required(name) => json!({ "type": "tool", "name": name }),
            };
        }

        body
    }

    /// Split system messages off the conversation, joining them with blank lines.
    fn extract_system_message(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            if msg.role == Role::System {
                system_parts.push(msg.content.joined_text());
            } else {
                non_system.push(msg);
            }
        }

        let system_text = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_text, non_system)
    }

    fn message_to_anthropic_json(msg: &Message) -> Value {
        let role = match msg.role {
            Role::Assistant => "assistant",
            Role::User | Role::System => "user",
        };

        json!({
            "role": role,
            "content": Self::content_to_anthropic_json(&msg.content),
        })
    }

    /// Convert a `Content` enum to Anthropic content blocks.
    fn content_to_anthropic_json(content: &Content) -> Value {
        match content {
            Content::Text { text } => json!([{ "type": "text", "text": text }]),
            Content::ToolCall {
                id,
                name,
                arguments,
            } => json!([{
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": arguments,
            }]),
            Content::MultiPart { parts } => {
                let blocks: Vec<Value> = parts
                    .iter()
                    .flat_map(|part| match Self::content_to_anthropic_json(part) {
                        Value::Array(arr) => arr,
                        other => vec![other],
                    })
                    .collect();
                Value::Array(blocks)
            }
        }
    }

    fn tool_definition_to_json(tool: &ToolDefinition) -> Value {
        json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.parameters,
        })
    }

    /// Parse an Anthropic API response JSON into a `CompletionResponse`.
    fn parse_response(body: &Value, fallback_model: &str) -> Result<CompletionResponse, LlmError> {
        let model = body["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string();
        let finish_reason = body["stop_reason"].as_str().map(|s| s.to_string());

        let usage = TokenUsage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        };

        let content_blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'content' array in response".to_string(),
            })?;

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, Self::parse_content_blocks(content_blocks)),
            usage,
            model,
            finish_reason,
        })
    }

    /// Parse Anthropic content blocks. A single block is returned directly;
    /// several become `Content::MultiPart`.
    fn parse_content_blocks(blocks: &[Value]) -> Content {
        let mut parts: Vec<Content> = Vec::new();

        for block in blocks {
            match block["type"].as_str().unwrap_or("text") {
                "text" => {
                    let text = block["text"].as_str().unwrap_or("").to_string();
                    parts.push(Content::Text { text });
                }
                "tool_use" => parts.push(Content::ToolCall {
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: block["input"].clone(),
                }),
                other => {
                    debug!(block_type = other, "Ignoring unknown content block type");
                }
            }
        }

        match parts.len() {
            0 => Content::text(""),
            1 => parts.remove(0),
            _ => Content::MultiPart { parts },
        }
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Anthropic".to_string(),
            },
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                LlmError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            _ => LlmError::ApiRequest {
                message: format!("HTTP {status} from Anthropic API: {body_text}"),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = %body["model"],
            url = url.as_str(),
            "Sending Anthropic completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LlmError::ApiRequest {
                        message: format!("Request to Anthropic API failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON from Anthropic API: {e}"),
        })?;

        Self::parse_response(&json, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn provider() -> AnthropicProvider {
        let config = LlmConfig {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            ..LlmConfig::default()
        };
        AnthropicProvider::new_with_key(&config, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_system_message_is_top_level() {
        let request = CompletionRequest {
            messages: vec![Message::system("Be terse."), Message::user("Hi")],
            max_tokens: Some(1024),
            ..CompletionRequest::default()
        };
        let body = provider().build_request_body(&request);
        assert_eq!(body["system"], "Be terse.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "Hi");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_forced_tool_choice() {
        let request = CompletionRequest {
            messages: vec![Message::user("extract")],
            tools: Some(vec![ToolDefinition {
                name: "submit_result".to_string(),
                description: "Submit".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }]),
            tool_choice: ToolChoice::Required("submit_result".to_string()),
            ..CompletionRequest::default()
        };
        let body = provider().build_request_body(&request);
        assert_eq!(body["tools"][0]["name"], "submit_result");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(
            body["tool_choice"],
            json!({"type": "tool", "name": "submit_result"})
        );
    }

    #[test]
    fn test_default_max_tokens() {
        let body = provider().build_request_body(&CompletionRequest::default());
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_tool_use_response() {
        let body = json!({
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "submit_result",
                 "input": {"summary": "Rust 1.88 stabilized let chains."}}
            ],
            "usage": {"input_tokens": 320, "output_tokens": 45}
        });
        let resp = AnthropicProvider::parse_response(&body, "fallback").unwrap();
        let calls = resp.message.content.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["summary"], "Rust 1.88 stabilized let chains.");
        assert_eq!(resp.usage.total(), 365);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn test_parse_mixed_blocks() {
        let blocks = vec![
            json!({"type": "text", "text": "Calling the tool."}),
            json!({"type": "tool_use", "id": "t", "name": "submit_result", "input": {}}),
            json!({"type": "thinking", "thinking": "..."}),
        ];
        let content = AnthropicProvider::parse_content_blocks(&blocks);
        assert_eq!(content.joined_text(), "Calling the tool.");
        assert_eq!(content.tool_calls().len(), 1);
    }

    #[test]
    fn test_parse_missing_content() {
        let result = AnthropicProvider::parse_response(&json!({"model": "m"}), "m");
        assert!(matches!(result, Err(LlmError::ResponseParse { .. })));
    }

    #[test]
    fn test_map_http_error() {
        use reqwest::StatusCode;
        assert!(matches!(
            AnthropicProvider::map_http_error(StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            AnthropicProvider::map_http_error(StatusCode::TOO_MANY_REQUESTS, "{}"),
            LlmError::RateLimited {
                retry_after_secs: 30
            }
        ));
        assert!(matches!(
            AnthropicProvider::map_http_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            LlmError::ApiRequest { .. }
        ));
    }
}
