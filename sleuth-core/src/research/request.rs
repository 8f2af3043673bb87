//! Inbound research requests.
//!
//! A request is validated completely before any run state exists, so a
//! malformed payload is always a client error and never a stream event.

use super::state::{Clarification, ResearchState};
use crate::error::ResearchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated request to start one research run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub clarifications: Vec<Clarification>,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    clarifications: Option<Vec<Clarification>>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>, clarifications: Vec<Clarification>) -> Result<Self, ResearchError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(ResearchError::EmptyTopic);
        }
        Ok(Self {
            topic,
            clarifications,
        })
    }

    /// Parse the `{topic, clarifications}` JSON document.
    pub fn parse(text: &str) -> Result<Self, ResearchError> {
        let raw: RawRequest =
            serde_json::from_str(text).map_err(|_| ResearchError::InvalidRequest {
                message: "Invalid message format! Expected JSON.".to_string(),
            })?;
        Self::new(
            raw.topic.unwrap_or_default(),
            raw.clarifications.unwrap_or_default(),
        )
    }

    /// Extract a request from a chat transport payload.
    ///
    /// The last message carries the request document either as a string
    /// `content` or as the first `text` entry of its `parts`.
    pub fn from_chat_payload(payload: &Value) -> Result<Self, ResearchError> {
        let last = payload
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.last())
            .ok_or_else(|| ResearchError::InvalidRequest {
                message: "No message found".to_string(),
            })?;

        let text = last
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                last.get("parts")?
                    .as_array()?
                    .iter()
                    .find(|part| part.get("type").and_then(Value::as_str) == Some("text"))?
                    .get("text")?
                    .as_str()
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResearchError::InvalidRequest {
                message: "No message content found in last message".to_string(),
            })?;

        Self::parse(text)
    }

    /// Create the fresh state for this request's run.
    pub fn new_state(&self) -> ResearchState {
        ResearchState::new(self.topic.clone(), &self.clarifications)
    }
}
