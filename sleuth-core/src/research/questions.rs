//! Clarifying questions asked before a research run starts.

use super::prompts::{QUESTIONS_SCHEMA, QUESTIONS_SYSTEM, QuestionsOutput, questions_prompt};
use crate::brain::{Brain, ModelCall, ModelOutput};
use tracing::{info, warn};

/// Ask the model for 2 to 4 questions that narrow the scope of `topic`.
///
/// This is a single attempt outside any run. Every failure yields an empty
/// list so the caller can proceed without clarifications.
pub async fn generate_questions(brain: &Brain, model: &str, topic: &str) -> Vec<String> {
    let call = ModelCall::new(model, questions_prompt(topic))
        .with_system(QUESTIONS_SYSTEM)
        .with_schema(&QUESTIONS_SCHEMA);

    let value = match brain.invoke_once(&call).await {
        Ok((ModelOutput::Structured(value), _)) => value,
        Ok((ModelOutput::Text(_), _)) => return Vec::new(),
        Err(e) => {
            warn!(topic, error = %e, "Error while generating questions");
            return Vec::new();
        }
    };

    match serde_json::from_value::<QuestionsOutput>(value) {
        Ok(output) => {
            let questions: Vec<String> = output
                .questions
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .take(4)
                .collect();
            info!(topic, count = questions.len(), "Generated clarifying questions");
            questions
        }
        Err(e) => {
            warn!(topic, error = %e, "Clarifying questions did not decode");
            Vec::new()
        }
    }
}
