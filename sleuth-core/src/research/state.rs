//! Per-run research state.
//!
//! A `ResearchState` is created for one incoming request, mutated by the
//! engine and the model invocation layer while the run progresses, and
//! dropped when the run ends. Findings are append-only, the processed-URL
//! set only grows, and both counters are monotonic.

use crate::types::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A clarifying question and the user's answer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl Clarification {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A condensed, attributed piece of information gathered during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// URL or origin label of the source.
    pub source: String,
    /// Condensed text extracted from the source.
    pub content: String,
    /// The search query that surfaced the source.
    pub query: String,
}

/// Mutable accumulator for a single research run.
#[derive(Debug, Clone)]
pub struct ResearchState {
    id: Uuid,
    topic: String,
    clarifications_text: String,
    findings: Vec<Finding>,
    processed_urls: HashSet<String>,
    completed_steps: usize,
    tokens_used: usize,
    started_at: DateTime<Utc>,
}

impl ResearchState {
    /// Create a fresh state for `topic`, serializing the clarifications as JSON.
    pub fn new(topic: impl Into<String>, clarifications: &[Clarification]) -> Self {
        let clarifications_text =
            serde_json::to_string(clarifications).unwrap_or_else(|_| "[]".to_string());
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            clarifications_text,
            findings: Vec::new(),
            processed_urls: HashSet::new(),
            completed_steps: 0,
            tokens_used: 0,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn clarifications_text(&self) -> &str {
        &self.clarifications_text
    }

    /// Findings in discovery order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn tokens_used(&self) -> usize {
        self.tokens_used
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn processed_url_count(&self) -> usize {
        self.processed_urls.len()
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.processed_urls.contains(url)
    }

    /// Mark `url` as processed. Returns `false` when it was already claimed,
    /// in which case the caller must skip it.
    pub fn claim_url(&mut self, url: &str) -> bool {
        self.processed_urls.insert(url.to_string())
    }

    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Account for one successful model call.
    pub fn record_model_call(&mut self, usage: &TokenUsage) {
        self.tokens_used += usage.total();
        self.completed_steps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_state_serializes_clarifications() {
        let state = ResearchState::new(
            "best laptop 2024",
            &[Clarification::new("budget?", "$1000")],
        );
        assert_eq!(state.topic(), "best laptop 2024");
        assert_eq!(
            state.clarifications_text(),
            r#"[{"question":"budget?","answer":"$1000"}]"#
        );
        assert!(state.findings().is_empty());
        assert_eq!(state.completed_steps(), 0);
        assert_eq!(state.tokens_used(), 0);
    }

    #[test]
    fn test_claim_url_is_once_only() {
        let mut state = ResearchState::new("t", &[]);
        assert!(state.claim_url("https://a.dev"));
        assert!(!state.claim_url("https://a.dev"));
        assert!(state.is_processed("https://a.dev"));
        assert!(!state.is_processed("https://b.dev"));
        assert_eq!(state.processed_url_count(), 1);
    }

    #[test]
    fn test_record_model_call_accumulates() {
        let mut state = ResearchState::new("t", &[]);
        state.record_model_call(&TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        state.record_model_call(&TokenUsage::default());
        assert_eq!(state.completed_steps(), 2);
        assert_eq!(state.tokens_used(), 15);
    }

    #[test]
    fn test_findings_keep_discovery_order() {
        let mut state = ResearchState::new("t", &[]);
        for i in 0..3 {
            state.add_finding(Finding {
                source: format!("https://s{i}.dev"),
                content: format!("c{i}"),
                query: "q".into(),
            });
        }
        let sources: Vec<_> = state.findings().iter().map(|f| f.source.as_str()).collect();
        assert_eq!(sources, vec!["https://s0.dev", "https://s1.dev", "https://s2.dev"]);
    }

    #[test]
    fn test_clarification_answer_defaults_to_empty() {
        let c: Clarification = serde_json::from_str(r#"{"question":"scope?"}"#).unwrap();
        assert_eq!(c.answer, "");
    }
}
