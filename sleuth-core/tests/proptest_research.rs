//! Property-based tests for research invariants.

use proptest::prelude::*;
use serde_json::json;
use sleuth_core::brain::RetryPolicy;
use sleuth_core::research::prompts::{ANALYSIS_SCHEMA, PLAN_SCHEMA};
use sleuth_core::research::search::truncate_chars;
use sleuth_core::research::{Finding, ResearchState};
use sleuth_core::types::TokenUsage;
use std::time::Duration;

// --- Retry backoff ---

proptest! {
    #[test]
    fn backoff_is_linear(delay_ms in 0u64..5_000, failed in 1u32..10) {
        let policy = RetryPolicy::new(3, Duration::from_millis(delay_ms));
        prop_assert_eq!(
            policy.backoff(failed),
            Duration::from_millis(delay_ms * failed as u64)
        );
    }

    #[test]
    fn backoff_grows_monotonically(delay_ms in 1u64..5_000, failed in 1u32..10) {
        let policy = RetryPolicy::new(3, Duration::from_millis(delay_ms));
        prop_assert!(policy.backoff(failed + 1) > policy.backoff(failed));
    }
}

// --- Content truncation ---

proptest! {
    #[test]
    fn truncate_never_exceeds_limit(text in "\\PC{0,200}", max in 0usize..100) {
        let truncated = truncate_chars(&text, max);
        prop_assert!(truncated.chars().count() <= max);
        prop_assert!(text.starts_with(truncated));
    }

    #[test]
    fn truncate_is_idempotent(text in "\\PC{0,200}", max in 0usize..100) {
        let once = truncate_chars(&text, max);
        prop_assert_eq!(truncate_chars(once, max), once);
    }

    #[test]
    fn truncate_keeps_short_text(text in "[a-z ]{0,50}") {
        prop_assert_eq!(truncate_chars(&text, 50), text.as_str());
    }
}

// --- Run state ---

proptest! {
    #[test]
    fn counters_never_decrease(calls in prop::collection::vec((0usize..5_000, 0usize..5_000), 0..30)) {
        let mut state = ResearchState::new("topic", &[]);
        let mut previous_tokens = 0;
        for (i, (input, output)) in calls.iter().enumerate() {
            state.record_model_call(&TokenUsage {
                input_tokens: *input,
                output_tokens: *output,
            });
            prop_assert_eq!(state.completed_steps(), i + 1);
            prop_assert!(state.tokens_used() >= previous_tokens);
            prop_assert_eq!(state.tokens_used(), previous_tokens + input + output);
            previous_tokens = state.tokens_used();
        }
    }

    #[test]
    fn urls_are_claimed_at_most_once(urls in prop::collection::vec("https://[a-c]\\.dev/[0-3]", 0..40)) {
        let mut state = ResearchState::new("topic", &[]);
        let mut claimed = std::collections::HashSet::new();
        for url in &urls {
            let first = state.claim_url(url);
            prop_assert_eq!(first, claimed.insert(url.clone()));
            prop_assert!(state.is_processed(url));
        }
        prop_assert_eq!(state.processed_url_count(), claimed.len());
    }

    #[test]
    fn findings_keep_insertion_order(sources in prop::collection::vec("[a-z]{1,8}", 0..20)) {
        let mut state = ResearchState::new("topic", &[]);
        for source in &sources {
            state.add_finding(Finding {
                source: source.clone(),
                content: "summary".to_string(),
                query: "q".to_string(),
            });
        }
        let recorded: Vec<_> = state.findings().iter().map(|f| f.source.clone()).collect();
        prop_assert_eq!(recorded, sources);
    }
}

// --- Structured output validation ---

proptest! {
    #[test]
    fn plan_schema_accepts_any_string_list(queries in prop::collection::vec("\\PC{0,30}", 0..8)) {
        let value = json!({ "queries": queries });
        prop_assert!(PLAN_SCHEMA.validate(&value).is_ok());
    }

    #[test]
    fn plan_schema_rejects_non_string_items(n in any::<i64>()) {
        let value = json!({ "queries": [n] });
        prop_assert!(PLAN_SCHEMA.validate(&value).is_err());
    }

    #[test]
    fn analysis_schema_requires_boolean(sufficient in any::<bool>(), text in "[a-z]{1,10}") {
        let ok_value = json!({ "sufficient": sufficient });
        prop_assert!(ANALYSIS_SCHEMA.validate(&ok_value).is_ok());
        let bad_value = json!({ "sufficient": text });
        prop_assert!(ANALYSIS_SCHEMA.validate(&bad_value).is_err());
    }
}
