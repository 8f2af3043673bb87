//! Activity tracker: the append-only progress log of a research run.
//!
//! Every appended event is mirrored to the run's [`StreamSink`] as a
//! `data-activity` event and to `tracing`. Messages are self-describing so a
//! client can rebuild progress from any single event.

use super::sink::{ResearchEvent, StreamSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which part of the run an activity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Plan,
    Search,
    Extract,
    Analyze,
    Generate,
    Report,
    Error,
    Warning,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityType::Plan => "plan",
            ActivityType::Search => "search",
            ActivityType::Extract => "extract",
            ActivityType::Analyze => "analyze",
            ActivityType::Generate => "generate",
            ActivityType::Report => "report",
            ActivityType::Error => "error",
            ActivityType::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Pending,
    Complete,
    Error,
    Warning,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::Complete => "complete",
            ActivityStatus::Error => "error",
            ActivityStatus::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

/// A single progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub status: ActivityStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityType, status: ActivityStatus, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only activity log scoped to one run.
pub struct ActivityTracker {
    events: Vec<ActivityEvent>,
    sink: Arc<dyn StreamSink>,
}

impl ActivityTracker {
    pub fn new(sink: Arc<dyn StreamSink>) -> Self {
        Self {
            events: Vec::new(),
            sink,
        }
    }

    /// Append an event and forward it to the sink.
    pub fn add(&mut self, kind: ActivityType, status: ActivityStatus, message: impl Into<String>) {
        let event = ActivityEvent::new(kind, status, message);
        match status {
            ActivityStatus::Error => {
                tracing::error!(target: "sleuth::activity", kind = %kind, "{}", event.message)
            }
            ActivityStatus::Warning => {
                tracing::warn!(target: "sleuth::activity", kind = %kind, "{}", event.message)
            }
            _ => tracing::info!(
                target: "sleuth::activity",
                kind = %kind,
                status = %status,
                "{}",
                event.message
            ),
        }
        self.sink.write(ResearchEvent::Activity(event.clone()));
        self.events.push(event);
    }

    pub fn events(&self) -> &[ActivityEvent] {
        &self.events
    }

    /// Number of events matching both `kind` and `status`.
    pub fn count(&self, kind: ActivityType, status: ActivityStatus) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == kind && e.status == status)
            .count()
    }

    /// Number of events with `status`, regardless of kind.
    pub fn count_status(&self, status: ActivityStatus) -> usize {
        self.events.iter().filter(|e| e.status == status).count()
    }

    pub fn sink(&self) -> &Arc<dyn StreamSink> {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::sink::RecordingSink;

    #[test]
    fn test_add_appends_and_forwards() {
        let sink = Arc::new(RecordingSink::new());
        let mut tracker = ActivityTracker::new(sink.clone());

        tracker.add(ActivityType::Plan, ActivityStatus::Pending, "Planning research");
        tracker.add(ActivityType::Plan, ActivityStatus::Complete, "Planned 3 queries");

        assert_eq!(tracker.events().len(), 2);
        let forwarded = sink.activities();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[1].message, "Planned 3 queries");
        assert_eq!(forwarded, tracker.events().to_vec());
    }

    #[test]
    fn test_counts() {
        let mut tracker = ActivityTracker::new(Arc::new(RecordingSink::new()));
        tracker.add(ActivityType::Search, ActivityStatus::Pending, "a");
        tracker.add(ActivityType::Search, ActivityStatus::Complete, "b");
        tracker.add(ActivityType::Extract, ActivityStatus::Warning, "c");
        assert_eq!(tracker.count(ActivityType::Search, ActivityStatus::Complete), 1);
        assert_eq!(tracker.count(ActivityType::Extract, ActivityStatus::Complete), 0);
        assert_eq!(tracker.count_status(ActivityStatus::Warning), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = ActivityEvent::new(
            ActivityType::Extract,
            ActivityStatus::Complete,
            "Extracted from https://example.com/a",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "extract");
        assert_eq!(json["status"], "complete");
        assert!(json["timestamp"].is_string());
    }
}
