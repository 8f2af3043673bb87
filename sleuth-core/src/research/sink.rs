//! Stream sink: where a research run publishes its events.
//!
//! The engine never knows about the transport. It writes named events into a
//! [`StreamSink`]; the gateway forwards them as SSE, the CLI renders them,
//! and tests record them.

use super::activity::ActivityEvent;
use serde_json::{Value, json};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Event name for activity updates.
pub const ACTIVITY_EVENT: &str = "data-activity";
/// Event name for the final report.
pub const REPORT_EVENT: &str = "data-report";

/// A named event emitted by a research run.
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchEvent {
    Activity(ActivityEvent),
    Report(String),
}

impl ResearchEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ResearchEvent::Activity(_) => ACTIVITY_EVENT,
            ResearchEvent::Report(_) => REPORT_EVENT,
        }
    }

    /// Event payload as JSON.
    pub fn payload(&self) -> Value {
        match self {
            ResearchEvent::Activity(activity) => {
                serde_json::to_value(activity).unwrap_or(Value::Null)
            }
            ResearchEvent::Report(report) => Value::String(report.clone()),
        }
    }

    /// `{"type": <name>, "data": <payload>}`, the shape UI clients consume.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": self.name(),
            "data": self.payload(),
        })
    }
}

/// Receives events from a research run. Writes must not block.
pub trait StreamSink: Send + Sync {
    fn write(&self, event: ResearchEvent);
}

/// Forwards events over an unbounded tokio channel.
///
/// A closed receiver is not an error: the run keeps going and its
/// remaining events are dropped.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamSink for ChannelSink {
    fn write(&self, event: ResearchEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Stream receiver dropped; discarding research event");
        }
    }
}

/// Records every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ResearchEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResearchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResearchEvent::Report(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn activities(&self) -> Vec<ActivityEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResearchEvent::Activity(activity) => Some(activity),
                _ => None,
            })
            .collect()
    }
}

impl StreamSink for RecordingSink {
    fn write(&self, event: ResearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards every event.
pub struct NoOpSink;

impl StreamSink for NoOpSink {
    fn write(&self, _event: ResearchEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::activity::{ActivityStatus, ActivityType};

    fn activity() -> ActivityEvent {
        ActivityEvent::new(ActivityType::Search, ActivityStatus::Pending, "Searching for rust")
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ResearchEvent::Activity(activity()).name(), "data-activity");
        assert_eq!(ResearchEvent::Report("r".into()).name(), "data-report");
    }

    #[test]
    fn test_wire_shape() {
        let wire = ResearchEvent::Activity(activity()).to_wire();
        assert_eq!(wire["type"], "data-activity");
        assert_eq!(wire["data"]["type"], "search");
        assert_eq!(wire["data"]["status"], "pending");
        assert_eq!(wire["data"]["message"], "Searching for rust");

        let wire = ResearchEvent::Report("<report>done</report>".into()).to_wire();
        assert_eq!(wire["type"], "data-report");
        assert_eq!(wire["data"], "<report>done</report>");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.write(ResearchEvent::Report("hello".into()));
        assert_eq!(rx.recv().await, Some(ResearchEvent::Report("hello".into())));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.write(ResearchEvent::Report("ignored".into()));
    }

    #[test]
    fn test_recording_sink_filters() {
        let sink = RecordingSink::new();
        sink.write(ResearchEvent::Activity(activity()));
        sink.write(ResearchEvent::Report("final".into()));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.reports(), vec!["final".to_string()]);
        assert_eq!(sink.activities().len(), 1);
    }
}
