//! Deep research: an iterative plan → search → extract → decide loop that
//! ends in a synthesized report.
//!
//! A run owns its [`ResearchState`] and [`ActivityTracker`]; progress and the
//! final report are published through a [`StreamSink`] supplied by the
//! caller.

pub mod activity;
pub mod engine;
pub mod prompts;
pub mod questions;
pub mod request;
pub mod search;
pub mod sink;
pub mod state;

pub use activity::{ActivityEvent, ActivityStatus, ActivityTracker, ActivityType};
pub use engine::{DeepResearch, ResearchOutcome, ResearchPhase};
pub use questions::generate_questions;
pub use request::ResearchRequest;
pub use search::{SearchAggregator, SearchProvider, SearchResult, StaticSearchProvider};
pub use sink::{ChannelSink, NoOpSink, RecordingSink, ResearchEvent, StreamSink};
pub use state::{Clarification, Finding, ResearchState};
