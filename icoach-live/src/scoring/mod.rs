//! Score aggregation
//!
//! Two independent policies: [`live`] reduces a session's streaming channel
//! readings into the final score sent to the client; [`report`] grades a
//! persisted session for the offline report.

pub mod live;
pub mod report;

pub use live::{ChannelBuffers, ScoreAggregator};
