//! Observation events consumed from the outside world.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One read-only event from the observation feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Source tag (e.g. "repo_monitor", "user").
    pub source: String,
    /// Free-form payload text.
    #[serde(default)]
    pub payload: String,
    /// Affective charge in [-1, 1]; negative is stress, positive is calm.
    #[serde(default)]
    pub affect: f32,
}

impl ObservationEvent {
    /// Create an event stamped with the current time.
    pub fn now(source: impl Into<String>, payload: impl Into<String>, affect: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            payload: payload.into(),
            affect,
        }
    }
}

/// Source of observation batches.
///
/// Implementations return at most `max` events; an error means the feed is
/// unavailable for this tick and the caller falls back to stale context.
pub trait ObservationFeed: Send {
    fn poll_batch(&mut self, max: usize) -> Result<Vec<ObservationEvent>, FeedError>;
}

/// Observation feed errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("Observation feed unavailable: {0}")]
    Unavailable(String),
    #[error("Observation feed closed")]
    Closed,
}

/// Feed that never yields anything. Useful for ticking on stale context.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeed;

impl ObservationFeed for SilentFeed {
    fn poll_batch(&mut self, _max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
        Ok(Vec::new())
    }
}

impl<F: ObservationFeed + ?Sized> ObservationFeed for Box<F> {
    fn poll_batch(&mut self, max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
        (**self).poll_batch(max)
    }
}
