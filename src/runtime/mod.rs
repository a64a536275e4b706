//! Tokio runtime around the population manager.
//!
//! A single tick task is the only writer of population state. Status readers
//! go through a [`SnapshotHandle`]; observations arrive and signals leave
//! through bounded drop-oldest queues, so neither collaborator can stall a
//! tick.

mod feed;
mod queue;
mod scheduler;
mod sink;
mod snapshot;

use std::io;

pub use feed::{FeedHandle, QueueFeed, observation_channel};
pub use queue::DropOldestQueue;
pub use scheduler::FieldRuntime;
pub use sink::{LogSink, SignalSink, SinkError};
pub use snapshot::SnapshotHandle;

use crate::audit::AuditStats;
use crate::schema::FieldStatus;

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Runtime task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Audit store error: {0}")]
    Audit(#[from] io::Error),
    #[error("Runtime already shut down")]
    AlreadyShutDown,
}

/// Summary returned by [`FieldRuntime::shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Ticks completed.
    pub ticks: u64,
    /// Status of the final snapshot.
    pub status: FieldStatus,
    /// Signals produced by the emitter.
    pub signals_emitted: u64,
    /// Signals the sink accepted.
    pub signals_applied: u64,
    /// Signals the sink rejected or could not apply.
    pub signals_failed: u64,
    /// Signals evicted from a full queue before dispatch.
    pub signals_dropped: u64,
    /// Audit totals, when auditing was enabled.
    pub audit: Option<AuditStats>,
}

impl std::fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ticks; {}; signals {} emitted, {} applied, {} failed, {} dropped",
            self.ticks,
            self.status,
            self.signals_emitted,
            self.signals_applied,
            self.signals_failed,
            self.signals_dropped
        )?;
        if let Some(audit) = &self.audit {
            write!(f, "; audit {audit}")?;
        }
        Ok(())
    }
}
