//! Audit file format definitions.

use std::io;

use serde::{Deserialize, Serialize};

use crate::compute::evolution::LineageRecord;
use crate::schema::{AdaptationSignal, FitnessRecord, ObservationEvent, SignalOutcome};

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry")]
pub enum AuditEntry {
    /// An observation accepted into a context.
    Observation(ObservationEvent),
    /// A per-cell evaluation.
    Fitness(FitnessRecord),
    /// An emitted adaptation signal.
    Signal(AdaptationSignal),
    /// The sink's verdict on a signal.
    Outcome(SignalOutcome),
    /// A lineage written to the meta-learner.
    Lineage(LineageRecord),
}

impl AuditEntry {
    /// Entry tag as written to disk.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Observation(_) => "Observation",
            Self::Fitness(_) => "Fitness",
            Self::Signal(_) => "Signal",
            Self::Outcome(_) => "Outcome",
            Self::Lineage(_) => "Lineage",
        }
    }
}

/// Encode an entry as a single line (without the trailing newline).
pub fn encode_entry(entry: &AuditEntry) -> io::Result<String> {
    serde_json::to_string(entry).map_err(io::Error::other)
}

/// Decode one line. `line_number` is 1-based and only used in the error.
pub fn decode_entry(line: &str, line_number: usize) -> io::Result<AuditEntry> {
    serde_json::from_str(line).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Malformed audit entry on line {line_number}: {e}"),
        )
    })
}
