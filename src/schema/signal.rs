//! Adaptation rules and the signals they emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition over a tick's aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", content = "value")]
pub enum Condition {
    MeanFitnessBelow(f32),
    MeanFitnessAbove(f32),
    DiversityBelow(f32),
    DiversityAbove(f32),
    PopulationBelow(usize),
    PopulationAbove(usize),
    /// Population reached zero this tick.
    Extinct,
    /// Tick ran on stale context because the feed was unavailable.
    Degraded,
    /// Affect variance plus recent adaptation rate exceeds the value.
    DissonanceAbove(f32),
    /// Every nested condition holds.
    All(Vec<Condition>),
    /// At least one nested condition holds.
    Any(Vec<Condition>),
}

/// Rule mapping a condition to a proposed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRule {
    /// Trigger condition.
    pub condition: Condition,
    /// External parameter to tune (e.g. "vm.swappiness").
    pub parameter: String,
    /// Proposed value.
    pub value: f64,
    /// Human-readable reason attached to emitted signals.
    pub reason: String,
}

/// Recommendation to change one external parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationSignal {
    /// Tick that produced the signal.
    pub tick: u64,
    /// Target parameter.
    pub parameter: String,
    /// Proposed value.
    pub value: f64,
    /// Value last emitted for this parameter, if any.
    pub previous: Option<f64>,
    /// Why the signal fired.
    pub reason: String,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// Downstream result of applying a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOutcome {
    /// Tick of the signal.
    pub tick: u64,
    /// Parameter of the signal.
    pub parameter: String,
    /// Value of the signal.
    pub value: f64,
    /// Whether the sink applied it.
    pub success: bool,
    /// Failure description.
    pub error: Option<String>,
}

impl SignalOutcome {
    pub fn applied(signal: &AdaptationSignal) -> Self {
        Self {
            tick: signal.tick,
            parameter: signal.parameter.clone(),
            value: signal.value,
            success: true,
            error: None,
        }
    }

    pub fn failed(signal: &AdaptationSignal, error: impl ToString) -> Self {
        Self {
            tick: signal.tick,
            parameter: signal.parameter.clone(),
            value: signal.value,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_serialization() {
        let condition = Condition::All(vec![
            Condition::Extinct,
            Condition::MeanFitnessBelow(0.3),
        ]);
        let json = serde_json::to_string(&condition).unwrap();
        let parsed: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, condition);

        let extinct: Condition = serde_json::from_str(r#"{"when":"Extinct"}"#).unwrap();
        assert_eq!(extinct, Condition::Extinct);
    }
}
