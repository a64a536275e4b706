//! Downstream collaborators that apply adaptation signals.

use async_trait::async_trait;
use log::info;

use crate::schema::AdaptationSignal;

/// Applies signals to the live environment.
///
/// The core never retries a failed signal; if the triggering condition
/// persists the rule fires again on a later tick.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn apply(&self, signal: &AdaptationSignal) -> Result<(), SinkError>;
}

/// Signal sink errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("Signal rejected: {0}")]
    Rejected(String),
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Sink that only logs what it would apply.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl SignalSink for LogSink {
    async fn apply(&self, signal: &AdaptationSignal) -> Result<(), SinkError> {
        match signal.previous {
            Some(previous) => info!(
                "Adapt {}: {} -> {} ({})",
                signal.parameter, previous, signal.value, signal.reason
            ),
            None => info!(
                "Adapt {}: {} ({})",
                signal.parameter, signal.value, signal.reason
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        let signal = AdaptationSignal {
            tick: 4,
            parameter: "cache.ttl".to_string(),
            value: 30.0,
            previous: Some(60.0),
            reason: "low diversity".to_string(),
            timestamp: Utc::now(),
        };
        assert!(sink.apply(&signal).await.is_ok());
        assert!(sink.apply(&AdaptationSignal { previous: None, ..signal }).await.is_ok());
    }
}
