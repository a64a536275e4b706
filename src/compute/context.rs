//! Context construction from observation batches.

use chrono::{DateTime, Utc};
use log::warn;

use crate::schema::ObservationEvent;

/// Dimension of the context embedding.
pub const CONTEXT_DIM: usize = 16;

/// Condensed view of the most recent observations, shared by every cell in a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// L2-normalised token embedding (all zeros when nothing was observed).
    pub embedding: [f32; CONTEXT_DIM],
    /// Mean affect of the batch.
    pub mean_affect: f32,
    /// Population variance of affect in the batch.
    pub affect_variance: f32,
    /// Events folded into this context.
    pub event_count: usize,
    /// Timestamp of the newest event.
    pub latest: Option<DateTime<Utc>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Context {
    /// Context used before anything has been observed.
    pub fn neutral() -> Self {
        Self {
            embedding: [0.0; CONTEXT_DIM],
            mean_affect: 0.0,
            affect_variance: 0.0,
            event_count: 0,
            latest: None,
        }
    }

    /// Build a context from a raw batch.
    ///
    /// Events are stably ordered by timestamp. Events with non-finite affect
    /// are dropped; the rest have affect clamped to [-1, 1]. Returns `None`
    /// for the context when no event survives, together with the accepted
    /// events in time order.
    pub fn from_batch(mut events: Vec<ObservationEvent>) -> (Option<Self>, Vec<ObservationEvent>) {
        events.sort_by_key(|e| e.timestamp);

        let before = events.len();
        events.retain(|e| e.affect.is_finite());
        if events.len() < before {
            warn!(
                "Dropped {} observation(s) with non-finite affect",
                before - events.len()
            );
        }
        for event in &mut events {
            event.affect = event.affect.clamp(-1.0, 1.0);
        }

        if events.is_empty() {
            return (None, events);
        }

        let mut embedding = [0.0f32; CONTEXT_DIM];
        for event in &events {
            let weight = 1.0 + event.affect.abs();
            let tokens = std::iter::once(format!("src:{}", event.source)).chain(
                event
                    .payload
                    .split_whitespace()
                    .map(|t| t.to_lowercase()),
            );
            for token in tokens {
                let (index, sign) = hash_token(&token);
                embedding[index] += sign * weight;
            }
        }
        normalize(&mut embedding);

        let n = events.len() as f64;
        let mean = events.iter().map(|e| f64::from(e.affect)).sum::<f64>() / n;
        let variance = events
            .iter()
            .map(|e| (f64::from(e.affect) - mean).powi(2))
            .sum::<f64>()
            / n;

        let context = Self {
            embedding,
            mean_affect: mean as f32,
            affect_variance: variance as f32,
            event_count: events.len(),
            latest: events.last().map(|e| e.timestamp),
        };

        (Some(context), events)
    }

    /// Whether the embedding carries any signal.
    pub fn is_neutral(&self) -> bool {
        self.embedding.iter().all(|&v| v == 0.0)
    }
}

/// Map a token to an embedding slot and sign.
fn hash_token(token: &str) -> (usize, f32) {
    let hash = blake3::hash(token.as_bytes());
    let bytes = hash.as_bytes();
    let mut slot = [0u8; 8];
    slot.copy_from_slice(&bytes[..8]);
    let index = (u64::from_le_bytes(slot) % CONTEXT_DIM as u64) as usize;
    let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
    (index, sign)
}

fn normalize(v: &mut [f32; CONTEXT_DIM]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
