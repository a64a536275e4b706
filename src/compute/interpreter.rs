//! Architecture interpreter: a pure function from descriptor and context to
//! the raw fitness components.

use crate::schema::{ArchitectureDescriptor, FitnessComponents};

use super::context::{CONTEXT_DIM, Context};

/// Turns a descriptor into prediction-quality measurements for a context.
///
/// Implementations must be deterministic: the same descriptor and context
/// always produce bit-identical components.
pub trait ArchitectureInterpreter: Send + Sync {
    fn interpret(&self, descriptor: &ArchitectureDescriptor, context: &Context)
    -> FitnessComponents;
}

/// Default interpreter.
///
/// Each descriptor variant induces a fixed representation vector. Resonance
/// is the rescaled cosine similarity between that vector and the context
/// embedding; entropy is the normalised Shannon entropy of a softmax whose
/// sharpness grows with depth (and heads or kernel size); surprise is the
/// squared error of a predicted affect, scaled by the cell's capacity.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResonanceInterpreter;

impl ArchitectureInterpreter for ResonanceInterpreter {
    fn interpret(
        &self,
        descriptor: &ArchitectureDescriptor,
        context: &Context,
    ) -> FitnessComponents {
        let rep = representation(descriptor);
        let emb = &context.embedding;

        let dot: f32 = rep.iter().zip(emb.iter()).map(|(a, b)| a * b).sum();
        // rep is unit length; emb is unit length or zero.
        let semantic_resonance = (dot + 1.0) * 0.5;

        let layers = descriptor.layers() as f32;
        let sharpness = match *descriptor {
            ArchitectureDescriptor::Attention { heads, .. } => (heads as f32 * layers).sqrt(),
            ArchitectureDescriptor::Recurrent { .. } => layers.sqrt(),
            ArchitectureDescriptor::Convolutional { kernel, .. } => {
                (kernel as f32 / 3.0 * layers).sqrt()
            }
        };
        let mut logits = [0.0f32; CONTEXT_DIM];
        for (logit, (r, e)) in logits.iter_mut().zip(rep.iter().zip(emb.iter())) {
            *logit = 2.0 * sharpness * (r + e);
        }
        let entropy = normalized_entropy(&logits);

        let prediction = (dot * (1.0 + layers.ln())).tanh();
        let capacity = (descriptor.width() as f32).log2() / 10.0;
        let surprise = (prediction - context.mean_affect).powi(2) / capacity;

        FitnessComponents {
            semantic_resonance,
            entropy,
            surprise,
        }
    }
}

/// Fixed unit-length representation of a descriptor.
fn representation(descriptor: &ArchitectureDescriptor) -> [f32; CONTEXT_DIM] {
    let layers = descriptor.layers() as f32;
    let width_log = (descriptor.width() as f32).log2();
    let (phase, mix) = match *descriptor {
        ArchitectureDescriptor::Attention { heads, .. } => (0.3, heads as f32),
        ArchitectureDescriptor::Recurrent { .. } => (1.1, 1.0),
        ArchitectureDescriptor::Convolutional { kernel, .. } => (2.2, kernel as f32),
    };

    let mut rep = [0.0f32; CONTEXT_DIM];
    for (i, value) in rep.iter_mut().enumerate() {
        let x = i as f32 + 1.0;
        *value = (x * 0.618_034 * layers + width_log * 0.5 + phase).sin()
            + 0.5 * (x * mix * 0.37 + phase).cos();
    }

    let norm = rep.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in &mut rep {
            *v /= norm;
        }
    }
    rep
}

/// Shannon entropy of softmax(logits), normalised to [0, 1].
fn normalized_entropy(logits: &[f32; CONTEXT_DIM]) -> f32 {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut probs = [0.0f32; CONTEXT_DIM];
    let mut total = 0.0f32;
    for (p, &l) in probs.iter_mut().zip(logits.iter()) {
        *p = (l - max).exp();
        total += *p;
    }

    let mut entropy = 0.0f32;
    for p in &probs {
        let p = p / total;
        if p > 0.0 {
            entropy -= p * p.ln();
        }
    }
    entropy / (CONTEXT_DIM as f32).ln()
}
