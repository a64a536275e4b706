//! Composite fitness evaluation.
//!
//! Fitness combines three clamped terms:
//!
//! ```text
//! w1 * resonance + w2 * (1 - |entropy - target|) + w3 * 1 / (1 + surprise)
//! ```
//!
//! Evaluation is deterministic and consumes no randomness.

use std::sync::Arc;

use log::warn;
use rayon::prelude::*;

use crate::compute::context::Context;
use crate::compute::interpreter::{ArchitectureInterpreter, ResonanceInterpreter};
use crate::schema::{ArchitectureDescriptor, FitnessConfig, FitnessScore};

/// Scores descriptors against a context.
#[derive(Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
    interpreter: Arc<dyn ArchitectureInterpreter>,
}

impl FitnessEvaluator {
    /// Create an evaluator backed by the default interpreter.
    pub fn new(config: FitnessConfig) -> Self {
        Self::with_interpreter(config, Arc::new(ResonanceInterpreter))
    }

    /// Create an evaluator backed by a custom interpreter.
    pub fn with_interpreter(
        config: FitnessConfig,
        interpreter: Arc<dyn ArchitectureInterpreter>,
    ) -> Self {
        Self {
            config,
            interpreter,
        }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Evaluate one descriptor.
    ///
    /// Any non-finite component or result yields [`FitnessScore::FAULT`].
    pub fn evaluate(&self, descriptor: &ArchitectureDescriptor, context: &Context) -> FitnessScore {
        let components = self.interpreter.interpret(descriptor, context);
        if !(components.semantic_resonance.is_finite()
            && components.entropy.is_finite()
            && components.surprise.is_finite())
        {
            warn!(
                "Evaluation fault for {}: non-finite components {:?}",
                descriptor, components
            );
            return FitnessScore::FAULT;
        }

        let weights = self.config.weights;
        let resonance = components.semantic_resonance.clamp(0.0, 1.0);
        let entropy = (1.0 - (components.entropy - self.config.target_entropy).abs()).clamp(0.0, 1.0);
        let surprise = (1.0 / (1.0 + components.surprise.max(0.0))).clamp(0.0, 1.0);

        let resonance_term = weights.resonance * resonance;
        let entropy_term = weights.entropy * entropy;
        let surprise_term = weights.surprise * surprise;
        let fitness = resonance_term + entropy_term + surprise_term;

        if !fitness.is_finite() {
            warn!("Evaluation fault for {}: non-finite fitness", descriptor);
            return FitnessScore::FAULT;
        }

        FitnessScore {
            fitness: fitness.clamp(0.0, 1.0),
            resonance_term,
            entropy_term,
            surprise_term,
            fault: false,
        }
    }

    /// Evaluate many descriptors in parallel. Output order matches input order.
    pub fn evaluate_all(
        &self,
        descriptors: &[ArchitectureDescriptor],
        context: &Context,
    ) -> Vec<FitnessScore> {
        descriptors
            .par_iter()
            .map(|descriptor| self.evaluate(descriptor, context))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::FitnessComponents;

    /// Interpreter returning the same components for every descriptor.
    pub(crate) struct FixedInterpreter(pub FitnessComponents);

    impl ArchitectureInterpreter for FixedInterpreter {
        fn interpret(&self, _: &ArchitectureDescriptor, _: &Context) -> FitnessComponents {
            self.0
        }
    }

    fn rnn() -> ArchitectureDescriptor {
        ArchitectureDescriptor::Recurrent {
            layers: 2,
            width: 64,
        }
    }

    fn fixed(resonance: f32, entropy: f32, surprise: f32) -> FitnessEvaluator {
        FitnessEvaluator::with_interpreter(
            FitnessConfig::default(),
            Arc::new(FixedInterpreter(FitnessComponents {
                semantic_resonance: resonance,
                entropy,
                surprise,
            })),
        )
    }

    #[test]
    fn test_weighted_sum() {
        // 0.5 * 0 + 0.25 * 1 + 0.25 * 1
        let score = fixed(0.0, 0.5, 0.0).evaluate(&rnn(), &Context::neutral());
        assert!(!score.fault);
        assert!((score.fitness - 0.5).abs() < 1e-6);
        assert!((score.entropy_term - 0.25).abs() < 1e-6);
        assert!((score.surprise_term - 0.25).abs() < 1e-6);

        let score = fixed(1.0, 0.5, 0.0).evaluate(&rnn(), &Context::neutral());
        assert!((score.fitness - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_terms_clamped() {
        let score = fixed(7.0, -3.0, -5.0).evaluate(&rnn(), &Context::neutral());
        assert!((0.0..=1.0).contains(&score.fitness));
        assert!((score.resonance_term - 0.5).abs() < 1e-6);
        assert_eq!(score.entropy_term, 0.0);
    }

    #[test]
    fn test_non_finite_is_fault() {
        for (r, e, s) in [
            (f32::NAN, 0.5, 0.0),
            (0.5, f32::INFINITY, 0.0),
            (0.5, 0.5, f32::NEG_INFINITY),
        ] {
            let score = fixed(r, e, s).evaluate(&rnn(), &Context::neutral());
            assert_eq!(score, FitnessScore::FAULT);
        }
    }

    #[test]
    fn test_unit_width_faults_with_default_interpreter() {
        let evaluator = FitnessEvaluator::new(FitnessConfig::default());
        let score = evaluator.evaluate(
            &ArchitectureDescriptor::Recurrent {
                layers: 1,
                width: 1,
            },
            &Context::neutral(),
        );
        assert!(score.fault);
        assert_eq!(score.fitness, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let evaluator = FitnessEvaluator::new(FitnessConfig::default());
        let (context, _) = Context::from_batch(vec![
            crate::schema::ObservationEvent::now("user", "deploy went fine", 0.7),
        ]);
        let context = context.unwrap();
        let descriptor = ArchitectureDescriptor::Attention {
            layers: 3,
            width: 128,
            heads: 4,
        };

        let a = evaluator.evaluate(&descriptor, &context);
        let b = evaluator.evaluate(&descriptor, &context);
        assert_eq!(a.fitness.to_bits(), b.fitness.to_bits());
    }

    #[test]
    fn test_evaluate_all_preserves_order() {
        let evaluator = FitnessEvaluator::new(FitnessConfig::default());
        let context = Context::neutral();
        let descriptors: Vec<_> = (1..=12)
            .map(|layers| ArchitectureDescriptor::Recurrent { layers, width: 64 })
            .collect();

        let parallel = evaluator.evaluate_all(&descriptors, &context);
        let sequential: Vec<_> = descriptors
            .iter()
            .map(|d| evaluator.evaluate(d, &context))
            .collect();
        assert_eq!(parallel, sequential);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fitness_always_in_unit_range(
                r in proptest::num::f32::ANY,
                e in proptest::num::f32::ANY,
                s in proptest::num::f32::ANY,
            ) {
                let score = fixed(r, e, s).evaluate(&rnn(), &Context::neutral());
                prop_assert!((0.0..=1.0).contains(&score.fitness));
            }
        }
    }
}
