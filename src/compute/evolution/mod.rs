//! Evolutionary machinery for the cell field.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): deterministic composite score per cell
//! - **Selection** (`selection`): death/reproduction fate and capacity culling
//! - **Mutation** (`mutation`): seeded descriptor generation and child derivation
//! - **Lineage** (`lineage`): the meta-learner's bounded record of successful patterns
//!
//! # Example
//!
//! ```rust
//! use cell_field::compute::Context;
//! use cell_field::compute::evolution::{FitnessEvaluator, Fate, judge};
//! use cell_field::schema::{ArchitectureDescriptor, FieldConfig};
//!
//! let config = FieldConfig::default();
//! let evaluator = FitnessEvaluator::new(config.fitness.clone());
//!
//! let descriptor = ArchitectureDescriptor::Recurrent { layers: 2, width: 64 };
//! let score = evaluator.evaluate(&descriptor, &Context::neutral());
//! assert!((0.0..=1.0).contains(&score.fitness));
//!
//! let fate = judge(score.fitness, &config.selection);
//! assert!(matches!(fate, Fate::Dies | Fate::Survives | Fate::Reproduces));
//! ```

mod fitness;
mod lineage;
mod mutation;
mod selection;

pub use fitness::FitnessEvaluator;
pub use lineage::{LineageRecord, MetaLearner};
pub use mutation::{
    MutationEngine, MutationOrigin, Offspring, StructuralChange, WidthScale, apply_change,
};
pub use selection::{Fate, cull_excess, cull_order, judge};

#[cfg(test)]
pub(crate) use fitness::tests::FixedInterpreter;
