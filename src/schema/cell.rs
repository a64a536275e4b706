//! Cell and fitness record types.

use serde::{Deserialize, Serialize};

use super::ArchitectureDescriptor;

/// Unique cell identifier, assigned monotonically by the population manager.
pub type CellId = u64;

/// One population member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Unique identifier.
    pub id: CellId,
    /// Structural descriptor, fixed for the cell's lifetime.
    pub descriptor: ArchitectureDescriptor,
    /// Fitness from the most recent evaluation, in [0, 1].
    pub fitness: f32,
    /// Ticks survived.
    pub age: u64,
    /// Cleared when the cell dies or is culled.
    pub alive: bool,
    /// Parent cell, `None` for founders.
    pub parent: Option<CellId>,
    /// Number of ancestors back to a founder.
    pub lineage_depth: u32,
    /// Tick at which the cell was created.
    pub born_tick: u64,
    /// Sum of every fitness this cell has been assigned.
    pub fitness_sum: f64,
    /// Number of evaluations contributing to `fitness_sum`.
    pub evaluations: u64,
}

impl Cell {
    /// Create a founder cell (initial seeding or reseed).
    pub fn founder(id: CellId, descriptor: ArchitectureDescriptor, tick: u64) -> Self {
        Self {
            id,
            descriptor,
            fitness: 0.0,
            age: 0,
            alive: true,
            parent: None,
            lineage_depth: 0,
            born_tick: tick,
            fitness_sum: 0.0,
            evaluations: 0,
        }
    }

    /// Create a child of `parent`.
    pub fn offspring(
        id: CellId,
        descriptor: ArchitectureDescriptor,
        parent: &Cell,
        tick: u64,
    ) -> Self {
        Self {
            parent: Some(parent.id),
            lineage_depth: parent.lineage_depth + 1,
            ..Self::founder(id, descriptor, tick)
        }
    }

    /// Store a new evaluation result.
    pub fn record_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
        self.fitness_sum += f64::from(fitness);
        self.evaluations += 1;
    }

    /// Mean fitness over the cell's lifetime.
    pub fn mean_fitness(&self) -> f32 {
        if self.evaluations == 0 {
            0.0
        } else {
            (self.fitness_sum / self.evaluations as f64) as f32
        }
    }
}

/// Raw outputs of the architecture interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessComponents {
    /// Similarity between the cell's representation and its context.
    pub semantic_resonance: f32,
    /// Disorder of the cell's output distribution, in [0, 1].
    pub entropy: f32,
    /// Prediction error; higher is worse.
    pub surprise: f32,
}

/// Composite fitness with its weighted terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessScore {
    /// Combined fitness in [0, 1].
    pub fitness: f32,
    /// Weighted semantic-resonance term.
    pub resonance_term: f32,
    /// Weighted entropy-proximity term.
    pub entropy_term: f32,
    /// Weighted surprise term.
    pub surprise_term: f32,
    /// Set when a non-finite value forced fitness to zero.
    pub fault: bool,
}

impl FitnessScore {
    /// Score assigned on an evaluation fault.
    pub const FAULT: Self = Self {
        fitness: 0.0,
        resonance_term: 0.0,
        entropy_term: 0.0,
        surprise_term: 0.0,
        fault: true,
    };
}

/// Per-cell, per-tick evaluation result kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    /// Tick of the evaluation.
    pub tick: u64,
    /// Evaluated cell.
    pub cell_id: CellId,
    /// Descriptor of the evaluated cell.
    pub descriptor: ArchitectureDescriptor,
    /// Score and components.
    pub score: FitnessScore,
}
