//! Published, immutable views of the population.

use serde::{Deserialize, Serialize};

use super::Cell;

/// Aggregate metrics computed once per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Tick these metrics describe.
    pub tick: u64,
    /// Live cells at tick end.
    pub population: usize,
    /// Mean fitness of live cells (0 when empty).
    pub mean_fitness: f32,
    /// Highest fitness among live cells (0 when empty).
    pub best_fitness: f32,
    /// Distinct descriptors divided by population size (0 when empty).
    pub diversity: f32,
    /// Population reached zero during this tick.
    pub extinct: bool,
    /// The feed was unavailable and stale context was used.
    pub degraded: bool,
    /// The population was reseeded at the start of this tick.
    pub reseeded: bool,
    /// Children created this tick.
    pub births: usize,
    /// Cells removed for falling below the death threshold.
    pub deaths: usize,
    /// Cells removed to restore the population bound.
    pub culled: usize,
    /// Cells whose evaluation produced a non-finite value.
    pub faults: usize,
    /// Mean affect of the context used this tick.
    pub mean_affect: f32,
    /// Affect variance of the context used this tick.
    pub affect_variance: f32,
}

/// Immutable snapshot published at the end of every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    /// Completed ticks.
    pub generation: u64,
    /// Live cells, ordered by id.
    pub cells: Vec<Cell>,
    /// Aggregates for the tick.
    pub metrics: AggregateMetrics,
    /// Ticks on which the population went extinct.
    pub extinction_events: u64,
    /// Ticks on which the population bound forced culling.
    pub capacity_events: u64,
}

impl PopulationSnapshot {
    /// Reduce to the status-query view.
    pub fn status(&self) -> FieldStatus {
        FieldStatus {
            population: self.metrics.population,
            mean_fitness: self.metrics.mean_fitness,
            diversity: self.metrics.diversity,
            generation: self.generation,
            extinction_events: self.extinction_events,
        }
    }
}

/// Read-only status exposed to external callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStatus {
    pub population: usize,
    pub mean_fitness: f32,
    pub diversity: f32,
    pub generation: u64,
    pub extinction_events: u64,
}

impl std::fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "generation {}: {} cells, mean fitness {:.3}, diversity {:.3}, {} extinctions",
            self.generation, self.population, self.mean_fitness, self.diversity, self.extinction_events
        )
    }
}
