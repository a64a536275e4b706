//! Population manager: owns the cells and drives one tick at a time.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::audit::AuditEntry;
use crate::schema::{
    AggregateMetrics, ArchitectureDescriptor, Cell, CellId, ConfigError, FieldConfig,
    FitnessRecord, ObservationEvent, ObservationFeed, PopulationSnapshot,
};

use super::context::Context;
use super::evolution::{
    Fate, FitnessEvaluator, LineageRecord, MetaLearner, MutationEngine, cull_excess, judge,
};
use super::interpreter::{ArchitectureInterpreter, ResonanceInterpreter};

/// Everything a tick produced besides the new population state.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Snapshot published at the end of the tick.
    pub snapshot: Arc<PopulationSnapshot>,
    /// One record per evaluation performed (established cells, founders, children).
    pub fitness: Vec<FitnessRecord>,
    /// Lineage records written to the meta-learner this tick.
    pub lineage: Vec<LineageRecord>,
    /// Observations accepted into the context, in time order.
    pub observations: Vec<ObservationEvent>,
}

/// What a replay restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lineage_restored: usize,
    pub cells_seeded: usize,
}

/// Sole owner and writer of the population.
pub struct PopulationManager {
    config: FieldConfig,
    evaluator: FitnessEvaluator,
    mutation: MutationEngine,
    meta: MetaLearner,
    cells: Vec<Cell>,
    context: Context,
    generation: u64,
    next_id: CellId,
    extinction_events: u64,
    capacity_events: u64,
    snapshot: Arc<PopulationSnapshot>,
}

impl PopulationManager {
    /// Create a manager using the default interpreter.
    pub fn new(config: FieldConfig) -> Result<Self, ConfigError> {
        Self::with_interpreter(config, Arc::new(ResonanceInterpreter))
    }

    /// Create a manager using a custom interpreter.
    pub fn with_interpreter(
        config: FieldConfig,
        interpreter: Arc<dyn ArchitectureInterpreter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mutation = match config.random_seed {
            Some(seed) => MutationEngine::new(seed),
            None => MutationEngine::random(),
        };

        Ok(Self {
            evaluator: FitnessEvaluator::with_interpreter(config.fitness.clone(), interpreter),
            meta: MetaLearner::new(config.meta.clone()),
            mutation,
            cells: Vec::new(),
            context: Context::neutral(),
            generation: 0,
            next_id: 0,
            extinction_events: 0,
            capacity_events: 0,
            snapshot: Arc::new(PopulationSnapshot::default()),
            config,
        })
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Live cells, ordered by id.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Context used by the most recent tick.
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn meta_learner(&self) -> &MetaLearner {
        &self.meta
    }

    /// Completed ticks.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> Arc<PopulationSnapshot> {
        Arc::clone(&self.snapshot)
    }

    fn allocate_id(&mut self) -> CellId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run one tick: ingest, reseed if empty, evaluate, select, reproduce,
    /// enforce the population bound, age survivors and publish.
    pub fn tick(&mut self, feed: &mut dyn ObservationFeed) -> TickReport {
        let tick = self.generation + 1;
        let population = self.config.population.clone();

        // Ingest
        let mut degraded = false;
        let observations = match feed.poll_batch(population.batch_size) {
            Ok(mut batch) => {
                batch.truncate(population.batch_size);
                let (context, accepted) = Context::from_batch(batch);
                if let Some(context) = context {
                    self.context = context;
                }
                accepted
            }
            Err(e) => {
                warn!("Tick {tick} degraded, reusing stale context: {e}");
                degraded = true;
                Vec::new()
            }
        };

        // Reseed
        let mut established = std::mem::take(&mut self.cells);
        let mut founders = Vec::new();
        let reseeded = established.is_empty();
        if reseeded {
            info!("Seeding {} cells at tick {tick}", population.initial_size);
            for _ in 0..population.initial_size {
                let descriptor = self.mutation.random_descriptor(&self.config.bounds);
                let id = self.allocate_id();
                founders.push(Cell::founder(id, descriptor, tick));
            }
        }

        // Evaluate
        let mut fitness = Vec::new();
        let mut faults = self.evaluate_into(tick, &mut established, &mut fitness);
        faults += self.evaluate_into(tick, &mut founders, &mut fitness);

        // Select
        let mut lineage = Vec::new();
        let mut survivors = Vec::with_capacity(established.len());
        let mut parents = Vec::new();
        let mut deaths = 0;
        for mut cell in established {
            match judge(cell.fitness, &self.config.selection) {
                Fate::Dies => {
                    cell.alive = false;
                    deaths += 1;
                    lineage.extend(self.meta.observe(&cell));
                }
                Fate::Survives => survivors.push(cell),
                Fate::Reproduces => {
                    parents.push(survivors.len());
                    survivors.push(cell);
                }
            }
        }

        // Reproduce
        let recalled = self.meta.best().map(|r| r.descriptor);
        let mut children = Vec::with_capacity(parents.len());
        for index in parents {
            let parent = &survivors[index];
            let offspring = self.mutation.derive(
                &parent.descriptor,
                recalled.as_ref(),
                &self.config.mutation,
                &self.config.bounds,
            );
            let id = self.allocate_id();
            debug!(
                "Cell {} -> {} ({} via {:?})",
                parent.id, id, offspring.descriptor, offspring.origin
            );
            children.push(Cell::offspring(id, offspring.descriptor, parent, tick));
        }
        let births = children.len();
        faults += self.evaluate_into(tick, &mut children, &mut fitness);

        let mut cells = survivors;
        cells.extend(founders);
        cells.extend(children);

        // Capacity
        let culled = cull_excess(&mut cells, population.max_size);
        if !culled.is_empty() {
            self.capacity_events += 1;
            warn!(
                "Capacity event at tick {tick}: culled {} cells to stay within {}",
                culled.len(),
                population.max_size
            );
            for cell in &culled {
                lineage.extend(self.meta.observe(cell));
            }
        }

        // Age
        for cell in &mut cells {
            if cell.born_tick < tick {
                cell.age += 1;
            }
        }

        let extinct = cells.is_empty();
        if extinct {
            self.extinction_events += 1;
            warn!(
                "Population extinct at tick {tick} ({} extinctions so far)",
                self.extinction_events
            );
        }

        let metrics = self.aggregate(
            tick,
            &cells,
            Flags {
                extinct,
                degraded,
                reseeded,
            },
            Counts {
                births,
                deaths,
                culled: culled.len(),
                faults,
            },
        );
        debug!(
            "Tick {tick}: {} cells, mean fitness {:.3}, diversity {:.3}, +{} -{} culled {}",
            metrics.population,
            metrics.mean_fitness,
            metrics.diversity,
            metrics.births,
            metrics.deaths,
            metrics.culled
        );

        let snapshot = Arc::new(PopulationSnapshot {
            generation: tick,
            cells: cells.clone(),
            metrics,
            extinction_events: self.extinction_events,
            capacity_events: self.capacity_events,
        });

        self.cells = cells;
        self.generation = tick;
        self.snapshot = Arc::clone(&snapshot);

        TickReport {
            snapshot,
            fitness,
            lineage,
            observations,
        }
    }

    /// Evaluate `cells` in parallel against the current context, store the
    /// results and append fitness records. Returns the fault count.
    fn evaluate_into(
        &self,
        tick: u64,
        cells: &mut [Cell],
        records: &mut Vec<FitnessRecord>,
    ) -> usize {
        if cells.is_empty() {
            return 0;
        }
        let descriptors: Vec<ArchitectureDescriptor> =
            cells.iter().map(|c| c.descriptor).collect();
        let scores = self.evaluator.evaluate_all(&descriptors, &self.context);

        let mut faults = 0;
        for (cell, score) in cells.iter_mut().zip(scores) {
            cell.record_fitness(score.fitness);
            if score.fault {
                faults += 1;
            }
            records.push(FitnessRecord {
                tick,
                cell_id: cell.id,
                descriptor: cell.descriptor,
                score,
            });
        }
        faults
    }

    fn aggregate(&self, tick: u64, cells: &[Cell], flags: Flags, counts: Counts) -> AggregateMetrics {
        let population = cells.len();
        let (mean_fitness, best_fitness, diversity) = if population == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = cells.iter().map(|c| f64::from(c.fitness)).sum();
            let best = cells
                .iter()
                .map(|c| c.fitness)
                .fold(0.0f32, f32::max);
            let distinct: HashSet<_> = cells.iter().map(|c| c.descriptor).collect();
            (
                (sum / population as f64) as f32,
                best,
                distinct.len() as f32 / population as f32,
            )
        };

        AggregateMetrics {
            tick,
            population,
            mean_fitness,
            best_fitness,
            diversity,
            extinct: flags.extinct,
            degraded: flags.degraded,
            reseeded: flags.reseeded,
            births: counts.births,
            deaths: counts.deaths,
            culled: counts.culled,
            faults: counts.faults,
            mean_affect: self.context.mean_affect,
            affect_variance: self.context.affect_variance,
        }
    }

    /// Seed state from audit history.
    ///
    /// Lineage entries are restored into the meta-learner. When the
    /// population is empty, up to `initial_size` cells are founded from the
    /// most recent non-faulted fitness records, projected into bounds.
    pub fn replay(&mut self, entries: &[AuditEntry]) -> ReplaySummary {
        let mut summary = ReplaySummary::default();

        for entry in entries {
            if let AuditEntry::Lineage(record) = entry
                && self.meta.restore(record.clone()).is_some()
            {
                summary.lineage_restored += 1;
            }
        }

        if self.cells.is_empty() {
            let mut recent: Vec<ArchitectureDescriptor> = entries
                .iter()
                .rev()
                .filter_map(|entry| match entry {
                    AuditEntry::Fitness(record) if !record.score.fault => {
                        Some(self.config.bounds.clamp(record.descriptor))
                    }
                    _ => None,
                })
                .take(self.config.population.initial_size)
                .collect();
            recent.reverse();

            for descriptor in recent {
                let id = self.allocate_id();
                self.cells
                    .push(Cell::founder(id, descriptor, self.generation));
            }
            summary.cells_seeded = self.cells.len();
        }

        if summary.lineage_restored > 0 || summary.cells_seeded > 0 {
            info!(
                "Replayed {} lineage records and seeded {} cells from audit history",
                summary.lineage_restored, summary.cells_seeded
            );
        }
        summary
    }
}

#[derive(Clone, Copy)]
struct Flags {
    extinct: bool,
    degraded: bool,
    reseeded: bool,
}

#[derive(Clone, Copy)]
struct Counts {
    births: usize,
    deaths: usize,
    culled: usize,
    faults: usize,
}
