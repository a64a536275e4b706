//! Meta-learner: bounded statistics over successful lineages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::{ArchitectureDescriptor, Cell, MetaLearnerConfig};

/// Statistics for one architecture pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    /// The recorded pattern.
    pub descriptor: ArchitectureDescriptor,
    /// Longest survival observed for the pattern.
    pub survival_age: u64,
    /// Mean fitness across every recorded cell with this pattern.
    pub mean_fitness: f32,
    /// Cells merged into this record.
    pub observations: u64,
    /// Recency stamp; larger is more recent.
    pub sequence: u64,
}

/// Records successful lineages and recalls the best one.
#[derive(Debug)]
pub struct MetaLearner {
    config: MetaLearnerConfig,
    records: HashMap<ArchitectureDescriptor, LineageRecord>,
    sequence: u64,
}

impl MetaLearner {
    pub fn new(config: MetaLearnerConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
            sequence: 0,
        }
    }

    /// Offer a dead or culled cell.
    ///
    /// The cell is recorded only when it reached the survival age and its
    /// mean fitness exceeds the success cutoff. Returns the updated record.
    pub fn observe(&mut self, cell: &Cell) -> Option<LineageRecord> {
        let mean_fitness = cell.mean_fitness();
        if cell.age < self.config.survival_age_threshold
            || mean_fitness <= self.config.success_cutoff
        {
            return None;
        }

        self.insert(LineageRecord {
            descriptor: cell.descriptor,
            survival_age: cell.age,
            mean_fitness,
            observations: 1,
            sequence: 0,
        })
    }

    /// Seed history from a replayed record. The record is merged as if it
    /// had just been observed.
    pub fn restore(&mut self, record: LineageRecord) -> Option<LineageRecord> {
        if !record.mean_fitness.is_finite() {
            return None;
        }
        self.insert(LineageRecord {
            observations: record.observations.max(1),
            ..record
        })
    }

    fn insert(&mut self, mut record: LineageRecord) -> Option<LineageRecord> {
        self.sequence += 1;
        record.sequence = self.sequence;

        if let Some(existing) = self.records.get_mut(&record.descriptor) {
            let total = existing.observations + record.observations;
            let merged = (f64::from(existing.mean_fitness) * existing.observations as f64
                + f64::from(record.mean_fitness) * record.observations as f64)
                / total as f64;
            existing.mean_fitness = merged as f32;
            existing.observations = total;
            existing.survival_age = existing.survival_age.max(record.survival_age);
            existing.sequence = record.sequence;
            return Some(existing.clone());
        }

        if self.records.len() >= self.config.capacity {
            // Evict the weakest record; ties go to the oldest.
            let weakest = self
                .records
                .values()
                .min_by(|a, b| {
                    a.mean_fitness
                        .total_cmp(&b.mean_fitness)
                        .then(a.sequence.cmp(&b.sequence))
                })
                .map(|r| (r.descriptor, r.mean_fitness));

            if let Some((descriptor, fitness)) = weakest {
                if record.mean_fitness <= fitness {
                    return None;
                }
                self.records.remove(&descriptor);
            }
        }

        self.records.insert(record.descriptor, record.clone());
        Some(record)
    }

    /// Highest mean fitness; ties go to the most recently recorded.
    pub fn best(&self) -> Option<&LineageRecord> {
        self.records.values().max_by(|a, b| {
            a.mean_fitness
                .total_cmp(&b.mean_fitness)
                .then(a.sequence.cmp(&b.sequence))
        })
    }

    /// All records, best first.
    pub fn records(&self) -> Vec<&LineageRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| {
            b.mean_fitness
                .total_cmp(&a.mean_fitness)
                .then(b.sequence.cmp(&a.sequence))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize) -> MetaLearnerConfig {
        MetaLearnerConfig {
            capacity,
            survival_age_threshold: 5,
            success_cutoff: 0.6,
        }
    }

    fn rnn(layers: u32) -> ArchitectureDescriptor {
        ArchitectureDescriptor::Recurrent { layers, width: 64 }
    }

    fn veteran(id: u64, descriptor: ArchitectureDescriptor, age: u64, fitness: f32) -> Cell {
        let mut cell = Cell::founder(id, descriptor, 0);
        cell.age = age;
        cell.record_fitness(fitness);
        cell
    }

    #[test]
    fn test_observe_filters() {
        let mut learner = MetaLearner::new(config(10));

        // too young
        assert!(learner.observe(&veteran(1, rnn(1), 4, 0.9)).is_none());
        // not above cutoff
        assert!(learner.observe(&veteran(2, rnn(2), 9, 0.6)).is_none());
        assert!(learner.is_empty());

        assert!(learner.observe(&veteran(3, rnn(3), 5, 0.61)).is_some());
        assert_eq!(learner.len(), 1);
    }

    #[test]
    fn test_best_breaks_ties_by_recency() {
        let mut learner = MetaLearner::new(config(10));
        learner.observe(&veteran(1, rnn(1), 6, 0.8));
        learner.observe(&veteran(2, rnn(2), 6, 0.9));
        learner.observe(&veteran(3, rnn(3), 6, 0.9));
        learner.observe(&veteran(4, rnn(4), 6, 0.7));

        assert_eq!(learner.best().map(|r| r.descriptor), Some(rnn(3)));
    }

    #[test]
    fn test_hundred_survivors_best() {
        let mut learner = MetaLearner::new(config(256));
        for i in 0..100u64 {
            let layers = (i % 12) as u32 + 1;
            let width = 16 << (i % 7);
            let descriptor = ArchitectureDescriptor::Attention {
                layers,
                width,
                heads: 1 << (i % 5),
            };
            let fitness = 0.61 + (i % 10) as f32 * 0.03;
            learner.observe(&veteran(i, descriptor, 5 + i, fitness));
        }

        let best = learner.best().unwrap();
        let top = learner.records()[0];
        assert_eq!(best, top);
        for record in learner.records() {
            assert!(record.mean_fitness <= best.mean_fitness);
            if record.mean_fitness == best.mean_fitness {
                assert!(record.sequence <= best.sequence);
            }
        }
    }

    #[test]
    fn test_merge_same_descriptor() {
        let mut learner = MetaLearner::new(config(10));
        learner.observe(&veteran(1, rnn(2), 6, 0.7));
        let merged = learner.observe(&veteran(2, rnn(2), 9, 0.9)).unwrap();

        assert_eq!(learner.len(), 1);
        assert_eq!(merged.observations, 2);
        assert_eq!(merged.survival_age, 9);
        assert!((merged.mean_fitness - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_eviction_drops_lowest_fitness() {
        let mut learner = MetaLearner::new(config(2));
        learner.observe(&veteran(1, rnn(1), 6, 0.7));
        learner.observe(&veteran(2, rnn(2), 6, 0.8));

        // Not better than the weakest: rejected.
        assert!(learner.observe(&veteran(3, rnn(3), 6, 0.65)).is_none());

        learner.observe(&veteran(4, rnn(4), 6, 0.95));
        assert_eq!(learner.len(), 2);
        let kept: Vec<_> = learner.records().iter().map(|r| r.descriptor).collect();
        assert_eq!(kept, vec![rnn(4), rnn(2)]);
    }

    #[test]
    fn test_restore() {
        let mut learner = MetaLearner::new(config(4));
        let record = LineageRecord {
            descriptor: rnn(7),
            survival_age: 30,
            mean_fitness: 0.75,
            observations: 0,
            sequence: 99,
        };
        let restored = learner.restore(record).unwrap();
        assert_eq!(restored.observations, 1);
        assert_eq!(restored.sequence, 1);
        assert_eq!(learner.best().map(|r| r.descriptor), Some(rnn(7)));
    }
}
