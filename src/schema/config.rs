//! Configuration types for the cell field.

use serde::{Deserialize, Serialize};

use super::{AdaptationRule, Condition, DescriptorBounds};

/// Top-level field configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Population size settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Death and birth thresholds.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Fitness weights and targets.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Mutation probabilities.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Structural parameter bounds.
    #[serde(default)]
    pub bounds: DescriptorBounds,
    /// Meta-learner settings.
    #[serde(default)]
    pub meta: MetaLearnerConfig,
    /// Adaptation rules.
    #[serde(default)]
    pub adaptation: AdaptationConfig,
    /// Tick schedule and queue sizes.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Audit store settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population size settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Cells created when seeding an empty population.
    #[serde(default = "default_initial_size")]
    pub initial_size: usize,
    /// Hard upper bound on live cells.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Maximum observations ingested per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            max_size: default_max_size(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_initial_size() -> usize {
    25
}
fn default_max_size() -> usize {
    100
}
fn default_batch_size() -> usize {
    64
}

/// Selection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Cells with fitness strictly below this die.
    #[serde(default = "default_death_threshold")]
    pub death_threshold: f32,
    /// Cells with fitness strictly above this reproduce.
    #[serde(default = "default_birth_threshold")]
    pub birth_threshold: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            death_threshold: default_death_threshold(),
            birth_threshold: default_birth_threshold(),
        }
    }
}

fn default_death_threshold() -> f32 {
    0.3
}
fn default_birth_threshold() -> f32 {
    0.65
}

/// Fitness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Component weights; must sum to 1.
    #[serde(default)]
    pub weights: FitnessWeights,
    /// Entropy the population is rewarded for approaching.
    #[serde(default = "default_target_entropy")]
    pub target_entropy: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            weights: FitnessWeights::default(),
            target_entropy: default_target_entropy(),
        }
    }
}

fn default_target_entropy() -> f32 {
    0.5
}

/// Weights of the three fitness terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitnessWeights {
    pub resonance: f32,
    pub entropy: f32,
    pub surprise: f32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            resonance: 0.5,
            entropy: 0.25,
            surprise: 0.25,
        }
    }
}

impl FitnessWeights {
    pub fn sum(&self) -> f32 {
        self.resonance + self.entropy + self.surprise
    }
}

/// Mutation probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability of replacing a child with the best recalled pattern.
    #[serde(default = "default_bias_probability")]
    pub bias_probability: f32,
    /// Probability of one structural change when bias does not fire.
    #[serde(default = "default_structural_probability")]
    pub structural_probability: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            bias_probability: default_bias_probability(),
            structural_probability: default_structural_probability(),
        }
    }
}

fn default_bias_probability() -> f32 {
    0.2
}
fn default_structural_probability() -> f32 {
    0.7
}

/// Meta-learner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaLearnerConfig {
    /// Maximum lineage records kept.
    #[serde(default = "default_meta_capacity")]
    pub capacity: usize,
    /// Minimum age for a cell to be recorded.
    #[serde(default = "default_survival_age")]
    pub survival_age_threshold: u64,
    /// Mean fitness a cell must exceed to be recorded.
    #[serde(default = "default_success_cutoff")]
    pub success_cutoff: f32,
}

impl Default for MetaLearnerConfig {
    fn default() -> Self {
        Self {
            capacity: default_meta_capacity(),
            survival_age_threshold: default_survival_age(),
            success_cutoff: default_success_cutoff(),
        }
    }
}

fn default_meta_capacity() -> usize {
    256
}
fn default_survival_age() -> u64 {
    5
}
fn default_success_cutoff() -> f32 {
    0.6
}

/// Adaptation emitter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Rules in priority order; later matches override earlier ones.
    #[serde(default = "default_rules")]
    pub rules: Vec<AdaptationRule>,
    /// Ticks over which emitted signals count towards dissonance.
    #[serde(default = "default_dissonance_window")]
    pub dissonance_window: u64,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            dissonance_window: default_dissonance_window(),
        }
    }
}

fn default_rules() -> Vec<AdaptationRule> {
    vec![
        AdaptationRule {
            condition: Condition::DiversityBelow(0.2),
            parameter: "field.exploration_rate".to_string(),
            value: 0.5,
            reason: "architecture diversity collapsed".to_string(),
        },
        AdaptationRule {
            condition: Condition::Extinct,
            parameter: "field.exploration_rate".to_string(),
            value: 0.9,
            reason: "population extinct".to_string(),
        },
        AdaptationRule {
            condition: Condition::MeanFitnessAbove(0.7),
            parameter: "vm.swappiness".to_string(),
            value: 30.0,
            reason: "population thriving".to_string(),
        },
        AdaptationRule {
            condition: Condition::DissonanceAbove(0.6),
            parameter: "vm.swappiness".to_string(),
            value: 10.0,
            reason: "affective dissonance".to_string(),
        },
    ]
}
fn default_dissonance_window() -> u64 {
    12
}

/// Tick schedule and queue sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Milliseconds between ticks.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Observation queue capacity; the oldest events drop on overflow.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    /// Signal queue capacity; the oldest signals drop on overflow.
    #[serde(default = "default_signal_capacity")]
    pub signal_capacity: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            feed_capacity: default_feed_capacity(),
            signal_capacity: default_signal_capacity(),
        }
    }
}

fn default_period_ms() -> u64 {
    5000
}
fn default_feed_capacity() -> usize {
    1024
}
fn default_signal_capacity() -> usize {
    64
}

/// Audit store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file; auditing is off when unset.
    #[serde(default)]
    pub path: Option<String>,
    /// Entries replayed from the end of the file at startup.
    #[serde(default)]
    pub replay_entries: usize,
    /// Append every ingested observation.
    #[serde(default = "default_true")]
    pub record_observations: bool,
    /// Append every fitness record.
    #[serde(default = "default_true")]
    pub record_fitness: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            replay_entries: 0,
            record_observations: true,
            record_fitness: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl FieldConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let population = &self.population;
        if population.initial_size == 0 {
            return Err(ConfigError::InvalidPopulation(
                "initial_size must be at least 1".to_string(),
            ));
        }
        if population.max_size == 0 {
            return Err(ConfigError::InvalidPopulation(
                "max_size must be at least 1".to_string(),
            ));
        }
        if population.initial_size > population.max_size {
            return Err(ConfigError::InvalidPopulation(format!(
                "initial_size ({}) exceeds max_size ({})",
                population.initial_size, population.max_size
            )));
        }
        if population.batch_size == 0 {
            return Err(ConfigError::InvalidPopulation(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let SelectionConfig {
            death_threshold,
            birth_threshold,
        } = self.selection;
        if !(0.0..=1.0).contains(&death_threshold)
            || !(0.0..=1.0).contains(&birth_threshold)
            || death_threshold >= birth_threshold
        {
            return Err(ConfigError::InvalidThresholds {
                death: death_threshold,
                birth: birth_threshold,
            });
        }

        let weights = self.fitness.weights;
        for w in [weights.resonance, weights.entropy, weights.surprise] {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::InvalidWeight(format!(
                    "Weight {} must be finite and non-negative",
                    w
                )));
            }
        }
        if (weights.sum() - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeight(format!(
                "Weights sum to {}, expected 1",
                weights.sum()
            )));
        }
        check_unit(self.fitness.target_entropy, "target_entropy")?;

        check_unit(self.mutation.bias_probability, "bias_probability")?;
        check_unit(self.mutation.structural_probability, "structural_probability")?;

        let check_bounds = |bounds: (u32, u32), name: &str| {
            if bounds.0 == 0 || bounds.0 > bounds.1 {
                Err(ConfigError::InvalidBounds(format!(
                    "{} min ({}) must be positive and <= max ({})",
                    name, bounds.0, bounds.1
                )))
            } else {
                Ok(())
            }
        };
        check_bounds(self.bounds.layers, "layers")?;
        check_bounds(self.bounds.width, "width")?;
        check_bounds(self.bounds.kernel, "kernel")?;
        if self.bounds.heads.is_empty() || self.bounds.heads.contains(&0) {
            return Err(ConfigError::InvalidBounds(
                "heads must be a non-empty set of positive counts".to_string(),
            ));
        }
        if self.bounds.kinds.is_empty() {
            return Err(ConfigError::InvalidBounds(
                "at least one descriptor kind must be allowed".to_string(),
            ));
        }

        if self.meta.capacity == 0 {
            return Err(ConfigError::InvalidMeta(
                "capacity must be at least 1".to_string(),
            ));
        }
        check_unit(self.meta.success_cutoff, "success_cutoff")?;

        if self.schedule.period_ms == 0 {
            return Err(ConfigError::InvalidSchedule(
                "period_ms must be positive".to_string(),
            ));
        }
        if self.schedule.feed_capacity == 0 || self.schedule.signal_capacity == 0 {
            return Err(ConfigError::InvalidSchedule(
                "queue capacities must be at least 1".to_string(),
            ));
        }

        for (i, rule) in self.adaptation.rules.iter().enumerate() {
            if rule.parameter.trim().is_empty() || !rule.value.is_finite() {
                return Err(ConfigError::InvalidRule {
                    index: i,
                    parameter: rule.parameter.clone(),
                });
            }
        }

        Ok(())
    }
}

fn check_unit(value: f32, name: &str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange {
            name: name.to_string(),
            value,
        })
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid population settings: {0}")]
    InvalidPopulation(String),
    #[error("Death threshold ({death}) must be below birth threshold ({birth}), both in [0, 1]")]
    InvalidThresholds { death: f32, birth: f32 },
    #[error("Invalid fitness weight: {0}")]
    InvalidWeight(String),
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: String, value: f32 },
    #[error("Invalid parameter bounds: {0}")]
    InvalidBounds(String),
    #[error("Invalid meta-learner settings: {0}")]
    InvalidMeta(String),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Adaptation rule {index} ({parameter:?}) needs a parameter name and a finite value")]
    InvalidRule { index: usize, parameter: String },
}
