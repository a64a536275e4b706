//! Adaptation emitter: rule evaluation over aggregate metrics.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use log::debug;

use crate::schema::{AdaptationConfig, AdaptationRule, AdaptationSignal, AggregateMetrics, Condition};

/// Turns per-tick metrics into at most one signal per parameter.
#[derive(Debug)]
pub struct AdaptationEmitter {
    rules: Vec<AdaptationRule>,
    window: u64,
    /// Tick of every signal emitted within the dissonance window.
    recent: VecDeque<u64>,
    /// Last value emitted per parameter.
    last_values: HashMap<String, f64>,
}

impl AdaptationEmitter {
    pub fn new(config: AdaptationConfig) -> Self {
        Self {
            rules: config.rules,
            window: config.dissonance_window,
            recent: VecDeque::new(),
            last_values: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &[AdaptationRule] {
        &self.rules
    }

    /// Field dissonance: affect variance plus a tenth of the signals emitted
    /// in the preceding window, capped at 1.
    pub fn dissonance(&self, metrics: &AggregateMetrics) -> f32 {
        let emitted = self
            .recent
            .iter()
            .filter(|&&tick| tick < metrics.tick && metrics.tick - tick < self.window)
            .count();
        let variance = if metrics.affect_variance.is_finite() {
            metrics.affect_variance.max(0.0)
        } else {
            0.0
        };
        (variance + emitted as f32 / 10.0).min(1.0)
    }

    /// Value last emitted for `parameter`.
    pub fn last_value(&self, parameter: &str) -> Option<f64> {
        self.last_values.get(parameter).copied()
    }

    /// Evaluate every rule against `metrics`.
    ///
    /// For each parameter the last matching rule wins. Signals are returned in
    /// the order of their winning rules.
    pub fn evaluate(&mut self, metrics: &AggregateMetrics, now: DateTime<Utc>) -> Vec<AdaptationSignal> {
        let dissonance = self.dissonance(metrics);

        let mut winners: HashMap<&str, usize> = HashMap::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if holds(&rule.condition, metrics, dissonance) {
                winners.insert(rule.parameter.as_str(), index);
            }
        }
        let mut indices: Vec<usize> = winners.into_values().collect();
        indices.sort_unstable();

        let signals: Vec<AdaptationSignal> = indices
            .into_iter()
            .map(|index| {
                let rule = &self.rules[index];
                AdaptationSignal {
                    tick: metrics.tick,
                    parameter: rule.parameter.clone(),
                    value: rule.value,
                    previous: self.last_values.get(&rule.parameter).copied(),
                    reason: rule.reason.clone(),
                    timestamp: now,
                }
            })
            .collect();

        for signal in &signals {
            debug!(
                "Tick {}: signal {} = {} ({})",
                signal.tick, signal.parameter, signal.value, signal.reason
            );
            self.last_values.insert(signal.parameter.clone(), signal.value);
            self.recent.push_back(signal.tick);
        }

        while let Some(&tick) = self.recent.front() {
            if metrics.tick.saturating_sub(tick) >= self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        signals
    }
}

/// Whether `condition` holds for the given metrics.
pub fn holds(condition: &Condition, metrics: &AggregateMetrics, dissonance: f32) -> bool {
    match condition {
        Condition::MeanFitnessBelow(v) => metrics.mean_fitness < *v,
        Condition::MeanFitnessAbove(v) => metrics.mean_fitness > *v,
        Condition::DiversityBelow(v) => metrics.diversity < *v,
        Condition::DiversityAbove(v) => metrics.diversity > *v,
        Condition::PopulationBelow(n) => metrics.population < *n,
        Condition::PopulationAbove(n) => metrics.population > *n,
        Condition::Extinct => metrics.extinct,
        Condition::Degraded => metrics.degraded,
        Condition::DissonanceAbove(v) => dissonance > *v,
        Condition::All(conditions) => conditions.iter().all(|c| holds(c, metrics, dissonance)),
        Condition::Any(conditions) => conditions.iter().any(|c| holds(c, metrics, dissonance)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(condition: Condition, parameter: &str, value: f64) -> AdaptationRule {
        AdaptationRule {
            condition,
            parameter: parameter.to_string(),
            value,
            reason: format!("{parameter} -> {value}"),
        }
    }

    fn metrics(tick: u64) -> AggregateMetrics {
        AggregateMetrics {
            tick,
            population: 20,
            mean_fitness: 0.5,
            best_fitness: 0.8,
            diversity: 0.6,
            ..AggregateMetrics::default()
        }
    }

    fn emitter(rules: Vec<AdaptationRule>) -> AdaptationEmitter {
        AdaptationEmitter::new(AdaptationConfig {
            rules,
            dissonance_window: 3,
        })
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let mut emitter = emitter(vec![
            rule(Condition::MeanFitnessAbove(0.1), "a", 1.0),
            rule(Condition::PopulationAbove(5), "b", 2.0),
            rule(Condition::MeanFitnessBelow(0.9), "a", 3.0),
            rule(Condition::Extinct, "a", 4.0),
        ]);

        let signals = emitter.evaluate(&metrics(1), Utc::now());
        let emitted: Vec<_> = signals
            .iter()
            .map(|s| (s.parameter.as_str(), s.value))
            .collect();
        // "b" wins at index 1, "a" at index 2; output follows winning index.
        assert_eq!(emitted, vec![("b", 2.0), ("a", 3.0)]);
    }

    #[test]
    fn test_extinction_overrides_diversity_rule() {
        let mut emitter = AdaptationEmitter::new(AdaptationConfig::default());
        let extinct = AggregateMetrics {
            tick: 4,
            extinct: true,
            ..AggregateMetrics::default()
        };
        let signals = emitter.evaluate(&extinct, Utc::now());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].parameter, "field.exploration_rate");
        assert_eq!(signals[0].value, 0.9);
    }

    #[test]
    fn test_previous_value_tracked() {
        let mut emitter = emitter(vec![
            rule(Condition::MeanFitnessBelow(0.6), "p", 1.0),
            rule(Condition::MeanFitnessBelow(0.4), "p", 2.0),
        ]);

        let first = emitter.evaluate(&metrics(1), Utc::now());
        assert_eq!(first[0].previous, None);

        let mut low = metrics(2);
        low.mean_fitness = 0.3;
        let second = emitter.evaluate(&low, Utc::now());
        assert_eq!(second[0].value, 2.0);
        assert_eq!(second[0].previous, Some(1.0));
        assert_eq!(emitter.last_value("p"), Some(2.0));
    }

    #[test]
    fn test_no_match_no_signal() {
        let mut emitter = emitter(vec![rule(Condition::Degraded, "p", 1.0)]);
        assert!(emitter.evaluate(&metrics(1), Utc::now()).is_empty());
    }

    #[test]
    fn test_dissonance_counts_recent_signals() {
        let mut emitter = emitter(vec![
            rule(Condition::PopulationAbove(0), "x", 1.0),
            rule(Condition::PopulationAbove(0), "y", 1.0),
        ]);
        let mut m = metrics(1);
        m.affect_variance = 0.25;
        assert!((emitter.dissonance(&m) - 0.25).abs() < 1e-6);

        emitter.evaluate(&m, Utc::now());
        m.tick = 2;
        // two signals from tick 1
        assert!((emitter.dissonance(&m) - 0.45).abs() < 1e-6);

        emitter.evaluate(&m, Utc::now());
        m.tick = 4;
        // tick 1 has left the window of 3
        assert!((emitter.dissonance(&m) - 0.45).abs() < 1e-6);

        m.affect_variance = 5.0;
        assert_eq!(emitter.dissonance(&m), 1.0);
    }

    #[test]
    fn test_nested_conditions() {
        let m = metrics(1);
        let all = Condition::All(vec![
            Condition::PopulationAbove(10),
            Condition::DiversityAbove(0.5),
        ]);
        let any = Condition::Any(vec![Condition::Extinct, Condition::MeanFitnessBelow(0.2)]);
        assert!(holds(&all, &m, 0.0));
        assert!(!holds(&any, &m, 0.0));
        assert!(holds(&Condition::DissonanceAbove(0.3), &m, 0.4));
        assert!(holds(&Condition::All(Vec::new()), &m, 0.0));
    }
}
