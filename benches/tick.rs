//! Benchmarks for the population tick.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use cell_field::{
    compute::{
        Context, PopulationManager,
        evolution::{FitnessEvaluator, MutationEngine},
    },
    schema::{
        DescriptorBounds, FeedError, FieldConfig, FitnessConfig, ObservationEvent,
        ObservationFeed,
    },
};

/// Feed that hands out the same small batch on every poll.
struct RepeatingFeed {
    batch: Vec<ObservationEvent>,
}

impl RepeatingFeed {
    fn new(size: usize) -> Self {
        let batch = (0..size)
            .map(|i| {
                let affect = ((i as f32) * 0.37).sin();
                ObservationEvent::now("bench", format!("event {} load rising", i), affect)
            })
            .collect();
        Self { batch }
    }
}

impl ObservationFeed for RepeatingFeed {
    fn poll_batch(&mut self, max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
        Ok(self.batch.iter().take(max).cloned().collect())
    }
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for max_size in [100, 1_000, 10_000] {
        let mut config = FieldConfig {
            random_seed: Some(42),
            ..FieldConfig::default()
        };
        config.population.initial_size = max_size / 4;
        config.population.max_size = max_size;

        let mut manager = match PopulationManager::new(config) {
            Ok(manager) => manager,
            Err(e) => panic!("invalid bench config: {}", e),
        };
        let mut feed = RepeatingFeed::new(16);

        group.bench_with_input(
            BenchmarkId::from_parameter(max_size),
            &max_size,
            |b, _| {
                b.iter(|| {
                    black_box(manager.tick(&mut feed));
                });
            },
        );
    }

    group.finish();
}

fn bench_evaluate_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_all");

    let evaluator = FitnessEvaluator::new(FitnessConfig::default());
    let (context, _) = Context::from_batch(RepeatingFeed::new(32).batch);
    let context = context.unwrap_or_else(Context::neutral);
    let bounds = DescriptorBounds::default();

    for count in [100, 1_000, 10_000] {
        let mut engine = MutationEngine::new(7);
        let descriptors: Vec<_> = (0..count)
            .map(|_| engine.random_descriptor(&bounds))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(evaluator.evaluate_all(black_box(&descriptors), &context)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_evaluate_all);
criterion_main!(benches);
