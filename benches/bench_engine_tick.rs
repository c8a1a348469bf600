use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rail_corridor::control_system::advisor::PriorityAdvisor;
use rail_corridor::corridor::Corridor;
use rail_corridor::shared_data::ScheduleEntry;
use rail_corridor::simulation_engine::schedule::InMemorySchedule;
use rail_corridor::simulation_engine::{Engine, EngineConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn create_schedule(size: usize, seed: u64) -> InMemorySchedule {
    let mut rng = StdRng::seed_from_u64(seed);
    InMemorySchedule::new(
        (0..size)
            .map(|i| ScheduleEntry {
                id: format!("T{:03}", i).into(),
                name: format!("Train {}", i),
                class: "mixed".to_string(),
                priority: rng.random_range(1..=10),
                speed_kmh: rng.random_range(50.0..130.0),
                departure_time_seconds: rng.random_range(0..3600),
            })
            .collect(),
    )
}

fn create_engine(size: usize) -> Engine {
    Engine::new(
        Corridor::mumbai_pune(),
        Arc::new(create_schedule(size, 7)),
        Arc::new(PriorityAdvisor),
        EngineConfig::default(),
    )
}

/// One simulated hour of ticks. Escalations are collected but not dispatched,
/// so no runtime is needed.
fn bench_engine_hour(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_hour");

    for &size in &[5, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let engine = create_engine(size);
                let mut escalations = 0;
                for _ in 0..60 {
                    escalations += engine.advance().len();
                }
                black_box(escalations);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine_hour);
criterion_main!(benches);
