//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use skirmish_core::components::UnitCommand;
use skirmish_core::config::MatchConfig;
use skirmish_core::simulation::Simulation;
use skirmish_test_utils::fixtures::{skirmish_config, started_match};

/// Default squads with every unit ordered onto an enemy.
fn engaged_match() -> Simulation {
    let mut sim = started_match(MatchConfig::default());
    // Player one spawns units 1..=5, player two 6..=10.
    for unit in 1..=5 {
        let player = sim.current_player().unwrap_or(1);
        let (attacker, target) = if player == 1 {
            (unit, unit + 5)
        } else {
            (unit + 5, unit)
        };
        sim.apply_command(
            player,
            UnitCommand::Attack {
                unit: attacker,
                target,
            },
        );
    }
    sim
}

/// Runs simulation benchmarks for the skirmish_core crate.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_idle_default_match", |b| {
        b.iter_batched(
            || started_match(MatchConfig::default()),
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("tick_engaged_default_match", |b| {
        b.iter_batched(
            engaged_match,
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash_skirmish", |b| {
        let sim = started_match(skirmish_config());
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
