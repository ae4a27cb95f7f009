//! Tick throughput benchmarks.
//!
//! A tick has a 16.67ms frame budget. These measure a full tick with the
//! camera following the player, a tick that forces a streaming batch, the
//! snapshot hash, and initial world seeding.
//!
//! Run with: `cargo bench --bench tick_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use shaftfall_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A simulation that has already run `warmup` ticks.
fn warmed_simulation(seed: u64, warmup: usize) -> (Simulation<RapierSubstrate>, GameState) {
    let mut sim =
        Simulation::with_rapier(SimConfig::with_seed(seed)).expect("default config is valid");
    let mut state = sim.new_game_state();
    for _ in 0..warmup {
        let camera = sim.camera_target().unwrap_or(0.0);
        sim.tick(&TickInput::new(16.667, camera), &mut state);
    }
    (sim, state)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_steady_tick(c: &mut Criterion) {
    let (mut sim, mut state) = warmed_simulation(1, 60);

    c.bench_function("tick_following_player", |b| {
        b.iter(|| {
            if state.is_game_over {
                state.reset(sim.player_position().map_or(0.0, |p| p.y));
            }
            let camera = sim.camera_target().unwrap_or(0.0);
            let registry = sim.tick(&TickInput::new(16.667, camera), &mut state);
            black_box(registry.len());
        });
    });
}

fn bench_streaming_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_with_camera_pan");
    for pan in [100.0f32, 400.0, 1600.0] {
        group.bench_with_input(BenchmarkId::from_parameter(pan as u32), &pan, |b, &pan| {
            let (mut sim, _) = warmed_simulation(2, 0);
            let mut sink: Vec<LifeDelta> = Vec::new();
            let mut camera = 0.0f32;
            b.iter(|| {
                camera += pan;
                sim.tick(&TickInput::new(16.667, camera), &mut sink);
                black_box(sim.last_diagnostics().spawned);
            });
        });
    }
    group.finish();
}

fn bench_state_hash(c: &mut Criterion) {
    let (sim, _) = warmed_simulation(3, 30);
    c.bench_function("state_hash", |b| {
        b.iter(|| black_box(sim.state_hash()));
    });
}

fn bench_seed_world(c: &mut Criterion) {
    c.bench_function("seed_world", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed += 1;
            let sim = Simulation::with_rapier(SimConfig::with_seed(seed))
                .expect("default config is valid");
            black_box(sim.registry().len());
        });
    });
}

criterion_group!(
    benches,
    bench_steady_tick,
    bench_streaming_tick,
    bench_state_hash,
    bench_seed_world
);
criterion_main!(benches);
