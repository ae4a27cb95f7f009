//! Headless descent demo -- a scripted player falls through a seeded shaft.
//!
//! Run with:
//!   cargo run --example headless_descent -p shaftfall-engine -- [seed] [ticks] [config.json]
//!
//! Logging follows `RUST_LOG` (for example `RUST_LOG=shaftfall_engine=debug`).
//! The run is recorded and replayed at the end to check determinism.

use anyhow::Context;
use shaftfall_engine::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let seed: u64 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("seed must be an integer, got {s:?}"))?,
        None => 2024,
    };
    let ticks: u64 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("ticks must be an integer, got {s:?}"))?,
        None => 1800,
    };
    let mut config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            SimConfig::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => SimConfig::default(),
    };
    config.seed = seed;

    let mut sim = Simulation::with_rapier(config.clone())?;
    let mut state = sim.new_game_state();
    let mut recorder = ReplayRecorder::new(config, 60);
    let mut queue = EventQueue::new();

    for tick in 0..ticks {
        // Zig-zag: change direction every second, hop every three.
        if tick % 60 == 0 {
            let direction = if (tick / 60) % 2 == 0 { 1 } else { -1 };
            queue.push_json(&serde_json::json!({ "move": { "direction": direction } }));
        }
        if tick % 180 == 90 {
            queue.push(InputEvent::jump());
        }

        let camera = sim.camera_target().unwrap_or(state.camera_offset);
        state.set_camera_offset(camera);
        let input = TickInput::new(16.667, camera).with_queue(&mut queue);

        recorder.record_tick(tick, &input, Some(sim.state_hash()))?;
        sim.tick(&input, &mut state);

        if tick % 300 == 0 {
            let diag = sim.last_diagnostics();
            tracing::info!(
                tick,
                lives = state.lives,
                score = state.score,
                entities = sim.registry().len(),
                contacts = diag.contacts,
                total_us = diag.total_time.as_micros() as u64,
                "progress"
            );
        }
        if state.is_game_over {
            break;
        }
    }

    println!(
        "seed {seed}: {} ticks, score {}, lives {}, game over: {}",
        sim.tick_count(),
        state.score,
        state.lives,
        state.is_game_over
    );

    let log = recorder.finish();
    let result = replay(&log)?;
    anyhow::ensure!(
        result.first_divergence.is_none(),
        "replay diverged: {:?}",
        result.first_divergence
    );
    println!(
        "replay verified: {} ticks, final score {}",
        result.ticks_replayed, result.final_state.score
    );

    let _ = sim.teardown();
    Ok(())
}
