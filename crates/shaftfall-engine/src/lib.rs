//! Shaftfall Engine -- the descent simulation driver.
//!
//! This crate builds on [`shaftfall_core`] and drives the world forward: a
//! rigid-body [`Substrate`](physics::Substrate) backed by rapier2d, camera
//! relative streaming of obstacle rows and wall tiles, the player control
//! layer, autonomous patrols, the landing rule engine, and the bounded
//! [`Simulation`](tick::Simulation) step that ties them together.
//!
//! # Quick Start
//!
//! ```
//! use shaftfall_engine::prelude::*;
//!
//! let mut sim = Simulation::with_rapier(SimConfig::with_seed(42)).unwrap();
//! let mut state = sim.new_game_state();
//!
//! let mut queue = EventQueue::new();
//! queue.push(InputEvent::move_right());
//!
//! let camera = sim.camera_target().unwrap_or(0.0);
//! sim.tick(&TickInput::new(16.0, camera).with_queue(&mut queue), &mut state);
//!
//! assert_eq!(state.lives, MAX_LIVES);
//! assert!(queue.is_empty());
//! ```

#![deny(unsafe_code)]

pub mod behavior;
pub mod config;
pub mod control;
pub mod physics;
pub mod replay;
pub mod rules;
pub mod streaming;
pub mod tick;

use shaftfall_core::entity::Category;

/// Re-export the core crate for convenience.
pub use shaftfall_core;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced when building or validating a [`SimConfig`](config::SimConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("play width must be positive and finite, got {0}")]
    InvalidWidth(f32),

    #[error("viewport height must be positive and finite, got {0}")]
    InvalidViewport(f32),

    #[error("max step must be positive and finite, got {0} ms")]
    InvalidStep(f32),

    #[error("invalid rule value for {field}: {value}")]
    InvalidRule { field: &'static str, value: f32 },

    #[error("invalid streaming value for {field}: {value}")]
    InvalidStreaming { field: &'static str, value: f32 },

    #[error("spawn table is empty")]
    EmptySpawnTable,

    /// A cumulative bound did not exceed the one before it.
    #[error("spawn table bound {bound} for '{category}' must exceed the previous bound {previous}")]
    NonIncreasingBound {
        category: Category,
        bound: f32,
        previous: f32,
    },

    #[error("spawn table must end at 1.0, ends at {0}")]
    UnterminatedSpawnTable(f32),

    #[error("'{0}' cannot appear in a spawn table")]
    NotAnObstacle(Category),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors produced by replay recording and playback.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("tick {tick} recorded after tick {previous}; ticks must increase")]
    NonMonotonicTick { tick: u64, previous: u64 },

    #[error("replay log has more than one input for tick {tick}")]
    DuplicateInput { tick: u64 },

    #[error("replay log has more than one checkpoint for tick {tick}")]
    DuplicateCheckpoint { tick: u64 },

    #[error("replay log config is invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("replay log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Everything from the core prelude.
    pub use shaftfall_core::prelude::*;

    pub use crate::config::{
        CategoryParams, Reaction, RuleSet, ShaftLayout, SimConfig, SpawnTable, StreamingConfig,
        REFERENCE_HZ,
    };
    pub use crate::physics::{
        BodyDesc, BodyKind, ContactBegin, ContactBody, RapierSubstrate, Substrate,
    };
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::rules::{classify, is_landing, landing_angle, RuleOutcome};
    pub use crate::tick::{Simulation, TickDiagnostics, TickInput};
    pub use crate::{ConfigError, ReplayError};
}
