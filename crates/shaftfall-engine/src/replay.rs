//! Input recording and deterministic replay with hash checkpoints.
//!
//! A run is fully determined by its [`SimConfig`] (seed included) and the
//! sequence of [`TickInput`]s fed to it. [`ReplayRecorder`] captures both,
//! plus periodic registry hashes; [`replay`] rebuilds a fresh rapier-backed
//! simulation from the log, feeds the inputs back, and compares hashes.
//!
//! Recording and replay both drive a [`GameState`] sink, so life changes and
//! game over play out the same way on both sides.
//!
//! ```
//! use shaftfall_engine::prelude::*;
//!
//! let config = SimConfig::with_seed(11);
//! let mut sim = Simulation::with_rapier(config.clone()).unwrap();
//! let mut state = sim.new_game_state();
//! let mut recorder = ReplayRecorder::new(config, 5);
//!
//! for tick in 0..20 {
//!     let input = TickInput::new(16.0, sim.camera_target().unwrap_or(0.0));
//!     recorder.record_tick(tick, &input, Some(sim.state_hash())).unwrap();
//!     sim.tick(&input, &mut state);
//! }
//!
//! let result = replay(&recorder.finish()).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shaftfall_core::state::GameState;
use tracing::{debug, warn};

use crate::config::SimConfig;
use crate::tick::{Simulation, TickInput};
use crate::ReplayError;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// Config, inputs, and checkpoints for one recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Config the run started from. Its seed drives all generation.
    pub config: SimConfig,
    /// Replay executes ticks `0..total_ticks`: one past the last recorded tick.
    pub total_ticks: u64,
    pub entries: Vec<ReplayEntry>,
}

impl ReplayLog {
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One entry in a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// The input fed to `tick`.
    Input { tick: u64, input: TickInput },
    /// Registry hash taken before `tick` ran.
    Checkpoint { tick: u64, state_hash: String },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of [`replay`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Every tick ran and every checkpoint matched.
    pub completed: bool,
    pub ticks_replayed: u64,
    /// First checkpoint whose hash did not match, if any.
    pub first_divergence: Option<ReplayDivergence>,
    /// Game state when replay stopped.
    pub final_state: GameState,
}

/// A checkpoint that failed to reproduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Builds a [`ReplayLog`] tick by tick.
///
/// Call [`record_tick`](Self::record_tick) before each tick with the input
/// about to be fed and, optionally, the current state hash. Ticks must be
/// recorded in strictly increasing order.
pub struct ReplayRecorder {
    log: ReplayLog,
    /// 0 records a checkpoint whenever a hash is supplied.
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_tick: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(config: SimConfig, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                config,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            ticks_recorded: 0,
            last_tick: None,
        }
    }

    /// Record the input for `tick` and, on the checkpoint interval, its hash.
    ///
    /// # Errors
    ///
    /// [`ReplayError::NonMonotonicTick`] if `tick` is not greater than the
    /// previously recorded tick. Nothing is recorded in that case.
    pub fn record_tick(
        &mut self,
        tick: u64,
        input: &TickInput,
        state_hash: Option<String>,
    ) -> Result<(), ReplayError> {
        if let Some(previous) = self.last_tick {
            if tick <= previous {
                return Err(ReplayError::NonMonotonicTick { tick, previous });
            }
        }
        self.last_tick = Some(tick);
        self.ticks_recorded += 1;

        self.log.entries.push(ReplayEntry::Input {
            tick,
            input: input.clone(),
        });

        if let Some(hash) = state_hash {
            let due = self.checkpoint_interval == 0 || tick % self.checkpoint_interval == 0;
            if due {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    tick,
                    state_hash: hash,
                });
            }
        }
        Ok(())
    }

    pub fn ticks_recorded(&self) -> u64 {
        self.ticks_recorded
    }

    /// Close the log. Replay covers every tick up to and including the last
    /// recorded one; ticks skipped while recording replay with no input.
    pub fn finish(mut self) -> ReplayLog {
        self.log.total_ticks = self.last_tick.map_or(0, |tick| tick + 1);
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Re-run `log` on a fresh rapier-backed simulation and verify its checkpoints.
///
/// Ticks without a recorded input get a zero-length input. Replay stops at the
/// first checkpoint mismatch.
///
/// # Errors
///
/// The log is validated before anything runs: duplicate inputs or checkpoints
/// for one tick and an invalid config are errors.
pub fn replay(log: &ReplayLog) -> Result<ReplayResult, ReplayError> {
    let mut inputs: BTreeMap<u64, &TickInput> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();
    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if inputs.insert(*tick, input).is_some() {
                    return Err(ReplayError::DuplicateInput { tick: *tick });
                }
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoints.insert(*tick, state_hash.as_str()).is_some() {
                    return Err(ReplayError::DuplicateCheckpoint { tick: *tick });
                }
            }
        }
    }

    let mut sim = Simulation::with_rapier(log.config.clone())?;
    let mut state = sim.new_game_state();

    let empty = TickInput::default();
    let mut ticks_replayed = 0;
    for tick in 0..log.total_ticks {
        if let Some(expected) = checkpoints.get(&tick) {
            let actual = sim.state_hash();
            if actual != *expected {
                warn!(tick, expected = %expected, actual = %actual, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: (*expected).to_owned(),
                        actual_hash: actual,
                    }),
                    final_state: state,
                });
            }
        }
        let input = inputs.get(&tick).copied().unwrap_or(&empty);
        sim.tick(input, &mut state);
        ticks_replayed += 1;
    }

    debug!(ticks_replayed, score = state.score, lives = state.lives, "replay complete");
    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
        final_state: state,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use shaftfall_core::input::InputEvent;

    fn record(seed: u64, ticks: u64, interval: u64) -> ReplayLog {
        let config = SimConfig::with_seed(seed);
        let mut sim = Simulation::with_rapier(config.clone()).unwrap();
        let mut state = sim.new_game_state();
        let mut recorder = ReplayRecorder::new(config, interval);
        for tick in 0..ticks {
            let mut input = TickInput::new(16.0, sim.camera_target().unwrap_or(0.0));
            if tick % 20 == 3 {
                input.events.push(InputEvent::move_left());
            } else if tick % 20 == 13 {
                input.events.push(InputEvent::move_right());
            }
            recorder.record_tick(tick, &input, Some(sim.state_hash())).unwrap();
            sim.tick(&input, &mut state);
        }
        recorder.finish()
    }

    #[test]
    fn recorded_run_replays_exactly() {
        let log = record(21, 60, 10);
        assert_eq!(log.total_ticks, 60);
        let result = replay(&log).unwrap();
        assert!(result.completed);
        assert_eq!(result.ticks_replayed, 60);
        assert!(result.first_divergence.is_none());
    }

    #[test]
    fn tampered_checkpoint_is_reported() {
        let mut log = record(22, 30, 10);
        for entry in &mut log.entries {
            if let ReplayEntry::Checkpoint { tick: 20, state_hash } = entry {
                *state_hash = "0".repeat(64);
            }
        }
        let result = replay(&log).unwrap();
        assert!(!result.completed);
        assert_eq!(result.ticks_replayed, 20);
        assert_eq!(result.first_divergence.unwrap().tick, 20);
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let mut log = record(23, 3, 0);
        log.entries.push(ReplayEntry::Input {
            tick: 1,
            input: TickInput::default(),
        });
        assert!(matches!(replay(&log), Err(ReplayError::DuplicateInput { tick: 1 })));
    }

    #[test]
    fn recorder_rejects_out_of_order_ticks() {
        let mut recorder = ReplayRecorder::new(SimConfig::default(), 0);
        recorder.record_tick(5, &TickInput::default(), None).unwrap();
        let err = recorder.record_tick(5, &TickInput::default(), None).unwrap_err();
        assert!(matches!(err, ReplayError::NonMonotonicTick { tick: 5, previous: 5 }));
        assert_eq!(recorder.ticks_recorded(), 1);
    }

    #[test]
    fn sparse_ticks_replay_up_to_the_last_one() {
        let mut recorder = ReplayRecorder::new(SimConfig::with_seed(25), 0);
        recorder
            .record_tick(5, &TickInput::new(16.0, 0.0), Some("bad-5".to_owned()))
            .unwrap();
        recorder
            .record_tick(10, &TickInput::new(16.0, 0.0), Some("bad-10".to_owned()))
            .unwrap();
        assert_eq!(recorder.ticks_recorded(), 2);

        let log = recorder.finish();
        assert_eq!(log.total_ticks, 11);

        // The first recorded checkpoint is reached and checked.
        let result = replay(&log).unwrap();
        assert!(!result.completed);
        assert_eq!(result.ticks_replayed, 5);
        let divergence = result.first_divergence.unwrap();
        assert_eq!(divergence.tick, 5);
        assert_eq!(divergence.expected_hash, "bad-5");
    }

    #[test]
    fn sparse_ticks_with_real_hashes_replay_cleanly() {
        let config = SimConfig::with_seed(26);
        let mut sim = Simulation::with_rapier(config.clone()).unwrap();
        let mut state = sim.new_game_state();
        let mut recorder = ReplayRecorder::new(config, 0);
        for tick in 0..12u64 {
            let input = TickInput::new(16.0, sim.camera_target().unwrap_or(0.0));
            // Only every third tick has anything worth recording.
            if tick % 3 == 0 {
                recorder.record_tick(tick, &input, Some(sim.state_hash())).unwrap();
                sim.tick(&input, &mut state);
            } else {
                sim.tick(&TickInput::default(), &mut state);
            }
        }
        let log = recorder.finish();
        assert_eq!(log.total_ticks, 10);

        let result = replay(&log).unwrap();
        assert!(result.completed, "{:?}", result.first_divergence);
        assert_eq!(result.ticks_replayed, 10);
    }

    #[test]
    fn empty_recorder_replays_nothing() {
        let log = ReplayRecorder::new(SimConfig::with_seed(27), 5).finish();
        assert_eq!(log.total_ticks, 0);
        let result = replay(&log).unwrap();
        assert!(result.completed);
        assert_eq!(result.ticks_replayed, 0);
    }

    #[test]
    fn log_survives_json() {
        let log = record(24, 10, 5);
        let json = log.to_json().unwrap();
        let back = ReplayLog::from_json(&json).unwrap();
        assert_eq!(back, log);
        assert!(replay(&back).unwrap().completed);
    }
}
