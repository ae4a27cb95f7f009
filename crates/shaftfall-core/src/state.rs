//! Streaming marks, the life/score sink, and the consumer-side game state.
//!
//! The simulation never owns lives or score. It reports [`LifeDelta`]s and
//! progress through a [`RuleSink`]; [`GameState`] is the stock sink that
//! clamps lives, tracks score, and latches game over.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::Category;

/// Lives at the start of a run and the upper clamp for every change.
pub const MAX_LIVES: u32 = 10;

/// World units of downward progress per score point.
pub const DEFAULT_SCORE_UNIT: f32 = 10.0;

// ---------------------------------------------------------------------------
// WorldCursor
// ---------------------------------------------------------------------------

/// High-water marks that gate streaming work, in world Y.
///
/// Marks only move downward; advancing to a smaller Y is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldCursor {
    /// Y of the last generated obstacle row.
    pub last_obstacle_y: f32,
    /// First Y not yet covered by boundary tiles.
    pub last_boundary_y: f32,
    /// Y below which everything has already been cleaned up.
    pub last_cleanup_y: f32,
}

impl WorldCursor {
    pub fn new(last_obstacle_y: f32, last_boundary_y: f32, last_cleanup_y: f32) -> Self {
        Self {
            last_obstacle_y,
            last_boundary_y,
            last_cleanup_y,
        }
    }

    pub fn advance_obstacles(&mut self, y: f32) {
        self.last_obstacle_y = self.last_obstacle_y.max(y);
    }

    pub fn advance_boundaries(&mut self, y: f32) {
        self.last_boundary_y = self.last_boundary_y.max(y);
    }

    pub fn advance_cleanup(&mut self, y: f32) {
        self.last_cleanup_y = self.last_cleanup_y.max(y);
    }

    /// The cleanup line for `camera_offset`, if it has moved past the mark.
    pub fn cleanup_due(&self, camera_offset: f32, lookbehind: f32) -> Option<f32> {
        let threshold = camera_offset - lookbehind;
        (threshold > self.last_cleanup_y).then_some(threshold)
    }

    /// Whether the spawn line for `camera_offset` has passed the boundary mark.
    pub fn spawn_due(&self, camera_offset: f32, viewport_height: f32, lookahead: f32) -> bool {
        camera_offset + viewport_height + lookahead > self.last_boundary_y
    }
}

// ---------------------------------------------------------------------------
// LifeDelta / RuleSink
// ---------------------------------------------------------------------------

/// A change to the life counter and the category that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeDelta {
    pub delta: i32,
    pub cause: Category,
}

/// Receives rule outcomes synchronously during collision resolution.
pub trait RuleSink {
    /// A landing collision changed the life counter by `delta.delta`.
    fn life_delta(&mut self, delta: LifeDelta);

    /// The player's current Y after a tick's integration.
    fn progress(&mut self, _player_y: f32) {}

    /// When true, the simulation stops changing gameplay state.
    fn is_game_over(&self) -> bool {
        false
    }
}

/// Records deltas without interpreting them.
impl RuleSink for Vec<LifeDelta> {
    fn life_delta(&mut self, delta: LifeDelta) {
        self.push(delta);
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Lives, score, camera, and the game-over latch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Always in `[0, MAX_LIVES]`.
    pub lives: u32,
    /// Never decreases during a run.
    pub score: u64,
    /// Camera top in world Y, set by the presentation layer.
    pub camera_offset: f32,
    pub is_game_over: bool,
    /// Player Y at the start of the run; score counts from here.
    pub start_y: f32,
    /// Deepest player Y seen so far.
    pub deepest_y: f32,
    pub score_unit: f32,
}

impl GameState {
    pub fn new(start_y: f32) -> Self {
        Self {
            lives: MAX_LIVES,
            score: 0,
            camera_offset: 0.0,
            is_game_over: false,
            start_y,
            deepest_y: start_y,
            score_unit: DEFAULT_SCORE_UNIT,
        }
    }

    /// Apply a signed change to lives, clamped to `[0, MAX_LIVES]`.
    ///
    /// Ignored once the game is over. Reaching zero latches game over.
    pub fn apply_life_delta(&mut self, delta: i32) {
        if self.is_game_over {
            debug!(delta, "life delta ignored after game over");
            return;
        }
        let next = (self.lives as i64 + delta as i64).clamp(0, MAX_LIVES as i64);
        self.lives = next as u32;
        if self.lives == 0 {
            self.is_game_over = true;
            info!(score = self.score, "game over");
        }
    }

    /// Record the player's Y; score follows the deepest point reached.
    pub fn record_progress(&mut self, player_y: f32) {
        if self.is_game_over || !player_y.is_finite() {
            return;
        }
        if player_y > self.deepest_y {
            self.deepest_y = player_y;
        }
        let depth = (self.deepest_y - self.start_y).max(0.0);
        let points = (depth / self.score_unit).floor() as u64;
        self.score = self.score.max(points);
    }

    pub fn set_camera_offset(&mut self, camera_offset: f32) {
        self.camera_offset = camera_offset;
    }

    /// Start a new run from `start_y`.
    pub fn reset(&mut self, start_y: f32) {
        let score_unit = self.score_unit;
        *self = Self::new(start_y);
        self.score_unit = score_unit;
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl RuleSink for GameState {
    fn life_delta(&mut self, delta: LifeDelta) {
        info!(delta = delta.delta, cause = %delta.cause, lives = self.lives, "life delta");
        self.apply_life_delta(delta.delta);
    }

    fn progress(&mut self, player_y: f32) {
        self.record_progress(player_y);
    }

    fn is_game_over(&self) -> bool {
        self.is_game_over
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. Lives -----------------------------------------------------------

    #[test]
    fn lives_start_at_max() {
        let state = GameState::new(0.0);
        assert_eq!(state.lives, MAX_LIVES);
        assert!(!state.is_game_over);
    }

    #[test]
    fn gain_never_exceeds_max() {
        let mut state = GameState::new(0.0);
        state.apply_life_delta(1);
        assert_eq!(state.lives, MAX_LIVES);
    }

    #[test]
    fn loss_never_goes_below_zero_and_latches_game_over() {
        let mut state = GameState::new(0.0);
        state.apply_life_delta(-4);
        state.apply_life_delta(-4);
        assert_eq!(state.lives, 2);
        state.apply_life_delta(-3);
        assert_eq!(state.lives, 0);
        assert!(state.is_game_over);

        // Terminal: further changes are ignored.
        state.apply_life_delta(1);
        assert_eq!(state.lives, 0);
    }

    #[test]
    fn sink_forwards_to_state() {
        let mut state = GameState::new(0.0);
        RuleSink::life_delta(
            &mut state,
            LifeDelta {
                delta: -2,
                cause: Category::Spike,
            },
        );
        assert_eq!(state.lives, 8);
        assert!(!RuleSink::is_game_over(&state));
    }

    // -- 2. Score -----------------------------------------------------------

    #[test]
    fn score_tracks_deepest_point_only() {
        let mut state = GameState::new(100.0);
        state.record_progress(350.0);
        assert_eq!(state.score, 25);

        // Moving back up never lowers the score.
        state.record_progress(120.0);
        assert_eq!(state.score, 25);

        state.record_progress(405.0);
        assert_eq!(state.score, 30);
    }

    #[test]
    fn score_ignores_progress_above_start() {
        let mut state = GameState::new(100.0);
        state.record_progress(40.0);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn score_frozen_after_game_over() {
        let mut state = GameState::new(0.0);
        state.apply_life_delta(-10);
        state.record_progress(10_000.0);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn reset_restores_a_fresh_run() {
        let mut state = GameState::new(0.0);
        state.score_unit = 5.0;
        state.apply_life_delta(-10);
        state.reset(70.0);
        assert_eq!(state.lives, MAX_LIVES);
        assert!(!state.is_game_over);
        assert_eq!(state.start_y, 70.0);
        assert_eq!(state.score_unit, 5.0);
    }

    // -- 3. Cursor ----------------------------------------------------------

    #[test]
    fn cursor_marks_never_move_backwards() {
        let mut cursor = WorldCursor::new(500.0, 1300.0, -100.0);
        cursor.advance_obstacles(400.0);
        cursor.advance_boundaries(1200.0);
        cursor.advance_cleanup(-200.0);
        assert_eq!(cursor, WorldCursor::new(500.0, 1300.0, -100.0));

        cursor.advance_cleanup(50.0);
        assert_eq!(cursor.last_cleanup_y, 50.0);
    }

    #[test]
    fn cleanup_due_only_past_mark() {
        let cursor = WorldCursor::new(0.0, 0.0, -100.0);
        assert_eq!(cursor.cleanup_due(600.0, 800.0), None);
        assert_eq!(cursor.cleanup_due(700.0, 800.0), None);
        assert_eq!(cursor.cleanup_due(750.0, 800.0), Some(-50.0));
    }

    #[test]
    fn spawn_due_when_lookahead_passes_boundary_mark() {
        let cursor = WorldCursor::new(0.0, 2000.0, 0.0);
        assert!(!cursor.spawn_due(800.0, 800.0, 400.0));
        assert!(cursor.spawn_due(801.0, 800.0, 400.0));
    }

    #[test]
    fn vec_sink_records_deltas() {
        let mut sink: Vec<LifeDelta> = Vec::new();
        sink.life_delta(LifeDelta {
            delta: 1,
            cause: Category::Spring,
        });
        assert_eq!(sink.len(), 1);
        assert!(!sink.is_game_over());
    }
}
