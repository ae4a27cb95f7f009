//! Property tests for game state, cursor marks, and input ordering.
//!
//! These tests use `proptest` to generate random sequences of life deltas,
//! progress reports, cursor advances, and input events, and verify that the
//! data-model invariants hold after every step.

use proptest::prelude::*;
use shaftfall_core::prelude::*;

/// Deltas in the range the rule tables actually produce, plus some extremes.
fn life_delta() -> impl Strategy<Value = i32> {
    prop_oneof![
        (-4i32..=1),
        Just(i32::MIN),
        Just(i32::MAX),
    ]
}

fn finite_y() -> impl Strategy<Value = f32> {
    (-100_000i32..100_000i32).prop_map(|v| v as f32 * 0.5)
}

fn input_event() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        Just(InputEvent::move_left()),
        Just(InputEvent::move_right()),
        Just(InputEvent::jump()),
        Just(InputEvent::stop()),
        (-50i32..50, -50i32..50)
            .prop_map(|(dx, dy)| InputEvent::Swipe { dx: dx as f32, dy: dy as f32 }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn lives_always_within_bounds(deltas in prop::collection::vec(life_delta(), 1..80)) {
        let mut state = GameState::new(0.0);
        let mut was_over = false;
        for d in deltas {
            state.apply_life_delta(d);
            prop_assert!(state.lives <= MAX_LIVES);
            if was_over {
                // Terminal state: nothing changes after game over.
                prop_assert_eq!(state.lives, 0);
                prop_assert!(state.is_game_over);
            }
            was_over = state.is_game_over;
            prop_assert_eq!(state.is_game_over, state.lives == 0);
        }
    }

    #[test]
    fn score_never_decreases(ys in prop::collection::vec(finite_y(), 1..100)) {
        let mut state = GameState::new(0.0);
        let mut last = 0u64;
        for y in ys {
            state.record_progress(y);
            prop_assert!(state.score >= last);
            last = state.score;
        }
    }

    #[test]
    fn cursor_marks_are_monotone(ops in prop::collection::vec((0u8..3, finite_y()), 1..100)) {
        let mut cursor = WorldCursor::new(0.0, 0.0, 0.0);
        for (which, y) in ops {
            let before = cursor;
            match which {
                0 => cursor.advance_obstacles(y),
                1 => cursor.advance_boundaries(y),
                _ => cursor.advance_cleanup(y),
            }
            prop_assert!(cursor.last_obstacle_y >= before.last_obstacle_y);
            prop_assert!(cursor.last_boundary_y >= before.last_boundary_y);
            prop_assert!(cursor.last_cleanup_y >= before.last_cleanup_y);
        }
    }

    #[test]
    fn drain_puts_jumps_first_and_keeps_horizontal_order(
        events in prop::collection::vec(input_event(), 0..40)
    ) {
        let mut queue: EventQueue = events.clone().into();
        let drained = queue.drain_ordered();
        prop_assert_eq!(drained.len(), events.len());

        let jumps = events.iter().filter(|e| matches!(e, InputEvent::Jump {})).count();
        prop_assert!(drained[..jumps].iter().all(|e| matches!(e, InputEvent::Jump {})), "jumps must be drained first");

        let horizontal: Vec<InputEvent> = events
            .iter()
            .copied()
            .filter(|e| !matches!(e, InputEvent::Jump {}))
            .collect();
        prop_assert_eq!(&drained[jumps..], &horizontal[..]);
    }
}
