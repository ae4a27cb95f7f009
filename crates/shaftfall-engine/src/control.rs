//! Applies drained input events to the player body.
//!
//! Each event rewrites one axis of the player's velocity and leaves the other
//! alone. Events are applied in the order given, so callers pass the output
//! of [`EventQueue::drain_ordered`](shaftfall_core::input::EventQueue::drain_ordered).

use shaftfall_core::entity::Velocity;
use shaftfall_core::input::{Direction, InputEvent};
use shaftfall_core::registry::EntityRegistry;
use tracing::trace;

use crate::config::RuleSet;
use crate::physics::Substrate;

/// Apply `events` to the player. Returns how many changed its velocity.
///
/// Does nothing when there is no player or its body cannot be resolved.
pub fn apply_events<S>(
    substrate: &mut S,
    registry: &EntityRegistry,
    rules: &RuleSet,
    events: &[InputEvent],
) -> usize
where
    S: Substrate + ?Sized,
{
    if events.is_empty() {
        return 0;
    }
    let Some(player) = registry.player() else {
        trace!(events = events.len(), "no player; dropping input");
        return 0;
    };
    let body = player.body;
    let Some(mut velocity) = substrate.velocity(body) else {
        trace!(body = %body, "player body missing; dropping input");
        return 0;
    };

    let mut applied = 0;
    for event in events {
        if let Some(next) = apply_one(velocity, rules, event) {
            velocity = next;
            applied += 1;
        }
    }
    if applied > 0 {
        substrate.set_velocity(body, velocity);
    }
    applied
}

/// New player velocity after one event, or `None` if the event has no effect.
fn apply_one(velocity: Velocity, rules: &RuleSet, event: &InputEvent) -> Option<Velocity> {
    match *event {
        InputEvent::Move { direction } => Some(run(velocity, rules, direction)),
        InputEvent::Jump {} => rules
            .jump_impulse
            .map(|impulse| Velocity::new(velocity.dx, impulse)),
        InputEvent::Swipe { dx, dy } => {
            if dx.abs() > dy.abs() {
                Direction::from_sign(dx).map(|d| run(velocity, rules, d))
            } else {
                None
            }
        }
        InputEvent::Stop {} => Some(Velocity::new(0.0, velocity.dy)),
    }
}

fn run(velocity: Velocity, rules: &RuleSet, direction: Direction) -> Velocity {
    Velocity::new(direction.sign() * rules.effective_player_speed(), velocity.dy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
