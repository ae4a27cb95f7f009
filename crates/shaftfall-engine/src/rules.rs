//! Collision classification and the life/score rule engine.
//!
//! Every contact that begins during a step is checked for the player. The
//! angle from the other body to the player decides whether it was a landing
//! (player on top); only landings have effects. Effects come from the rule
//! set's table: a life delta reported to the [`RuleSink`] and an optional
//! velocity reaction applied to the player.
//!
//! Angles use the y-down world: 180° means the player is directly above the
//! other body, 90° and 270° mean directly beside it.

use shaftfall_core::entity::{Category, Position, Velocity};
use shaftfall_core::registry::EntityRegistry;
use shaftfall_core::state::{LifeDelta, RuleSink};
use tracing::{debug, trace};

use crate::config::{Reaction, RuleSet};
use crate::physics::{ContactBegin, ContactBody, Substrate};

/// Landing window, inclusive at both ends.
pub const LANDING_MIN_DEG: f32 = 135.0;
pub const LANDING_MAX_DEG: f32 = 225.0;

/// Conveyor push is the conveyor speed times this.
const CONVEYOR_PUSH_FACTOR: f32 = 1.5;

/// Spring bounce is the jump impulse times this.
const SPRING_BOUNCE_FACTOR: f32 = 2.0;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Angle of the player relative to `other`, in degrees in `[0, 360)`.
pub fn landing_angle(player: Position, other: Position) -> f32 {
    let degrees = (player.x - other.x)
        .atan2(player.y - other.y)
        .to_degrees()
        .rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

pub fn is_landing(angle: f32) -> bool {
    (LANDING_MIN_DEG..=LANDING_MAX_DEG).contains(&angle)
}

/// What a single player contact amounts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleOutcome {
    pub other: Category,
    pub angle: f32,
    pub landing: bool,
    /// Zero unless `landing`.
    pub life_delta: i32,
    /// `Reaction::None` unless `landing`.
    pub reaction: Reaction,
}

/// Classify a contact between the player at `player` and `other`.
pub fn classify(player: Position, other: &ContactBody, rules: &RuleSet) -> RuleOutcome {
    let angle = landing_angle(player, other.position);
    let landing = is_landing(angle);
    let (life_delta, reaction) = if landing {
        (
            rules.effects.life_delta(other.category),
            rules.effects.reaction(other.category),
        )
    } else {
        (0, Reaction::None)
    };
    RuleOutcome {
        other: other.category,
        angle,
        landing,
        life_delta,
        reaction,
    }
}

/// Player velocity after `reaction`, or `None` if it changes nothing.
///
/// `conveyor_direction` is the direction of the body landed on, when it has one.
pub fn react(
    velocity: Velocity,
    reaction: Reaction,
    rules: &RuleSet,
    conveyor_direction: Option<f32>,
) -> Option<Velocity> {
    match reaction {
        Reaction::None => None,
        Reaction::SpringBounce => rules
            .jump_impulse
            .map(|impulse| Velocity::new(velocity.dx, SPRING_BOUNCE_FACTOR * impulse)),
        Reaction::ConveyorPush => {
            let direction = conveyor_direction?;
            let conveyor_vx = direction * rules.conveyor_speed();
            Some(Velocity::new(
                velocity.dx + conveyor_vx * CONVEYOR_PUSH_FACTOR,
                velocity.dy,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Apply the rule set to one step's contacts.
///
/// Contacts not involving the registered player are ignored. Landings report
/// their life delta to `sink` (nonzero only) and apply their reaction to the
/// player body. Returns the outcome of every player contact, in contact order.
///
/// Once the sink reports game over, resolution stops: the fatal landing gets no
/// reaction and later contacts are neither classified nor applied.
pub fn resolve_contacts<S, K>(
    substrate: &mut S,
    registry: &EntityRegistry,
    rules: &RuleSet,
    contacts: &[ContactBegin],
    sink: &mut K,
) -> Vec<RuleOutcome>
where
    S: Substrate + ?Sized,
    K: RuleSink + ?Sized,
{
    let Some(player) = registry.player() else {
        if !contacts.is_empty() {
            trace!(contacts = contacts.len(), "no player; skipping collision rules");
        }
        return Vec::new();
    };
    let player_body = player.body;

    let mut outcomes = Vec::new();
    for contact in contacts {
        let Some((p, other)) = contact.involving(Category::Player) else {
            continue;
        };
        if p.handle != player_body {
            continue;
        }

        let outcome = classify(p.position, other, rules);
        outcomes.push(outcome);
        if !outcome.landing {
            trace!(other = %outcome.other, angle = outcome.angle, "side contact");
            continue;
        }

        if outcome.life_delta != 0 {
            sink.life_delta(LifeDelta {
                delta: outcome.life_delta,
                cause: outcome.other,
            });
            if sink.is_game_over() {
                debug!(cause = %outcome.other, "game over; dropping remaining contacts");
                break;
            }
        }

        let conveyor_direction = registry
            .entity_for_body(other.handle)
            .and_then(|e| e.behavior.direction());
        if let Some(velocity) = substrate.velocity(player_body) {
            if let Some(next) = react(velocity, outcome.reaction, rules, conveyor_direction) {
                substrate.set_velocity(player_body, next);
            }
        }
        debug!(
            other = %outcome.other,
            angle = outcome.angle,
            delta = outcome.life_delta,
            "landing"
        );
    }
    outcomes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
