//! Autonomous motion that runs before each physics step.
//!
//! Patrolling bodies (heads) bounce between the shaft walls: on reaching a
//! margin while heading toward that wall they reverse, take the patrol speed
//! in the new direction, and get a small upward hop. Treadmill drift is not
//! handled here; it runs as a substrate conveyor hook inside `step`.

use shaftfall_core::entity::{Behavior, Category, Velocity};
use shaftfall_core::registry::EntityRegistry;
use tracing::trace;

use crate::config::{RuleSet, ShaftLayout};
use crate::physics::Substrate;

/// Run one behavior pass. Returns how many patrols turned around.
pub fn run_behavior_pass<S>(
    substrate: &mut S,
    registry: &mut EntityRegistry,
    rules: &RuleSet,
    layout: &ShaftLayout,
) -> usize
where
    S: Substrate + ?Sized,
{
    let left_edge = rules.patrol_margin;
    let right_edge = layout.play_width - rules.patrol_margin;
    let mut turned = 0;

    for key in registry.keys_in(Category::Head) {
        let Some(entity) = registry.get_mut(&key) else {
            continue;
        };
        let Behavior::Patrol { direction } = entity.behavior else {
            continue;
        };
        let (Some(pos), Some(vel)) = (
            substrate.position(entity.body),
            substrate.velocity(entity.body),
        ) else {
            trace!(key = %key, "patrol body missing");
            continue;
        };

        // Only a head still heading into the wall turns; one already heading
        // back out is left alone until it clears the margin.
        let at_left = pos.x <= left_edge && direction < 0.0;
        let at_right = pos.x >= right_edge && direction > 0.0;
        if !(at_left || at_right) {
            continue;
        }

        let direction = -direction;
        entity.behavior = Behavior::Patrol { direction };
        substrate.set_velocity(
            entity.body,
            Velocity::new(direction * rules.patrol_speed, vel.dy + rules.patrol_hop),
        );
        trace!(key = %key, direction, x = pos.x, "patrol turned");
        turned += 1;
    }
    turned
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryParams;
    use crate::physics::RapierSubstrate;
    use shaftfall_core::entity::{Entity, EntityKey, Position};

    fn world_with_head(
        x: f32,
        direction: f32,
        vy: f32,
    ) -> (RapierSubstrate, EntityRegistry, EntityKey) {
        let mut sub = RapierSubstrate::new_zero_gravity();
        let params = CategoryParams::of(Category::Head);
        let body = sub.create_body(&params.body_desc(
            Category::Head,
            Position::new(x, 500.0),
            Velocity::new(direction * 480.0, vy),
        ));
        let key = EntityKey::obstacle(Category::Head, 500.0, 0);
        let mut reg = EntityRegistry::new();
        reg.insert(Entity::new(
            key.clone(),
            body,
            Category::Head,
            params.size,
            Behavior::Patrol { direction },
        ))
        .unwrap();
        (sub, reg, key)
    }

    #[test]
    fn head_at_right_wall_turns_left_and_hops() {
        let (mut sub, mut reg, key) = world_with_head(365.0, 1.0, 10.0);
        let rules = RuleSet::extended();
        let turned = run_behavior_pass(&mut sub, &mut reg, &rules, &ShaftLayout::default());
        assert_eq!(turned, 1);

        let head = reg.get(&key).unwrap();
        assert_eq!(head.behavior, Behavior::Patrol { direction: -1.0 });
        let vel = sub.velocity(head.body).unwrap();
        assert_eq!(vel, Velocity::new(-480.0, 10.0 - 120.0));
    }

    #[test]
    fn head_at_left_wall_turns_right() {
        let (mut sub, mut reg, key) = world_with_head(40.0, -1.0, 0.0);
        run_behavior_pass(&mut sub, &mut reg, &RuleSet::extended(), &ShaftLayout::default());
        assert_eq!(reg.get(&key).unwrap().behavior, Behavior::Patrol { direction: 1.0 });
    }

    #[test]
    fn head_leaving_the_wall_keeps_direction() {
        // Already heading inward: no repeated flipping while still in the margin.
        let (mut sub, mut reg, key) = world_with_head(20.0, 1.0, 0.0);
        let rules = RuleSet::extended();
        let turned = run_behavior_pass(&mut sub, &mut reg, &rules, &ShaftLayout::default());
        assert_eq!(turned, 0);
        assert_eq!(reg.get(&key).unwrap().behavior, Behavior::Patrol { direction: 1.0 });
    }

    #[test]
    fn head_turned_inside_margin_does_not_turn_back() {
        // Turn at the right wall, then run the pass again before the head has
        // moved: it is still inside the margin but must keep heading left.
        let (mut sub, mut reg, key) = world_with_head(380.0, 1.0, 0.0);
        let rules = RuleSet::extended();
        let layout = ShaftLayout::default();
        assert_eq!(run_behavior_pass(&mut sub, &mut reg, &rules, &layout), 1);
        for _ in 0..3 {
            assert_eq!(run_behavior_pass(&mut sub, &mut reg, &rules, &layout), 0);
        }
        let head = reg.get(&key).unwrap();
        assert_eq!(head.behavior, Behavior::Patrol { direction: -1.0 });
        assert_eq!(sub.velocity(head.body).unwrap().dx, -480.0);
    }

    #[test]
    fn head_mid_shaft_is_untouched() {
        let (mut sub, mut reg, key) = world_with_head(200.0, 1.0, 33.0);
        run_behavior_pass(&mut sub, &mut reg, &RuleSet::extended(), &ShaftLayout::default());
        let body = reg.get(&key).unwrap().body;
        assert_eq!(sub.velocity(body).unwrap(), Velocity::new(480.0, 33.0));
    }
}
