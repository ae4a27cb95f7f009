//! Property tests for spawn-table selection, elapsed-time clamping, landing
//! classification, and cleanup.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use shaftfall_engine::prelude::*;
use shaftfall_engine::streaming::{cleanup, seed_world};
use shaftfall_engine::tick::clamp_elapsed_ms;

fn rule_set() -> impl Strategy<Value = RuleSet> {
    prop_oneof![Just(RuleSet::base()), Just(RuleSet::extended())]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn selection_lands_in_the_drawn_band(rules in rule_set(), draw in 0.0f32..1.0) {
        let table = &rules.spawn_table;
        let chosen = table.select(draw);

        // The chosen entry is the first bound strictly above the draw.
        let mut lower = 0.0;
        for entry in table.entries() {
            if draw < entry.cumulative {
                prop_assert_eq!(chosen, entry.category);
                prop_assert!(draw >= lower);
                break;
            }
            lower = entry.cumulative;
        }
        prop_assert!(chosen.is_obstacle());
    }

    #[test]
    fn elapsed_is_always_within_step(elapsed in prop::num::f32::ANY) {
        let dt = clamp_elapsed_ms(elapsed, 16.667);
        prop_assert!((0.0..=16.667).contains(&dt));
    }

    #[test]
    fn landing_window_is_a_cone_above(dx in -500.0f32..500.0, dy in 1.0f32..500.0) {
        // Player above the other body by dy, offset sideways by dx.
        let other = Position::new(0.0, 0.0);
        let player = Position::new(dx, -dy);
        let angle = landing_angle(player, other);
        prop_assert!((0.0..360.0).contains(&angle));
        // |dx| < dy is strictly inside the 45-degree cone.
        if dx.abs() < dy * 0.99 {
            prop_assert!(is_landing(angle));
        }
        if dx.abs() > dy * 1.01 {
            prop_assert!(!is_landing(angle));
        }
    }

    #[test]
    fn player_below_never_lands(dx in -500.0f32..500.0, dy in 0.5f32..500.0) {
        let angle = landing_angle(Position::new(dx, dy), Position::new(0.0, 0.0));
        prop_assert!(!is_landing(angle));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn cleanup_is_idempotent_and_monotone(seed in any::<u64>(), a in 0.0f32..3000.0, b in 0.0f32..3000.0) {
        let config = SimConfig::with_seed(seed);
        let mut substrate = RapierSubstrate::new_zero_gravity();
        let mut registry = EntityRegistry::new();
        let mut rng = Pcg32::seed_from_u64(seed);
        seed_world(&mut substrate, &mut registry, &mut rng, &config);

        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        cleanup(&mut substrate, &mut registry, lo);
        let after_lo = registry.sorted_keys();
        let again = cleanup(&mut substrate, &mut registry, lo);
        prop_assert!(again.is_empty());
        prop_assert_eq!(registry.sorted_keys(), after_lo.clone());

        // A deeper line removes a superset.
        cleanup(&mut substrate, &mut registry, hi);
        let after_hi = registry.sorted_keys();
        prop_assert!(after_hi.iter().all(|k| after_lo.contains(k)));

        prop_assert!(registry.contains(&EntityKey::player()));
        prop_assert!(registry.contains(&EntityKey::top_boundary()));
        prop_assert_eq!(registry.len(), substrate.body_count());
    }
}
