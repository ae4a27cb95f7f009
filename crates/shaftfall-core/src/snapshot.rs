//! Immutable registry snapshots with BLAKE3 content hashes.
//!
//! A [`RegistrySnapshot`] is what the presentation layer reads between ticks:
//! every entity with the kinematic state of its body, sorted by key, plus a
//! hash of the whole thing. Two simulations that hash equal are in identical
//! states, which is what replay verification relies on.

use serde::{Deserialize, Serialize};

use crate::entity::{Behavior, BodyHandle, Category, EntityKey, Position, Velocity};
use crate::registry::EntityRegistry;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One entity as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub key: EntityKey,
    pub category: Category,
    pub size: [f32; 2],
    pub behavior: Behavior,
    /// `None` if the body could not be resolved in the substrate.
    pub position: Option<Position>,
    pub velocity: Option<Velocity>,
}

/// Every entity in the registry, sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub entities: Vec<EntitySnapshot>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `entities`.
    pub hash: String,
}

impl RegistrySnapshot {
    /// Capture the registry, reading body state through `body_state`.
    pub fn capture<F>(registry: &EntityRegistry, mut body_state: F) -> Self
    where
        F: FnMut(BodyHandle) -> Option<(Position, Velocity)>,
    {
        let mut entities: Vec<EntitySnapshot> = registry
            .iter()
            .map(|(key, entity)| {
                let state = body_state(entity.body);
                EntitySnapshot {
                    key: key.clone(),
                    category: entity.category,
                    size: entity.size,
                    behavior: entity.behavior,
                    position: state.map(|(p, _)| p),
                    velocity: state.map(|(_, v)| v),
                }
            })
            .collect();
        entities.sort_by(|a, b| a.key.cmp(&b.key));

        let hash = compute_hash(&entities);
        Self { entities, hash }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntitySnapshot> {
        self.entities
            .binary_search_by(|e| e.key.cmp(key))
            .ok()
            .map(|i| &self.entities[i])
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> bool {
        compute_hash(&self.entities) == self.hash
    }
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// BLAKE3 hex digest of the canonical JSON encoding of `entities`.
fn compute_hash(entities: &[EntitySnapshot]) -> String {
    let json_bytes = serde_json::to_vec(entities)
        .expect("registry snapshot should always be JSON-serializable");
    blake3::hash(&json_bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn registry_with(keys: &[(&str, u64, Category)]) -> EntityRegistry {
        let mut reg = EntityRegistry::new();
        for (key, body, category) in keys {
            reg.insert(Entity::new(
                EntityKey::new(*key),
                BodyHandle::from_raw(*body),
                *category,
                [10.0, 10.0],
                Behavior::Inert,
            ))
            .unwrap();
        }
        reg
    }

    fn at_body_y(body: BodyHandle) -> Option<(Position, Velocity)> {
        Some((
            Position::new(0.0, body.to_raw() as f32 * 100.0),
            Velocity::default(),
        ))
    }

    #[test]
    fn snapshot_is_sorted_and_hashed() {
        let reg = registry_with(&[
            ("spike_300_2", 3, Category::Spike),
            ("player", 0, Category::Player),
            ("platform_100_0", 1, Category::Platform),
        ]);
        let snap = RegistrySnapshot::capture(&reg, at_body_y);

        let keys: Vec<&str> = snap.entities.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["platform_100_0", "player", "spike_300_2"]);
        assert_eq!(snap.hash.len(), 64);
        assert!(snap.verify());
    }

    #[test]
    fn identical_state_hashes_equal() {
        let a = registry_with(&[("a", 1, Category::Platform), ("b", 2, Category::Spike)]);
        let b = registry_with(&[("b", 2, Category::Spike), ("a", 1, Category::Platform)]);
        assert_eq!(
            RegistrySnapshot::capture(&a, at_body_y).hash,
            RegistrySnapshot::capture(&b, at_body_y).hash
        );
    }

    #[test]
    fn moved_body_changes_hash() {
        let reg = registry_with(&[("a", 1, Category::Platform)]);
        let before = RegistrySnapshot::capture(&reg, at_body_y);
        let after = RegistrySnapshot::capture(&reg, |_| {
            Some((Position::new(1.0, 100.0), Velocity::default()))
        });
        assert_ne!(before.hash, after.hash);
    }

    #[test]
    fn unresolved_body_is_recorded_as_none() {
        let reg = registry_with(&[("a", 1, Category::Platform)]);
        let snap = RegistrySnapshot::capture(&reg, |_| None);
        let entry = snap.get(&EntityKey::new("a")).unwrap();
        assert!(entry.position.is_none());
        assert!(entry.velocity.is_none());
    }

    #[test]
    fn tampered_snapshot_fails_verification() {
        let reg = registry_with(&[("a", 1, Category::Platform)]);
        let mut snap = RegistrySnapshot::capture(&reg, at_body_y);
        snap.entities[0].size = [99.0, 99.0];
        assert!(!snap.verify());
    }
}
