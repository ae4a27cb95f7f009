//! The Entity Registry: the single source of truth for what exists right now.
//!
//! Maps [`EntityKey`] to [`Entity`] and keeps a reverse index from
//! [`BodyHandle`] to key so that contact reports coming back from the
//! substrate can be resolved to entities. Both maps are updated together; an
//! entity is never visible through one and missing from the other.

use std::collections::HashMap;

use crate::entity::{BodyHandle, Category, Entity, EntityKey};
use crate::CoreError;

/// Keyed mapping from entity key to entity record.
///
/// Insertion order is irrelevant. Iteration order is unspecified; callers that
/// need determinism use [`EntityRegistry::sorted_keys`].
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityKey, Entity>,
    by_body: HashMap<BodyHandle, EntityKey>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateKey`] if the key is taken, or
    /// [`CoreError::BodyAlreadyOwned`] if another entity already owns the body.
    /// The registry is unchanged on error.
    pub fn insert(&mut self, entity: Entity) -> Result<(), CoreError> {
        if self.entities.contains_key(&entity.key) {
            return Err(CoreError::DuplicateKey {
                key: entity.key.to_string(),
            });
        }
        if let Some(owner) = self.by_body.get(&entity.body) {
            return Err(CoreError::BodyAlreadyOwned {
                body: entity.body.to_string(),
                owner: owner.to_string(),
            });
        }
        self.by_body.insert(entity.body, entity.key.clone());
        self.entities.insert(entity.key.clone(), entity);
        Ok(())
    }

    /// Drop an entity record. Returns the record if it existed.
    ///
    /// This does not touch the substrate; callers detach the body first.
    pub fn remove(&mut self, key: &EntityKey) -> Option<Entity> {
        let entity = self.entities.remove(key)?;
        self.by_body.remove(&entity.body);
        Some(entity)
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// The player entity, if present.
    pub fn player(&self) -> Option<&Entity> {
        self.entities.get(&EntityKey::player())
    }

    /// Resolve a substrate body back to the key of the entity that owns it.
    pub fn key_for_body(&self, body: BodyHandle) -> Option<&EntityKey> {
        self.by_body.get(&body)
    }

    /// Resolve a substrate body back to the entity that owns it.
    pub fn entity_for_body(&self, body: BodyHandle) -> Option<&Entity> {
        self.by_body.get(&body).and_then(|k| self.entities.get(k))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &Entity)> {
        self.entities.iter()
    }

    /// Keys in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self.entities.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys of every entity in `category`, in lexicographic order.
    pub fn keys_in(&self, category: Category) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self
            .entities
            .values()
            .filter(|e| e.category == category)
            .map(|e| e.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of entities in `category`.
    pub fn count(&self, category: Category) -> usize {
        self.entities
            .values()
            .filter(|e| e.category == category)
            .count()
    }

    /// Remove every record and return them, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<Entity> {
        self.by_body.clear();
        let mut drained: Vec<Entity> = self.entities.drain().map(|(_, e)| e).collect();
        drained.sort_by(|a, b| a.key.cmp(&b.key));
        drained
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Behavior;

    fn entity(key: &str, body: u64, category: Category) -> Entity {
        Entity::new(
            EntityKey::new(key),
            BodyHandle::from_raw(body),
            category,
            [10.0, 10.0],
            Behavior::Inert,
        )
    }

    #[test]
    fn insert_and_lookup_both_directions() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("spike_100_0", 7, Category::Spike)).unwrap();

        let key = EntityKey::new("spike_100_0");
        assert!(reg.contains(&key));
        assert_eq!(reg.key_for_body(BodyHandle::from_raw(7)), Some(&key));
        assert_eq!(
            reg.entity_for_body(BodyHandle::from_raw(7)).map(|e| e.category),
            Some(Category::Spike)
        );
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("a", 1, Category::Platform)).unwrap();
        let err = reg.insert(entity("a", 2, Category::Platform)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        // The second body must not leak into the reverse index.
        assert!(reg.key_for_body(BodyHandle::from_raw(2)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn shared_body_is_rejected() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("a", 1, Category::Platform)).unwrap();
        let err = reg.insert(entity("b", 1, Category::Platform)).unwrap_err();
        assert!(matches!(err, CoreError::BodyAlreadyOwned { .. }));
        assert!(!reg.contains(&EntityKey::new("b")));
    }

    #[test]
    fn remove_clears_reverse_index() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("a", 1, Category::Platform)).unwrap();
        let removed = reg.remove(&EntityKey::new("a")).unwrap();
        assert_eq!(removed.body, BodyHandle::from_raw(1));
        assert!(reg.key_for_body(BodyHandle::from_raw(1)).is_none());
        assert!(reg.remove(&EntityKey::new("a")).is_none());
    }

    #[test]
    fn keys_in_category_are_sorted() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("head_300_1", 3, Category::Head)).unwrap();
        reg.insert(entity("head_100_0", 1, Category::Head)).unwrap();
        reg.insert(entity("spike_200_0", 2, Category::Spike)).unwrap();

        let heads = reg.keys_in(Category::Head);
        assert_eq!(
            heads,
            vec![EntityKey::new("head_100_0"), EntityKey::new("head_300_1")]
        );
        assert_eq!(reg.count(Category::Spike), 1);
    }

    #[test]
    fn drain_empties_registry() {
        let mut reg = EntityRegistry::new();
        reg.insert(entity("b", 2, Category::Platform)).unwrap();
        reg.insert(entity("a", 1, Category::Platform)).unwrap();
        let drained = reg.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key.as_str(), "a");
        assert!(reg.is_empty());
        assert!(reg.key_for_body(BodyHandle::from_raw(1)).is_none());
    }

    #[test]
    fn player_lookup() {
        let mut reg = EntityRegistry::new();
        assert!(reg.player().is_none());
        reg.insert(entity("player", 0, Category::Player)).unwrap();
        assert_eq!(reg.player().map(|e| e.category), Some(Category::Player));
    }
}
