//! Shaftfall Core -- data model for an endless vertical-descent simulation.
//!
//! This crate holds everything the simulation reads and writes but none of the
//! machinery that drives it: entity keys and categories, per-category behavior
//! state, the [`EntityRegistry`](registry::EntityRegistry), the
//! [`WorldCursor`](state::WorldCursor) streaming marks, the consumer-side
//! [`GameState`](state::GameState), and the input-event vocabulary.
//!
//! World Y grows downward. Every streaming and cleanup decision is made along
//! that single axis.
//!
//! # Quick Start
//!
//! ```
//! use shaftfall_core::prelude::*;
//!
//! let mut registry = EntityRegistry::new();
//! registry
//!     .insert(Entity::new(
//!         EntityKey::player(),
//!         BodyHandle::from_raw(0),
//!         Category::Player,
//!         [30.0, 40.0],
//!         Behavior::Inert,
//!     ))
//!     .unwrap();
//!
//! assert!(registry.player().is_some());
//! assert_eq!(registry.key_for_body(BodyHandle::from_raw(0)), Some(&EntityKey::player()));
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod input;
pub mod registry;
pub mod snapshot;
pub mod state;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core data-model operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity with this key is already registered.
    #[error("entity key '{key}' is already registered")]
    DuplicateKey { key: String },

    /// A body handle is already owned by another entity.
    #[error("body {body} is already owned by entity '{owner}'")]
    BodyAlreadyOwned { body: String, owner: String },

    /// A category label did not match any known category.
    #[error("unknown category label '{label}'. Known categories: [{known}]")]
    UnknownCategory { label: String, known: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{Behavior, BodyHandle, Category, Entity, EntityKey, Position, Velocity};
    pub use crate::input::{Direction, EventQueue, InputEvent};
    pub use crate::registry::EntityRegistry;
    pub use crate::snapshot::{EntitySnapshot, RegistrySnapshot};
    pub use crate::state::{GameState, LifeDelta, RuleSink, WorldCursor, MAX_LIVES};
    pub use crate::CoreError;
}
