//! The rigid-body substrate contract and its rapier2d implementation.
//!
//! The simulation treats physics as a black box behind [`Substrate`]: create
//! rectangular bodies, read and write their velocities, translate static
//! bodies, and advance everything by a time delta. Each step returns the
//! contacts that *began* during it, with the category label and position of
//! both bodies attached, so the rule engine never has to reach back into the
//! physics world.
//!
//! [`RapierSubstrate`] implements the contract on rapier2d:
//!
//! 1. Conveyor hooks translate their (kinematic) bodies by a fixed delta.
//! 2. rapier steps the simulation with the given dt.
//! 3. Collision-start events are mapped back to [`BodyHandle`]s and sorted.
//!
//! # Determinism
//!
//! rapier2d is compiled with `enhanced-determinism`. Handles are issued from a
//! counter, conveyors run in handle order, and contacts are sorted, so the same
//! sequence of calls produces the same results on the same platform.

use std::collections::{BTreeMap, HashMap};

use rapier2d::prelude::*;
use shaftfall_core::entity::{BodyHandle, Category, Position, Velocity};

/// Typical body size in world units, used to scale rapier's tolerances.
const LENGTH_UNIT: Real = 50.0;

// ---------------------------------------------------------------------------
// Body descriptors
// ---------------------------------------------------------------------------

/// How the substrate moves a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BodyKind {
    /// Fully simulated (player, fireballs, heads).
    Dynamic,
    /// Never moves.
    Fixed,
    /// Static for gameplay purposes but translated by the step hook (treadmills).
    Conveyor,
}

/// Everything needed to create one rectangular body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub category: Category,
    pub kind: BodyKind,
    pub position: Position,
    pub velocity: Velocity,
    /// Half-width and half-height.
    pub half_extents: [f32; 2],
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub gravity_scale: f32,
    pub lock_rotation: bool,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// One side of a contact, captured right after the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBody {
    pub handle: BodyHandle,
    pub category: Category,
    pub position: Position,
}

/// Two bodies that started touching during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBegin {
    pub a: ContactBody,
    pub b: ContactBody,
}

impl ContactBegin {
    /// If one side is `category`, return `(that side, the other side)`.
    ///
    /// When both sides match, `a` is returned first.
    pub fn involving(&self, category: Category) -> Option<(&ContactBody, &ContactBody)> {
        if self.a.category == category {
            Some((&self.a, &self.b))
        } else if self.b.category == category {
            Some((&self.b, &self.a))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Substrate
// ---------------------------------------------------------------------------

/// Minimal rigid-body contract the simulation depends on.
///
/// Methods that take a handle return `false`/`None` for handles the substrate
/// does not know; they never panic.
pub trait Substrate {
    /// Create a body and return its handle.
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Remove a body. Returns whether it existed.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    fn position(&self, handle: BodyHandle) -> Option<Position>;

    fn velocity(&self, handle: BodyHandle) -> Option<Velocity>;

    /// Overwrite a body's linear velocity.
    fn set_velocity(&mut self, handle: BodyHandle, velocity: Velocity) -> bool;

    /// Move a body by `(dx, dy)` right now.
    fn translate(&mut self, handle: BodyHandle, dx: f32, dy: f32) -> bool;

    /// Translate `handle` by `delta_x` at the start of every step.
    fn add_conveyor(&mut self, handle: BodyHandle, delta_x: f32) -> bool;

    /// Advance by `dt` seconds. Returns the contacts that began.
    fn step(&mut self, dt: f32) -> Vec<ContactBegin>;

    /// Number of live bodies.
    fn body_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// RapierSubstrate
// ---------------------------------------------------------------------------

/// rapier2d-backed [`Substrate`].
///
/// rapier owns body and collider storage; this struct maps between the
/// simulation's [`BodyHandle`]s and rapier's handles.
pub struct RapierSubstrate {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    next_handle: u64,
    /// Maps our handle -> rapier RigidBodyHandle.
    handle_to_body: HashMap<BodyHandle, RigidBodyHandle>,
    /// Maps rapier ColliderHandle -> our handle for contact lookup.
    collider_to_handle: HashMap<ColliderHandle, BodyHandle>,
    /// Reverse of `collider_to_handle`, so removal does not scan.
    body_to_collider: HashMap<BodyHandle, ColliderHandle>,
    categories: HashMap<BodyHandle, Category>,
    /// Per-step translation hooks, run in handle order.
    conveyors: BTreeMap<BodyHandle, f32>,
}

impl RapierSubstrate {
    /// Create a substrate with downward gravity `gravity_y` (world units/s²).
    pub fn new(gravity_y: f32) -> Self {
        let mut integration_params = IntegrationParameters::default();
        integration_params.length_unit = LENGTH_UNIT;
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, gravity_y as Real],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            next_handle: 0,
            handle_to_body: HashMap::new(),
            collider_to_handle: HashMap::new(),
            body_to_collider: HashMap::new(),
            categories: HashMap::new(),
            conveyors: BTreeMap::new(),
        }
    }

    /// Create a substrate with no gravity.
    pub fn new_zero_gravity() -> Self {
        Self::new(0.0)
    }

    /// Check if a handle is live.
    pub fn has_body(&self, handle: BodyHandle) -> bool {
        self.handle_to_body.contains_key(&handle)
    }

    /// Category label stored for a body.
    pub fn category(&self, handle: BodyHandle) -> Option<Category> {
        self.categories.get(&handle).copied()
    }

    fn rigid_body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.handle_to_body
            .get(&handle)
            .and_then(|h| self.rigid_body_set.get(*h))
    }

    fn rigid_body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        let rb_handle = *self.handle_to_body.get(&handle)?;
        self.rigid_body_set.get_mut(rb_handle)
    }

    fn contact_body(&self, handle: BodyHandle) -> Option<ContactBody> {
        let category = self.category(handle)?;
        let position = self.position(handle)?;
        Some(ContactBody {
            handle,
            category,
            position,
        })
    }

    fn run_conveyors(&mut self) {
        let hooks: Vec<(BodyHandle, f32)> = self.conveyors.iter().map(|(h, d)| (*h, *d)).collect();
        for (handle, delta_x) in hooks {
            self.translate(handle, delta_x, 0.0);
        }
    }
}

impl Default for RapierSubstrate {
    fn default() -> Self {
        Self::new_zero_gravity()
    }
}

impl Substrate for RapierSubstrate {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let handle = BodyHandle::from_raw(self.next_handle);
        self.next_handle += 1;

        let translation = vector![desc.position.x as Real, desc.position.y as Real];
        let rb = match desc.kind {
            BodyKind::Dynamic => {
                let mut builder = RigidBodyBuilder::dynamic()
                    .translation(translation)
                    .linvel(vector![desc.velocity.dx as Real, desc.velocity.dy as Real])
                    .gravity_scale(desc.gravity_scale as Real)
                    .ccd_enabled(true);
                if desc.lock_rotation {
                    builder = builder.lock_rotations();
                }
                builder.build()
            }
            BodyKind::Fixed => RigidBodyBuilder::fixed().translation(translation).build(),
            BodyKind::Conveyor => RigidBodyBuilder::kinematic_position_based()
                .translation(translation)
                .build(),
        };
        let rb_handle = self.rigid_body_set.insert(rb);

        let collider = ColliderBuilder::cuboid(
            desc.half_extents[0] as Real,
            desc.half_extents[1] as Real,
        )
        .friction(desc.friction as Real)
        .restitution(desc.restitution as Real)
        .density(desc.density as Real)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);

        self.handle_to_body.insert(handle, rb_handle);
        self.collider_to_handle.insert(collider_handle, handle);
        self.body_to_collider.insert(handle, collider_handle);
        self.categories.insert(handle, desc.category);
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let Some(rb_handle) = self.handle_to_body.remove(&handle) else {
            return false;
        };
        // Removes the body and its attached colliders.
        self.rigid_body_set.remove(
            rb_handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        if let Some(collider_handle) = self.body_to_collider.remove(&handle) {
            self.collider_to_handle.remove(&collider_handle);
        }
        self.categories.remove(&handle);
        self.conveyors.remove(&handle);
        true
    }

    fn position(&self, handle: BodyHandle) -> Option<Position> {
        self.rigid_body(handle).map(|rb| {
            let t = rb.translation();
            Position::new(t.x as f32, t.y as f32)
        })
    }

    fn velocity(&self, handle: BodyHandle) -> Option<Velocity> {
        self.rigid_body(handle).map(|rb| {
            let v = rb.linvel();
            Velocity::new(v.x as f32, v.y as f32)
        })
    }

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Velocity) -> bool {
        match self.rigid_body_mut(handle) {
            Some(rb) => {
                rb.set_linvel(vector![velocity.dx as Real, velocity.dy as Real], true);
                true
            }
            None => false,
        }
    }

    fn translate(&mut self, handle: BodyHandle, dx: f32, dy: f32) -> bool {
        let Some(rb) = self.rigid_body_mut(handle) else {
            return false;
        };
        let next = rb.translation() + vector![dx as Real, dy as Real];
        if rb.is_kinematic() {
            rb.set_next_kinematic_translation(next);
        } else {
            rb.set_translation(next, true);
        }
        true
    }

    fn add_conveyor(&mut self, handle: BodyHandle, delta_x: f32) -> bool {
        if !self.has_body(handle) {
            return false;
        }
        self.conveyors.insert(handle, delta_x);
        true
    }

    fn step(&mut self, dt: f32) -> Vec<ContactBegin> {
        self.run_conveyors();
        self.integration_params.dt = dt as Real;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None, // query pipeline (unused)
            &(),  // physics hooks
            &event_handler,
        );

        let mut contacts = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(h1, h2, _flags) = event {
                let a = self.collider_to_handle.get(&h1).copied();
                let b = self.collider_to_handle.get(&h2).copied();
                if let (Some(a), Some(b)) = (a, b) {
                    if let (Some(a), Some(b)) = (self.contact_body(a), self.contact_body(b)) {
                        contacts.push(ContactBegin { a, b });
                    }
                }
            }
        }

        // Channel delivery order may vary; sort by (min, max) handle.
        contacts.sort_by_key(|c| {
            let a = c.a.handle;
            let b = c.b.handle;
            (a.min(b), a.max(b))
        });
        contacts
    }

    fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
