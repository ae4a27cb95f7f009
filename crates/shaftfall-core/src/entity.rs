//! Entity keys, categories, and per-category behavior state.
//!
//! An [`Entity`] is the logical record for one body in the shaft. The body
//! itself lives in the rigid-body substrate and is referenced through an
//! opaque [`BodyHandle`]; the registry and the substrate attach and detach the
//! two in lock-step.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

// ---------------------------------------------------------------------------
// Position / Velocity
// ---------------------------------------------------------------------------

/// 2D world position. Y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate (downward).
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 2D velocity in world units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Horizontal velocity.
    pub dx: f32,
    /// Vertical velocity (positive is downward).
    pub dy: f32,
}

impl Velocity {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

// ---------------------------------------------------------------------------
// BodyHandle
// ---------------------------------------------------------------------------

/// Opaque handle to a body owned by the rigid-body substrate.
///
/// Handles are issued by the substrate and never reused within one substrate
/// instance, so a stale handle simply fails to resolve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(u64);

impl BodyHandle {
    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyHandle({})", self.0)
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// What kind of thing a body is. Drives physical parameters and collision rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Player,
    Platform,
    Spike,
    Spring,
    Treadmill,
    Fireball,
    Head,
    Boundary,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 8] = [
        Category::Player,
        Category::Platform,
        Category::Spike,
        Category::Spring,
        Category::Treadmill,
        Category::Fireball,
        Category::Head,
        Category::Boundary,
    ];

    /// Stable lowercase label, used in generated keys and logs.
    pub fn label(self) -> &'static str {
        match self {
            Category::Player => "player",
            Category::Platform => "platform",
            Category::Spike => "spike",
            Category::Spring => "spring",
            Category::Treadmill => "treadmill",
            Category::Fireball => "fireball",
            Category::Head => "head",
            Category::Boundary => "boundary",
        }
    }

    /// Whether the generator may place this category in an obstacle row.
    pub fn is_obstacle(self) -> bool {
        !matches!(self, Category::Player | Category::Boundary)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| CoreError::UnknownCategory {
                label: s.to_owned(),
                known: Category::ALL
                    .iter()
                    .map(|c| c.label())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Category-specific behavior state.
///
/// `direction` is a signed unit scalar: `1.0` heads right, `-1.0` heads left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Behavior {
    /// No autonomous motion.
    #[default]
    Inert,
    /// Wall-bouncing horizontal patrol (heads).
    Patrol { direction: f32 },
    /// Continuous horizontal drift driven by the substrate (treadmills).
    Conveyor { direction: f32 },
}

impl Behavior {
    /// Direction scalar for behaviors that carry one.
    pub fn direction(&self) -> Option<f32> {
        match self {
            Behavior::Inert => None,
            Behavior::Patrol { direction } | Behavior::Conveyor { direction } => Some(*direction),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// Key prefix reserved for ceiling segments that survive cleanup.
pub const TOP_BOUNDARY_PREFIX: &str = "topBoundary";

/// Which wall of the shaft a boundary tile (or obstacle row) sits against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Row parity rule: even rows go left, odd rows go right.
    pub fn for_row(index: usize) -> Self {
        if index % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Direction pointing from this wall into the shaft.
    pub fn inward(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

/// String key for an entity in the registry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The single player entity.
    pub fn player() -> Self {
        Self::new("player")
    }

    /// The ceiling at the very top of the shaft.
    pub fn top_boundary() -> Self {
        Self::new(TOP_BOUNDARY_PREFIX)
    }

    /// The platform the player starts on.
    pub fn top_platform() -> Self {
        Self::new("topPlatform")
    }

    /// Generated obstacle key: `{category}_{y}_{index}`.
    ///
    /// `y` is rounded to whole units; `index` keeps keys unique within a batch.
    pub fn obstacle(category: Category, y: f32, index: usize) -> Self {
        Self(format!("{}_{:.0}_{}", category.label(), y, index))
    }

    /// Boundary tile key: `leftBoundary_{y}` or `rightBoundary_{y}`.
    pub fn boundary(side: Side, y: f32) -> Self {
        let prefix = match side {
            Side::Left => "leftBoundary",
            Side::Right => "rightBoundary",
        };
        Self(format!("{prefix}_{y:.0}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_player(&self) -> bool {
        self.0 == "player"
    }

    /// Player and top-boundary keys are never removed by cleanup.
    pub fn is_cleanup_exempt(&self) -> bool {
        self.is_player() || self.0.starts_with(TOP_BOUNDARY_PREFIX)
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({:?})", self.0)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Logical record for one body in the shaft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub body: BodyHandle,
    pub category: Category,
    /// Full width and height in world units.
    pub size: [f32; 2],
    pub behavior: Behavior,
}

impl Entity {
    pub fn new(
        key: EntityKey,
        body: BodyHandle,
        category: Category,
        size: [f32; 2],
        behavior: Behavior,
    ) -> Self {
        Self {
            key,
            body,
            category,
            size,
            behavior,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
