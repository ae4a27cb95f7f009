//! Simulation configuration: shaft layout, streaming distances, and rule sets.
//!
//! Two rule sets ship built in. [`RuleSet::base`] is the plain descent with a
//! four-entry spawn table and spikes as the only hazard. [`RuleSet::extended`]
//! adds fireballs, patrolling heads, jumping, and a full effect table. Both are
//! ordinary values; the simulation never branches on "which variant" it is.
//!
//! Velocities are in world units per second. Constants that were tuned as
//! per-frame values are scaled by [`REFERENCE_HZ`].

use serde::{Deserialize, Serialize};
use shaftfall_core::entity::{Category, Position, Velocity};
use shaftfall_core::state::DEFAULT_SCORE_UNIT;

use crate::physics::{BodyDesc, BodyKind};
use crate::ConfigError;

/// Frame rate the per-frame tuning constants were chosen at.
pub const REFERENCE_HZ: f32 = 60.0;

// ---------------------------------------------------------------------------
// Layout / streaming
// ---------------------------------------------------------------------------

/// Horizontal extent of the shaft and the visible window height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShaftLayout {
    pub play_width: f32,
    pub viewport_height: f32,
}

impl Default for ShaftLayout {
    fn default() -> Self {
        Self {
            play_width: 400.0,
            viewport_height: 800.0,
        }
    }
}

/// Distances and batch sizes that drive streaming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Rows generated when the world is first seeded.
    pub initial_rows: usize,
    /// Y of the first seeded row.
    pub first_row_y: f32,
    /// Rows generated per streaming batch.
    pub batch_rows: usize,
    /// How far below the camera content must exist before more is generated.
    pub lookahead: f32,
    /// How far above the camera content survives before cleanup.
    pub lookbehind: f32,
    /// Boundary tiles extend this far past the last obstacle row.
    pub boundary_margin: f32,
    /// Row gap is uniform in `[gap_min, gap_max)`.
    pub gap_min: f32,
    pub gap_max: f32,
    /// Obstacle X bands sit this far in from each wall...
    pub band_inset: f32,
    /// ...and are this wide.
    pub band_width: f32,
    /// Vertical pitch of boundary tiles.
    pub boundary_tile: f32,
    /// Heads spawn this far in from their side's wall.
    pub head_inset: f32,
    /// Fireballs spawn this far above their row.
    pub fireball_lead: f32,
    /// Player spawn height.
    pub player_start_y: f32,
    /// Camera sits this far above the player.
    pub camera_lead: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            initial_rows: 25,
            first_row_y: 100.0,
            batch_rows: 20,
            lookahead: 400.0,
            lookbehind: 800.0,
            boundary_margin: 800.0,
            gap_min: 60.0,
            gap_max: 160.0,
            band_inset: 50.0,
            band_width: 100.0,
            boundary_tile: 50.0,
            head_inset: 70.0,
            fireball_lead: 200.0,
            player_start_y: 70.0,
            camera_lead: 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SpawnTable
// ---------------------------------------------------------------------------

/// One category and its cumulative probability bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub category: Category,
    pub cumulative: f32,
}

/// Ordered cumulative distribution over obstacle categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnTable {
    entries: Vec<SpawnEntry>,
}

impl SpawnTable {
    /// Build and validate a table from `(category, cumulative)` pairs.
    ///
    /// # Errors
    ///
    /// See [`SpawnTable::validate`].
    pub fn new(entries: &[(Category, f32)]) -> Result<Self, ConfigError> {
        let table = Self::from_bounds(entries);
        table.validate()?;
        Ok(table)
    }

    /// Unvalidated construction for the built-in tables.
    fn from_bounds(entries: &[(Category, f32)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|&(category, cumulative)| SpawnEntry {
                    category,
                    cumulative,
                })
                .collect(),
        }
    }

    /// Bounds must be finite, strictly increasing, and end at exactly 1.0.
    /// Only obstacle categories may appear.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(last) = self.entries.last() else {
            return Err(ConfigError::EmptySpawnTable);
        };
        let mut previous = 0.0f32;
        for entry in &self.entries {
            if !entry.category.is_obstacle() {
                return Err(ConfigError::NotAnObstacle(entry.category));
            }
            if !entry.cumulative.is_finite() || entry.cumulative <= previous {
                return Err(ConfigError::NonIncreasingBound {
                    category: entry.category,
                    bound: entry.cumulative,
                    previous,
                });
            }
            previous = entry.cumulative;
        }
        if last.cumulative != 1.0 {
            return Err(ConfigError::UnterminatedSpawnTable(last.cumulative));
        }
        Ok(())
    }

    /// Category for a uniform draw in `[0, 1)`.
    ///
    /// Takes the first entry whose bound is greater than `draw`; anything at or
    /// past the last bound falls to the last entry.
    pub fn select(&self, draw: f32) -> Category {
        self.entries
            .iter()
            .find(|e| draw < e.cumulative)
            .or(self.entries.last())
            .map(|e| e.category)
            .unwrap_or(Category::Platform)
    }

    pub fn entries(&self) -> &[SpawnEntry] {
        &self.entries
    }

    /// Probability mass assigned to `category`.
    pub fn probability(&self, category: Category) -> f32 {
        let mut previous = 0.0;
        let mut mass = 0.0;
        for e in &self.entries {
            if e.category == category {
                mass += e.cumulative - previous;
            }
            previous = e.cumulative;
        }
        mass
    }
}

// ---------------------------------------------------------------------------
// Category parameters
// ---------------------------------------------------------------------------

/// Fixed physical parameters for one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryParams {
    /// Full width and height.
    pub size: [f32; 2],
    pub kind: BodyKind,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub gravity_scale: f32,
    pub lock_rotation: bool,
    /// Spawn velocity. For heads `dx` is multiplied by the patrol direction.
    pub initial_velocity: Velocity,
}

impl CategoryParams {
    /// Built-in parameters for `category`.
    pub fn of(category: Category) -> Self {
        let fixed = |size: [f32; 2], friction: f32| Self {
            size,
            kind: BodyKind::Fixed,
            friction,
            restitution: 0.0,
            density: 1.0,
            gravity_scale: 1.0,
            lock_rotation: true,
            initial_velocity: Velocity::default(),
        };
        match category {
            Category::Player => Self {
                size: [30.0, 40.0],
                kind: BodyKind::Dynamic,
                friction: 0.1,
                restitution: 0.0,
                density: 1.0,
                gravity_scale: 1.0,
                lock_rotation: true,
                initial_velocity: Velocity::default(),
            },
            Category::Platform | Category::Spike => fixed([100.0, 20.0], 0.5),
            Category::Spring => fixed([200.0, 30.0], 0.5),
            Category::Treadmill => Self {
                kind: BodyKind::Conveyor,
                ..fixed([100.0, 20.0], 0.1)
            },
            Category::Fireball => Self {
                size: [30.0, 30.0],
                kind: BodyKind::Dynamic,
                friction: 0.0,
                restitution: 0.3,
                density: 1.0,
                gravity_scale: 0.0,
                lock_rotation: true,
                initial_velocity: Velocity::new(0.0, 5.0 * REFERENCE_HZ),
            },
            Category::Head => Self {
                size: [40.0, 40.0],
                kind: BodyKind::Dynamic,
                friction: 0.0,
                restitution: 0.3,
                density: 1.0,
                gravity_scale: 1.0,
                lock_rotation: true,
                initial_velocity: Velocity::new(8.0 * REFERENCE_HZ, 0.0),
            },
            Category::Boundary => fixed([20.0, 50.0], 0.0),
        }
    }

    /// Substrate descriptor for a body of `category` centered at `position`.
    pub fn body_desc(
        &self,
        category: Category,
        position: Position,
        velocity: Velocity,
    ) -> BodyDesc {
        BodyDesc {
            category,
            kind: self.kind,
            position,
            velocity,
            half_extents: [self.size[0] / 2.0, self.size[1] / 2.0],
            friction: self.friction,
            restitution: self.restitution,
            density: self.density,
            gravity_scale: self.gravity_scale,
            lock_rotation: self.lock_rotation,
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Velocity change applied to the player on a landing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reaction {
    None,
    /// `vy = 2 × jump_impulse`.
    SpringBounce,
    /// `vx += direction × conveyor_speed × 1.5`.
    ConveyorPush,
}

/// Effect of landing on one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryEffect {
    pub category: Category,
    pub life_delta: i32,
    pub reaction: Reaction,
}

/// Landing effects per category. Categories not listed have no effect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryEffects {
    effects: Vec<CategoryEffect>,
}

impl CategoryEffects {
    pub fn new(effects: Vec<CategoryEffect>) -> Self {
        Self { effects }
    }

    pub fn get(&self, category: Category) -> Option<&CategoryEffect> {
        self.effects.iter().find(|e| e.category == category)
    }

    /// Life delta for landing on `category` (0 when unlisted).
    pub fn life_delta(&self, category: Category) -> i32 {
        self.get(category).map_or(0, |e| e.life_delta)
    }

    pub fn reaction(&self, category: Category) -> Reaction {
        self.get(category).map_or(Reaction::None, |e| e.reaction)
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Everything that differs between game variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub spawn_table: SpawnTable,
    /// Horizontal run speed requested by `move`.
    pub player_speed: f32,
    /// Hard cap on run speed, if any.
    pub max_run_speed: Option<f32>,
    /// Vertical velocity set by `jump` (negative is up). `None` disables jumping.
    pub jump_impulse: Option<f32>,
    pub effects: CategoryEffects,
    /// Horizontal patrol speed for heads.
    pub patrol_speed: f32,
    /// Vertical velocity added when a head turns around.
    pub patrol_hop: f32,
    /// Heads turn around this close to either wall.
    pub patrol_margin: f32,
    /// Treadmill drift, in world units per step.
    pub conveyor_step: f32,
}

impl RuleSet {
    /// Platforms, spikes, springs, and treadmills. No jump.
    pub fn base() -> Self {
        Self {
            spawn_table: SpawnTable::from_bounds(&[
                (Category::Platform, 0.4),
                (Category::Spike, 0.6),
                (Category::Spring, 0.75),
                (Category::Treadmill, 1.0),
            ]),
            player_speed: 5.0 * REFERENCE_HZ,
            max_run_speed: None,
            jump_impulse: None,
            effects: CategoryEffects::new(vec![CategoryEffect {
                category: Category::Spike,
                life_delta: -2,
                reaction: Reaction::None,
            }]),
            patrol_speed: 8.0 * REFERENCE_HZ,
            patrol_hop: -2.0 * REFERENCE_HZ,
            patrol_margin: 40.0,
            conveyor_step: 0.5,
        }
    }

    /// Adds fireballs, heads, jumping, and the full effect table.
    pub fn extended() -> Self {
        let effect = |category, life_delta, reaction| CategoryEffect {
            category,
            life_delta,
            reaction,
        };
        Self {
            spawn_table: SpawnTable::from_bounds(&[
                (Category::Platform, 0.3),
                (Category::Spike, 0.4),
                (Category::Spring, 0.5),
                (Category::Fireball, 0.6),
                (Category::Treadmill, 0.7),
                (Category::Head, 1.0),
            ]),
            player_speed: 15.0 * REFERENCE_HZ,
            max_run_speed: Some(8.0 * REFERENCE_HZ),
            jump_impulse: Some(-10.0 * REFERENCE_HZ),
            effects: CategoryEffects::new(vec![
                effect(Category::Spring, 1, Reaction::SpringBounce),
                effect(Category::Spike, -2, Reaction::None),
                effect(Category::Treadmill, 1, Reaction::ConveyorPush),
                effect(Category::Fireball, -3, Reaction::None),
                effect(Category::Head, -4, Reaction::None),
            ]),
            patrol_speed: 8.0 * REFERENCE_HZ,
            patrol_hop: -2.0 * REFERENCE_HZ,
            patrol_margin: 40.0,
            conveyor_step: 0.5,
        }
    }

    /// Run speed after the cap.
    pub fn effective_player_speed(&self) -> f32 {
        match self.max_run_speed {
            Some(cap) => self.player_speed.min(cap),
            None => self.player_speed,
        }
    }

    /// Treadmill drift as a velocity, used by the conveyor push.
    pub fn conveyor_speed(&self) -> f32 {
        self.conveyor_step * REFERENCE_HZ
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spawn_table.validate()?;
        if !(self.player_speed.is_finite() && self.player_speed >= 0.0) {
            return Err(ConfigError::InvalidRule {
                field: "player_speed",
                value: self.player_speed,
            });
        }
        if !(self.patrol_margin.is_finite() && self.patrol_margin >= 0.0) {
            return Err(ConfigError::InvalidRule {
                field: "patrol_margin",
                value: self.patrol_margin,
            });
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::extended()
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a [`Simulation`](crate::tick::Simulation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed. Same seed + same inputs = same run.
    pub seed: u64,
    pub layout: ShaftLayout,
    /// Upper clamp on a tick's elapsed time, in milliseconds.
    pub max_step_ms: f32,
    /// Downward gravity in world units/s².
    pub gravity_y: f32,
    pub rules: RuleSet,
    pub streaming: StreamingConfig,
    /// World units of descent per score point.
    pub score_unit: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            layout: ShaftLayout::default(),
            max_step_ms: 1000.0 / REFERENCE_HZ,
            gravity_y: 1000.0,
            rules: RuleSet::extended(),
            streaming: StreamingConfig::default(),
            score_unit: DEFAULT_SCORE_UNIT,
        }
    }
}

impl SimConfig {
    /// Default config with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Default config with the base rule set.
    pub fn base(seed: u64) -> Self {
        Self {
            seed,
            rules: RuleSet::base(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every value the simulation divides by, clamps to, or samples from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.layout.play_width.is_finite() && self.layout.play_width > 0.0) {
            return Err(ConfigError::InvalidWidth(self.layout.play_width));
        }
        if !(self.layout.viewport_height.is_finite() && self.layout.viewport_height > 0.0) {
            return Err(ConfigError::InvalidViewport(self.layout.viewport_height));
        }
        if !(self.max_step_ms.is_finite() && self.max_step_ms > 0.0) {
            return Err(ConfigError::InvalidStep(self.max_step_ms));
        }
        if !(self.score_unit.is_finite() && self.score_unit > 0.0) {
            return Err(ConfigError::InvalidRule {
                field: "score_unit",
                value: self.score_unit,
            });
        }
        let s = &self.streaming;
        if !(s.gap_min.is_finite()
            && s.gap_max.is_finite()
            && s.gap_min > 0.0
            && s.gap_max > s.gap_min)
        {
            return Err(ConfigError::InvalidStreaming {
                field: "gap_max",
                value: s.gap_max,
            });
        }
        if !(s.band_width.is_finite() && s.band_width > 0.0) {
            return Err(ConfigError::InvalidStreaming {
                field: "band_width",
                value: s.band_width,
            });
        }
        if !(s.boundary_tile.is_finite() && s.boundary_tile > 0.0) {
            return Err(ConfigError::InvalidStreaming {
                field: "boundary_tile",
                value: s.boundary_tile,
            });
        }
        if s.batch_rows == 0 {
            return Err(ConfigError::InvalidStreaming {
                field: "batch_rows",
                value: 0.0,
            });
        }
        self.rules.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
