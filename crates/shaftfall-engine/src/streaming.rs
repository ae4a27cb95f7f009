//! Camera-relative streaming: seeding, obstacle rows, boundary tiles, cleanup.
//!
//! The shaft is unbounded downward, so content is generated in batches ahead
//! of the camera and removed once it has scrolled far enough above it. The
//! [`WorldCursor`] marks gate both directions; they only move down.
//!
//! Every generated entity gets its body from the substrate first and is then
//! registered. If registration fails the body is removed again, so the
//! registry and the substrate never disagree about what exists.

use rand::Rng;
use shaftfall_core::entity::{Behavior, Category, Entity, EntityKey, Position, Side, Velocity};
use shaftfall_core::registry::EntityRegistry;
use shaftfall_core::state::WorldCursor;
use tracing::{debug, trace, warn};

use crate::config::{CategoryParams, SimConfig};
use crate::physics::Substrate;

/// Thickness of the ceiling across the top of the shaft.
const CEILING_THICKNESS: f32 = 20.0;

/// Horizontal inset of boundary tile centers from each wall.
const BOUNDARY_INSET: f32 = 10.0;

/// Player spawn X keeps this far from either wall.
const PLAYER_SPAWN_MARGIN: f32 = 50.0;

/// The cleanup mark starts this far above the first row.
const INITIAL_CLEANUP_LAG: f32 = 200.0;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Create `count` obstacle rows below `start_y`.
///
/// Returns the new entities (not yet registered) and the Y of the last row,
/// which is `start_y` when `count` is zero.
pub fn generate_obstacles<S, R>(
    substrate: &mut S,
    rng: &mut R,
    config: &SimConfig,
    start_y: f32,
    count: usize,
) -> (Vec<Entity>, f32)
where
    S: Substrate + ?Sized,
    R: Rng + ?Sized,
{
    let width = config.layout.play_width;
    let stream = &config.streaming;
    let rules = &config.rules;

    let mut entities = Vec::with_capacity(count);
    let mut y = start_y;

    for index in 0..count {
        y += rng.gen_range(stream.gap_min..stream.gap_max);
        let side = Side::for_row(index);
        let band_start = match side {
            Side::Left => stream.band_inset,
            Side::Right => width - stream.band_inset - stream.band_width,
        };
        let mut x = rng.gen_range(band_start..band_start + stream.band_width);
        let category = rules.spawn_table.select(rng.gen::<f32>());

        let params = CategoryParams::of(category);
        let mut spawn_y = y;
        let mut velocity = params.initial_velocity;
        let behavior = match category {
            Category::Fireball => {
                x = rng.gen_range(0.0..width);
                spawn_y = y - stream.fireball_lead;
                Behavior::Inert
            }
            Category::Head => {
                let direction = side.inward();
                x = match side {
                    Side::Left => stream.head_inset,
                    Side::Right => width - stream.head_inset,
                };
                velocity = Velocity::new(velocity.dx * direction, velocity.dy);
                Behavior::Patrol { direction }
            }
            Category::Treadmill => Behavior::Conveyor { direction: -1.0 },
            _ => Behavior::Inert,
        };

        let body = substrate.create_body(&params.body_desc(
            category,
            Position::new(x, spawn_y),
            velocity,
        ));
        if let Behavior::Conveyor { direction } = behavior {
            substrate.add_conveyor(body, rules.conveyor_step * direction);
        }

        entities.push(Entity::new(
            EntityKey::obstacle(category, y, index),
            body,
            category,
            params.size,
            behavior,
        ));
    }

    debug!(count, start_y, last_y = y, "generated obstacle rows");
    (entities, y)
}

/// Tile both walls every `boundary_tile` units from `start_y` while `y < end_y`.
///
/// Returns the tiles and the first Y left untiled.
pub fn generate_boundaries<S>(
    substrate: &mut S,
    config: &SimConfig,
    start_y: f32,
    end_y: f32,
) -> (Vec<Entity>, f32)
where
    S: Substrate + ?Sized,
{
    let mut entities = Vec::new();
    if !(start_y.is_finite() && end_y.is_finite()) {
        warn!(start_y, end_y, "refusing to tile a non-finite range");
        return (entities, start_y);
    }

    let width = config.layout.play_width;
    let params = CategoryParams::of(Category::Boundary);
    let mut y = start_y;
    while y < end_y {
        for (side, x) in [(Side::Left, BOUNDARY_INSET), (Side::Right, width - BOUNDARY_INSET)] {
            let body = substrate.create_body(&params.body_desc(
                Category::Boundary,
                Position::new(x, y),
                Velocity::default(),
            ));
            entities.push(Entity::new(
                EntityKey::boundary(side, y),
                body,
                Category::Boundary,
                params.size,
                Behavior::Inert,
            ));
        }
        y += config.streaming.boundary_tile;
    }

    debug!(tiles = entities.len(), start_y, last_y = y, "generated boundary tiles");
    (entities, y)
}

/// Register `entities`. Any that cannot be registered have their body removed.
///
/// Returns how many were registered.
pub fn register_all<S>(
    substrate: &mut S,
    registry: &mut EntityRegistry,
    entities: Vec<Entity>,
) -> usize
where
    S: Substrate + ?Sized,
{
    let mut registered = 0;
    for entity in entities {
        let body = entity.body;
        match registry.insert(entity) {
            Ok(()) => registered += 1,
            Err(e) => {
                warn!(error = %e, "dropping entity that could not be registered");
                substrate.remove_body(body);
            }
        }
    }
    registered
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Build the initial world into an empty registry and return the cursor.
///
/// Creates the ceiling, the start platform, the player, the first obstacle
/// rows, and boundary tiles down to a margin past the last row.
pub fn seed_world<S, R>(
    substrate: &mut S,
    registry: &mut EntityRegistry,
    rng: &mut R,
    config: &SimConfig,
) -> WorldCursor
where
    S: Substrate + ?Sized,
    R: Rng + ?Sized,
{
    let width = config.layout.play_width;
    let stream = &config.streaming;
    let mut entities = Vec::new();

    let ceiling = CategoryParams::of(Category::Boundary);
    let ceiling_size = [width, CEILING_THICKNESS];
    let body = substrate.create_body(&crate::physics::BodyDesc {
        half_extents: [ceiling_size[0] / 2.0, ceiling_size[1] / 2.0],
        ..ceiling.body_desc(
            Category::Boundary,
            Position::new(width / 2.0, 0.0),
            Velocity::default(),
        )
    });
    entities.push(Entity::new(
        EntityKey::top_boundary(),
        body,
        Category::Boundary,
        ceiling_size,
        Behavior::Inert,
    ));

    let platform = CategoryParams::of(Category::Platform);
    let body = substrate.create_body(&platform.body_desc(
        Category::Platform,
        Position::new(width / 2.0, stream.first_row_y),
        Velocity::default(),
    ));
    entities.push(Entity::new(
        EntityKey::top_platform(),
        body,
        Category::Platform,
        platform.size,
        Behavior::Inert,
    ));

    let player = CategoryParams::of(Category::Player);
    let (lo, hi) = (PLAYER_SPAWN_MARGIN, width - PLAYER_SPAWN_MARGIN);
    let player_x = if hi > lo { rng.gen_range(lo..hi) } else { width / 2.0 };
    let body = substrate.create_body(&player.body_desc(
        Category::Player,
        Position::new(player_x, stream.player_start_y),
        Velocity::default(),
    ));
    entities.push(Entity::new(
        EntityKey::player(),
        body,
        Category::Player,
        player.size,
        Behavior::Inert,
    ));

    let (rows, last_obstacle_y) =
        generate_obstacles(substrate, rng, config, stream.first_row_y, stream.initial_rows);
    entities.extend(rows);

    let (tiles, last_boundary_y) = generate_boundaries(
        substrate,
        config,
        0.0,
        last_obstacle_y + stream.boundary_margin,
    );
    entities.extend(tiles);

    let registered = register_all(substrate, registry, entities);
    debug!(registered, player_x, "seeded world");

    WorldCursor::new(
        last_obstacle_y,
        last_boundary_y,
        stream.first_row_y - INITIAL_CLEANUP_LAG,
    )
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

/// Remove every entity whose body sits above `cleanup_y` (smaller Y).
///
/// The player and `topBoundary*` keys are exempt. An entity whose body the
/// substrate no longer knows is removed as well. Bodies are detached before
/// records are dropped. Returns the removed keys in sorted order.
pub fn cleanup<S>(
    substrate: &mut S,
    registry: &mut EntityRegistry,
    cleanup_y: f32,
) -> Vec<EntityKey>
where
    S: Substrate + ?Sized,
{
    let mut removed = Vec::new();
    for key in registry.sorted_keys() {
        if key.is_cleanup_exempt() {
            continue;
        }
        let Some(entity) = registry.get(&key) else {
            continue;
        };
        let body = entity.body;
        match substrate.position(body) {
            Some(pos) if pos.y < cleanup_y => {
                substrate.remove_body(body);
            }
            Some(_) => continue,
            None => {
                warn!(key = %key, body = %body, "registered entity has no body; dropping record");
            }
        }
        registry.remove(&key);
        trace!(key = %key, "cleaned up");
        removed.push(key);
    }
    if !removed.is_empty() {
        debug!(count = removed.len(), cleanup_y, "cleanup pass");
    }
    removed
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Entity counts from one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub spawned: usize,
    pub removed: usize,
}

/// Run cleanup and generation for `camera_offset`, advancing the cursor.
///
/// Cleanup runs when `camera - lookbehind` has passed the cleanup mark.
/// Generation runs when `camera + viewport + lookahead` has passed the
/// boundary mark: one batch of rows from the last row, then boundary tiles
/// from the boundary mark down to a margin past the new last row.
pub fn maintain<S, R>(
    substrate: &mut S,
    registry: &mut EntityRegistry,
    cursor: &mut WorldCursor,
    rng: &mut R,
    config: &SimConfig,
    camera_offset: f32,
) -> StreamReport
where
    S: Substrate + ?Sized,
    R: Rng + ?Sized,
{
    let stream = &config.streaming;
    let mut report = StreamReport::default();
    if !camera_offset.is_finite() {
        trace!(camera_offset, "skipping streaming for non-finite camera");
        return report;
    }

    if let Some(threshold) = cursor.cleanup_due(camera_offset, stream.lookbehind) {
        report.removed = cleanup(substrate, registry, threshold).len();
        cursor.advance_cleanup(threshold);
    }

    if cursor.spawn_due(camera_offset, config.layout.viewport_height, stream.lookahead) {
        let (rows, last_obstacle_y) =
            generate_obstacles(substrate, rng, config, cursor.last_obstacle_y, stream.batch_rows);
        let (tiles, last_boundary_y) = generate_boundaries(
            substrate,
            config,
            cursor.last_boundary_y,
            last_obstacle_y + stream.boundary_margin,
        );
        report.spawned += register_all(substrate, registry, rows);
        report.spawned += register_all(substrate, registry, tiles);
        cursor.advance_obstacles(last_obstacle_y);
        cursor.advance_boundaries(last_boundary_y);
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
