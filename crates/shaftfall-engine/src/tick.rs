//! The Simulation Step: one bounded, ordered update of the whole shaft.
//!
//! [`Simulation`] owns the substrate (when attached), the
//! [`EntityRegistry`], the [`WorldCursor`], and a seeded RNG. Each
//! [`tick`](Simulation::tick):
//!
//! 1. Does nothing if no substrate is attached or the sink reports game over.
//! 2. Clamps the elapsed time to `[0, max_step_ms]`.
//! 3. Applies the tick's input events (jumps first, then horizontal commands).
//! 4. Runs the behavior pass.
//! 5. Steps the substrate once with the clamped dt (skipped when dt is zero).
//! 6. Resolves contacts into the sink and reports the player's progress.
//! 7. Runs streaming maintenance against the camera offset.
//!
//! A landing that ends the game stops the tick after step 6's contact
//! resolution: no progress report and no streaming.
//!
//! Nothing is randomized outside the seeded [`Pcg32`], so a seed plus a
//! sequence of [`TickInput`]s reproduces a run exactly.
//!
//! # Example
//!
//! ```
//! use shaftfall_engine::prelude::*;
//!
//! let mut sim = Simulation::with_rapier(SimConfig::with_seed(3)).unwrap();
//! let mut state = sim.new_game_state();
//!
//! for _ in 0..10 {
//!     let camera = sim.camera_target().unwrap_or(0.0);
//!     sim.tick(&TickInput::new(16.0, camera), &mut state);
//! }
//!
//! assert_eq!(sim.tick_count(), 10);
//! assert!(!state.is_game_over);
//! ```

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use shaftfall_core::entity::Position;
use shaftfall_core::input::{EventQueue, InputEvent};
use shaftfall_core::registry::EntityRegistry;
use shaftfall_core::snapshot::RegistrySnapshot;
use shaftfall_core::state::{GameState, RuleSink, WorldCursor};
use tracing::{debug, trace, warn};

use crate::behavior::run_behavior_pass;
use crate::config::SimConfig;
use crate::control::apply_events;
use crate::physics::{RapierSubstrate, Substrate};
use crate::rules::resolve_contacts;
use crate::streaming::{maintain, seed_world};
use crate::ConfigError;

// ---------------------------------------------------------------------------
// TickInput
// ---------------------------------------------------------------------------

/// Everything the presentation layer hands to one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// Wall time since the previous tick, in milliseconds.
    pub elapsed_ms: f32,
    /// Events queued since the previous tick, in arrival order.
    #[serde(default)]
    pub events: Vec<InputEvent>,
    /// Current camera top in world Y. Owned by the caller.
    pub camera_offset: f32,
}

impl TickInput {
    pub fn new(elapsed_ms: f32, camera_offset: f32) -> Self {
        Self {
            elapsed_ms,
            events: Vec::new(),
            camera_offset,
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = InputEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Take the contents of `queue` as this tick's events.
    pub fn with_queue(mut self, queue: &mut EventQueue) -> Self {
        self.events.extend(queue.drain_ordered());
        self
    }
}

/// Clamp a tick's elapsed time to `[0, max_ms]`. Non-finite input counts as 0.
pub fn clamp_elapsed_ms(elapsed_ms: f32, max_ms: f32) -> f32 {
    if elapsed_ms.is_finite() {
        elapsed_ms.clamp(0.0, max_ms)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Detached,
    GameOver,
}

/// What the last tick did and how long each phase took.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub skipped: Option<SkipReason>,
    /// Clamped elapsed time actually integrated.
    pub dt_ms: f32,
    pub events_applied: usize,
    pub patrols_turned: usize,
    pub contacts: usize,
    pub landings: usize,
    pub spawned: usize,
    pub removed: usize,
    /// Wall-clock time per phase, in execution order.
    pub phase_times: Vec<(&'static str, Duration)>,
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// The descent simulation over a [`Substrate`].
pub struct Simulation<S: Substrate> {
    substrate: Option<S>,
    registry: EntityRegistry,
    cursor: WorldCursor,
    rng: Pcg32,
    config: SimConfig,
    tick_counter: u64,
    last_diagnostics: TickDiagnostics,
}

impl Simulation<RapierSubstrate> {
    /// Build a simulation on a fresh rapier2d world using `config.gravity_y`.
    pub fn with_rapier(config: SimConfig) -> Result<Self, ConfigError> {
        let substrate = RapierSubstrate::new(config.gravity_y);
        Self::new(substrate, config)
    }
}

impl<S: Substrate> Simulation<S> {
    /// Validate `config`, attach `substrate`, and seed the initial world.
    pub fn new(substrate: S, config: SimConfig) -> Result<Self, ConfigError> {
        let mut sim = Self::detached(config)?;
        sim.attach(substrate);
        Ok(sim)
    }

    /// A simulation with no substrate. Ticks do nothing until one is attached.
    pub fn detached(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            substrate: None,
            registry: EntityRegistry::new(),
            cursor: WorldCursor::new(0.0, 0.0, 0.0),
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            tick_counter: 0,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    /// Attach `substrate` and seed a fresh world on it from the config seed.
    ///
    /// Any previously attached substrate is cleared of this simulation's
    /// bodies and returned.
    pub fn attach(&mut self, substrate: S) -> Option<S> {
        let previous = self.detach();
        self.substrate = Some(substrate);
        self.seed();
        previous
    }

    /// Remove every registered body from the substrate, clear the registry
    /// and cursor, and hand the substrate back.
    pub fn detach(&mut self) -> Option<S> {
        let mut substrate = self.substrate.take()?;
        let entities = self.registry.drain();
        let count = entities.len();
        for entity in entities {
            if !substrate.remove_body(entity.body) {
                warn!(key = %entity.key, body = %entity.body, "body already gone at detach");
            }
        }
        self.cursor = WorldCursor::new(0.0, 0.0, 0.0);
        debug!(count, "detached simulation");
        Some(substrate)
    }

    /// Start a new run with `seed` on the attached substrate.
    ///
    /// Without a substrate only the seed is updated.
    pub fn reset(&mut self, seed: u64) {
        self.config.seed = seed;
        self.tick_counter = 0;
        self.last_diagnostics = TickDiagnostics::default();
        match self.detach() {
            Some(substrate) => {
                self.substrate = Some(substrate);
                self.seed();
            }
            None => self.rng = Pcg32::seed_from_u64(seed),
        }
    }

    /// Consume the simulation, detaching every body. Returns the substrate.
    pub fn teardown(mut self) -> Option<S> {
        self.detach()
    }

    fn seed(&mut self) {
        self.rng = Pcg32::seed_from_u64(self.config.seed);
        let Some(substrate) = self.substrate.as_mut() else {
            return;
        };
        self.cursor = seed_world(substrate, &mut self.registry, &mut self.rng, &self.config);
        debug!(
            seed = self.config.seed,
            entities = self.registry.len(),
            "seeded run"
        );
    }

    // -- tick ---------------------------------------------------------------

    /// Run one tick. See the module docs for the phase order.
    ///
    /// Returns the registry as it stands after the tick.
    pub fn tick<K>(&mut self, input: &TickInput, sink: &mut K) -> &EntityRegistry
    where
        K: RuleSink + ?Sized,
    {
        let tick_start = Instant::now();
        let mut diag = TickDiagnostics::default();

        let Some(substrate) = self.substrate.as_mut() else {
            trace!("tick without substrate");
            diag.skipped = Some(SkipReason::Detached);
            self.last_diagnostics = diag;
            return &self.registry;
        };
        if sink.is_game_over() {
            trace!("tick after game over");
            diag.skipped = Some(SkipReason::GameOver);
            self.last_diagnostics = diag;
            return &self.registry;
        }

        let dt_ms = clamp_elapsed_ms(input.elapsed_ms, self.config.max_step_ms);
        diag.dt_ms = dt_ms;

        let phase = Instant::now();
        let events = EventQueue::from(input.events.clone()).drain_ordered();
        diag.events_applied = apply_events(substrate, &self.registry, &self.config.rules, &events);
        diag.phase_times.push(("control", phase.elapsed()));

        let phase = Instant::now();
        diag.patrols_turned = run_behavior_pass(
            substrate,
            &mut self.registry,
            &self.config.rules,
            &self.config.layout,
        );
        diag.phase_times.push(("behavior", phase.elapsed()));

        let phase = Instant::now();
        let contacts = if dt_ms > 0.0 {
            substrate.step(dt_ms / 1000.0)
        } else {
            Vec::new()
        };
        diag.contacts = contacts.len();
        diag.phase_times.push(("step", phase.elapsed()));

        let phase = Instant::now();
        let outcomes = resolve_contacts(
            substrate,
            &self.registry,
            &self.config.rules,
            &contacts,
            sink,
        );
        diag.landings = outcomes.iter().filter(|o| o.landing).count();
        if sink.is_game_over() {
            diag.phase_times.push(("rules", phase.elapsed()));
            debug!(tick = self.tick_counter, "game over during tick; world frozen");
            self.tick_counter += 1;
            diag.total_time = tick_start.elapsed();
            self.last_diagnostics = diag;
            return &self.registry;
        }
        if let Some(y) = self
            .registry
            .player()
            .and_then(|p| substrate.position(p.body))
            .map(|p| p.y)
        {
            sink.progress(y);
        }
        diag.phase_times.push(("rules", phase.elapsed()));

        let phase = Instant::now();
        let report = maintain(
            substrate,
            &mut self.registry,
            &mut self.cursor,
            &mut self.rng,
            &self.config,
            input.camera_offset,
        );
        diag.spawned = report.spawned;
        diag.removed = report.removed;
        diag.phase_times.push(("streaming", phase.elapsed()));

        self.tick_counter += 1;
        diag.total_time = tick_start.elapsed();
        self.last_diagnostics = diag;
        &self.registry
    }

    // -- queries ------------------------------------------------------------

    /// A fresh [`GameState`] scoring from the player's current Y.
    pub fn new_game_state(&self) -> GameState {
        let start_y = self.player_position().map_or(0.0, |p| p.y);
        let mut state = GameState::new(start_y);
        state.score_unit = self.config.score_unit;
        state
    }

    /// Where the camera should sit: a fixed lead above the player.
    pub fn camera_target(&self) -> Option<f32> {
        self.player_position()
            .map(|p| p.y - self.config.streaming.camera_lead)
    }

    pub fn player_position(&self) -> Option<Position> {
        let substrate = self.substrate.as_ref()?;
        let player = self.registry.player()?;
        substrate.position(player.body)
    }

    /// Capture the registry with current body state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        match self.substrate.as_ref() {
            Some(substrate) => RegistrySnapshot::capture(&self.registry, |body| {
                Some((substrate.position(body)?, substrate.velocity(body)?))
            }),
            None => RegistrySnapshot::capture(&self.registry, |_| None),
        }
    }

    /// BLAKE3 hex digest of the current snapshot.
    pub fn state_hash(&self) -> String {
        self.snapshot().hash
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn cursor(&self) -> &WorldCursor {
        &self.cursor
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.substrate.is_some()
    }

    pub fn substrate(&self) -> Option<&S> {
        self.substrate.as_ref()
    }

    /// Direct substrate access, for setup and tests.
    pub fn substrate_mut(&mut self) -> Option<&mut S> {
        self.substrate.as_mut()
    }

    /// Mutable registry access, for setup and tests. Keep bodies in sync.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Number of ticks that ran (skipped ticks are not counted).
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
