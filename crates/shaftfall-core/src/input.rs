//! Discrete input events and the per-tick event queue.
//!
//! Events use an externally tagged JSON form:
//!
//! ```json
//! {"move": {"direction": 1}}
//! {"jump": {}}
//! {"swipe": {"dx": 40.0, "dy": 3.0}}
//! {"stop": {}}
//! ```
//!
//! The queue is drained once per tick. Jumps come out first; the horizontal
//! commands (`move`, `swipe`, `stop`) follow in arrival order so that the last
//! one wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Horizontal direction. Only `-1` and `1` are valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// `-1.0` for left, `1.0` for right.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }

    /// Direction from the sign of `value`; `None` for zero or NaN.
    pub fn from_sign(value: f32) -> Option<Self> {
        if value > 0.0 {
            Some(Direction::Right)
        } else if value < 0.0 {
            Some(Direction::Left)
        } else {
            None
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Left),
            1 => Ok(Direction::Right),
            other => Err(format!("direction must be -1 or 1, got {other}")),
        }
    }
}

impl From<Direction> for i8 {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// InputEvent
// ---------------------------------------------------------------------------

/// One discrete player command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEvent {
    /// Run in `direction` at the rule set's player speed.
    Move { direction: Direction },
    /// Vertical impulse. Allowed while airborne.
    Jump {},
    /// Touch drag; acts as `Move` when mostly horizontal.
    Swipe { dx: f32, dy: f32 },
    /// Zero horizontal velocity.
    Stop {},
}

impl InputEvent {
    pub fn move_left() -> Self {
        InputEvent::Move {
            direction: Direction::Left,
        }
    }

    pub fn move_right() -> Self {
        InputEvent::Move {
            direction: Direction::Right,
        }
    }

    pub fn jump() -> Self {
        InputEvent::Jump {}
    }

    pub fn stop() -> Self {
        InputEvent::Stop {}
    }

    /// Parse a raw event. Unknown or malformed events yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(error = %e, event = %value, "dropping malformed input event");
                None
            }
        }
    }

    /// Drain rank: jumps before horizontal commands.
    fn rank(&self) -> u8 {
        match self {
            InputEvent::Jump {} => 0,
            InputEvent::Move { .. } | InputEvent::Swipe { .. } | InputEvent::Stop {} => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

/// Input events collected between ticks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventQueue {
    events: Vec<InputEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Parse and enqueue a raw event. Returns whether it was accepted.
    pub fn push_json(&mut self, value: &serde_json::Value) -> bool {
        match InputEvent::from_json(value) {
            Some(event) => {
                self.events.push(event);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every queued event in application order.
    ///
    /// The sort is stable, so events of equal rank keep arrival order.
    pub fn drain_ordered(&mut self) -> Vec<InputEvent> {
        let mut events = std::mem::take(&mut self.events);
        events.sort_by_key(InputEvent::rank);
        events
    }
}

impl From<Vec<InputEvent>> for EventQueue {
    fn from(events: Vec<InputEvent>) -> Self {
        Self { events }
    }
}

impl FromIterator<InputEvent> for EventQueue {
    fn from_iter<T: IntoIterator<Item = InputEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
