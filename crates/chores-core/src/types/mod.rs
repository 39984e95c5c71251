//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by every layer of the engine:
//! - Sub-state of detectors and stages (`SubState`)
//! - Chore lifecycle state (`ChoreState`) and completion attribution (`CompletedBy`)
//! - External readings (`StateChange`, `StateReader`, `EntityStates`)
//! - The evaluation context handed to every operation (`Context`)
//! - Error types (`ChoreError`)
//!
//! ## Unreadable Values
//!
//! A reading that is missing, `unavailable` or `unknown` is "no signal". It is
//! never interpreted as a negative reading by any detector or gate.

pub mod clock;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use clock::{
    MAX_SPAN_DAYS, ScheduleSlot, TimeOfDay, next_daily_after, next_weekly_after, parse_weekday,
    span_hours, span_minutes, span_seconds,
};

/// Reading reported by an entity whose source is offline.
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Reading reported by an entity that has not produced a value yet.
pub const STATE_UNKNOWN: &str = "unknown";

/// Returns true when a reading carries no signal.
#[must_use]
pub fn is_unreadable(value: Option<&str>) -> bool {
    matches!(value, None | Some(STATE_UNAVAILABLE | STATE_UNKNOWN))
}

/// Parse a reading as a number, treating unreadable values as absent.
#[must_use]
pub fn parse_numeric(value: Option<&str>) -> Option<f64> {
    if is_unreadable(value) {
        return None;
    }
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

// =============================================================================
// SUB-STATE
// =============================================================================

/// Three-value progress shared by detectors and stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubState {
    #[default]
    Idle,
    Active,
    Done,
}

impl SubState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubState::Idle => "idle",
            SubState::Active => "active",
            SubState::Done => "done",
        }
    }
}

impl std::fmt::Display for SubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHORE STATE
// =============================================================================

/// Lifecycle state of a chore.
///
/// `inactive → pending → due → started → completed → inactive`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChoreState {
    #[default]
    Inactive,
    Pending,
    Due,
    Started,
    Completed,
}

impl ChoreState {
    /// All states in lifecycle order.
    pub const ALL: [ChoreState; 5] = [
        ChoreState::Inactive,
        ChoreState::Pending,
        ChoreState::Due,
        ChoreState::Started,
        ChoreState::Completed,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoreState::Inactive => "inactive",
            ChoreState::Pending => "pending",
            ChoreState::Due => "due",
            ChoreState::Started => "started",
            ChoreState::Completed => "completed",
        }
    }

    /// Capitalized display label used when no custom label is configured.
    #[must_use]
    pub fn default_label(&self) -> &'static str {
        match self {
            ChoreState::Inactive => "Inactive",
            ChoreState::Pending => "Pending",
            ChoreState::Due => "Due",
            ChoreState::Started => "Started",
            ChoreState::Completed => "Completed",
        }
    }

    /// Whether `due_since` must be set in this state.
    #[must_use]
    pub fn is_due_like(&self) -> bool {
        matches!(self, ChoreState::Due | ChoreState::Started)
    }
}

impl std::fmt::Display for ChoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a completion came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletedBy {
    Forced,
    Manual,
    Sensor,
}

/// Role a detector plays inside a chore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRole {
    Trigger,
    Completion,
}

impl std::fmt::Display for StageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageRole::Trigger => f.write_str("trigger"),
            StageRole::Completion => f.write_str("completion"),
        }
    }
}

// =============================================================================
// EXTERNAL READINGS
// =============================================================================

/// A single entity transition as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    /// Previous reading; `None` when the entity was not known before.
    pub old_state: Option<String>,
    /// New reading; `None` when the entity was removed.
    pub new_state: Option<String>,
}

impl StateChange {
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        old_state: Option<&str>,
        new_state: Option<&str>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            old_state: old_state.map(str::to_string),
            new_state: new_state.map(str::to_string),
        }
    }

    #[must_use]
    pub fn old(&self) -> Option<&str> {
        self.old_state.as_deref()
    }

    #[must_use]
    pub fn new_value(&self) -> Option<&str> {
        self.new_state.as_deref()
    }

    /// Startup or reconnect noise: the prior reading carried no signal.
    #[must_use]
    pub fn is_from_unreadable(&self) -> bool {
        is_unreadable(self.old())
    }
}

/// Read access to the current value of external entities.
pub trait StateReader {
    /// Current reading of `entity_id`, if the entity is known.
    fn state(&self, entity_id: &str) -> Option<&str>;
}

/// In-memory cache of the latest reading for every entity seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStates {
    states: BTreeMap<String, String>,
}

impl EntityStates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new reading and return the transition it represents.
    pub fn set(&mut self, entity_id: &str, value: &str) -> StateChange {
        let old = self.states.insert(entity_id.to_string(), value.to_string());
        StateChange {
            entity_id: entity_id.to_string(),
            old_state: old,
            new_state: Some(value.to_string()),
        }
    }

    /// Forget an entity and return the transition it represents.
    pub fn remove(&mut self, entity_id: &str) -> StateChange {
        let old = self.states.remove(entity_id);
        StateChange {
            entity_id: entity_id.to_string(),
            old_state: old,
            new_state: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.states.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl StateReader for EntityStates {
    fn state(&self, entity_id: &str) -> Option<&str> {
        self.states.get(entity_id).map(String::as_str)
    }
}

impl StateReader for BTreeMap<String, String> {
    fn state(&self, entity_id: &str) -> Option<&str> {
        self.get(entity_id).map(String::as_str)
    }
}

// =============================================================================
// EVALUATION CONTEXT
// =============================================================================

/// Everything an operation may observe: the current instant and entity readings.
///
/// `now` carries the host's local offset; wall-clock rules (daily, weekly,
/// scheduled resets) are evaluated in that offset.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub now: DateTime<FixedOffset>,
    pub states: &'a dyn StateReader,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(now: DateTime<FixedOffset>, states: &'a dyn StateReader) -> Self {
        Self { now, states }
    }

    /// The current instant in UTC, the form every stored timestamp uses.
    #[must_use]
    pub fn utc(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }

    /// Convert a stored instant into the local offset of `now`.
    #[must_use]
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(self.now.offset())
    }

    #[must_use]
    pub fn state(&self, entity_id: &str) -> Option<&'a str> {
        self.states.state(entity_id)
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("now", &self.now).finish()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the chores engine.
///
/// The engine never panics; construction problems surface as `Config` and
/// commands against unknown chores as `ChoreNotFound`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChoreError {
    /// Configuration could not be turned into a working chore.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No chore is registered under this id.
    #[error("Chore not found: {0}")]
    ChoreNotFound(String),

    /// A chore with this id is already registered.
    #[error("Duplicate chore id: {0}")]
    DuplicateChore(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Host-side I/O failure (state file, configuration file, sockets).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ChoreError {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        ChoreError::Config(msg.into())
    }
}
