//! # Chore Configuration
//!
//! The serde data model a host deserializes chore definitions into. Detector
//! and reset variants are internally tagged on `type`, so an unrecognized type
//! string is rejected during deserialization:
//!
//! ```json
//! {
//!   "id": "laundry",
//!   "name": "Empty the washer",
//!   "trigger": { "type": "power_cycle", "power_sensor": "sensor.washer_power" },
//!   "completion": { "type": "contact", "entity_id": "binary_sensor.washer_door" }
//! }
//! ```
//!
//! Structural checks that serde cannot express (an empty weekly schedule, a
//! power cycle without sensors, a detector in a role it does not support) are
//! enforced when the chore is built.

use crate::types::{ChoreError, ChoreState, ScheduleSlot, TimeOfDay};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default target value for `sensor_state` and `duration`.
pub const DEFAULT_TARGET_STATE: &str = "on";

/// Default `contact_cycle` debounce window.
pub const DEFAULT_DEBOUNCE_SECONDS: u64 = 2;

/// Default `power_cycle` power threshold (W).
pub const DEFAULT_POWER_THRESHOLD: f64 = 10.0;

/// Default `power_cycle` current threshold (A).
pub const DEFAULT_CURRENT_THRESHOLD: f64 = 0.04;

/// Default `power_cycle` cooldown after the draw falls.
pub const DEFAULT_COOLDOWN_MINUTES: u64 = 5;

fn default_target_state() -> String {
    DEFAULT_TARGET_STATE.to_string()
}

fn default_debounce_seconds() -> u64 {
    DEFAULT_DEBOUNCE_SECONDS
}

fn default_power_threshold() -> f64 {
    DEFAULT_POWER_THRESHOLD
}

fn default_current_threshold() -> f64 {
    DEFAULT_CURRENT_THRESHOLD
}

fn default_cooldown_minutes() -> u64 {
    DEFAULT_COOLDOWN_MINUTES
}

// =============================================================================
// DETECTOR CONFIGURATION
// =============================================================================

/// Comparison applied by `sensor_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    #[default]
    Above,
    Below,
    Equal,
}

impl ThresholdOperator {
    #[must_use]
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            ThresholdOperator::Above => value > threshold,
            ThresholdOperator::Below => value < threshold,
            ThresholdOperator::Equal => value == threshold,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdOperator::Above => "above",
            ThresholdOperator::Below => "below",
            ThresholdOperator::Equal => "equal",
        }
    }
}

/// Type-specific detector settings, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Completed only by an explicit command.
    Manual,
    SensorState {
        entity_id: String,
        #[serde(default = "default_target_state")]
        state: String,
    },
    Contact {
        entity_id: String,
    },
    ContactCycle {
        entity_id: String,
        #[serde(default = "default_debounce_seconds")]
        debounce_seconds: u64,
    },
    PresenceCycle {
        entity_id: String,
    },
    SensorThreshold {
        entity_id: String,
        threshold: f64,
        #[serde(default)]
        operator: ThresholdOperator,
    },
    PowerCycle {
        #[serde(default)]
        power_sensor: Option<String>,
        #[serde(default)]
        current_sensor: Option<String>,
        #[serde(default = "default_power_threshold")]
        power_threshold: f64,
        #[serde(default = "default_current_threshold")]
        current_threshold: f64,
        #[serde(default = "default_cooldown_minutes")]
        cooldown_minutes: u64,
    },
    StateChange {
        entity_id: String,
        from: String,
        to: String,
    },
    Daily {
        time: TimeOfDay,
    },
    Weekly {
        schedule: Vec<ScheduleSlot>,
    },
    Duration {
        entity_id: String,
        #[serde(default = "default_target_state")]
        state: String,
        duration_hours: f64,
    },
}

/// Secondary condition attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub entity_id: String,
    pub state: String,
}

/// A trigger or completion stage: a detector plus an optional gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(flatten)]
    pub detector: DetectorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateConfig>,
}

impl StageConfig {
    /// A stage without a gate.
    #[must_use]
    pub fn new(detector: DetectorConfig) -> Self {
        Self {
            detector,
            gate: None,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        self.gate = Some(GateConfig {
            entity_id: entity_id.into(),
            state: state.into(),
        });
        self
    }

    /// The completion used when a chore configures none.
    #[must_use]
    pub fn manual() -> Self {
        Self::new(DetectorConfig::Manual)
    }
}

// =============================================================================
// RESET CONFIGURATION
// =============================================================================

/// Explicit reset policy. When absent, the policy is derived from the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResetConfig {
    /// Reset a fixed number of minutes after completion (`0` = immediately).
    Delay {
        #[serde(default)]
        minutes: i64,
    },
    /// Reset at the next occurrence of a wall-clock time.
    DailyReset {
        #[serde(default = "TimeOfDay::midnight")]
        time: TimeOfDay,
    },
}

// =============================================================================
// CHORE CONFIGURATION
// =============================================================================

/// Complete definition of one chore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoreConfig {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub trigger: StageConfig,
    #[serde(default = "StageConfig::manual")]
    pub completion: StageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetConfig>,
    /// Display label per state; missing states use the capitalized name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_labels: BTreeMap<ChoreState, String>,
    /// Wall-clock time before which a due chore is not announced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_at: Option<TimeOfDay>,
    /// Minutes a chore must have been due before it is announced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_after_minutes: Option<u32>,
}

impl ChoreConfig {
    /// Minimal configuration with a manual completion and default reset.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, trigger: StageConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            context: None,
            trigger,
            completion: StageConfig::manual(),
            reset: None,
            state_labels: BTreeMap::new(),
            notify_at: None,
            notify_after_minutes: None,
        }
    }

    #[must_use]
    pub fn with_completion(mut self, completion: StageConfig) -> Self {
        self.completion = completion;
        self
    }

    #[must_use]
    pub fn with_reset(mut self, reset: ResetConfig) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Decode a chore definition from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ChoreError> {
        serde_json::from_value(value).map_err(|e| ChoreError::Config(e.to_string()))
    }

    /// Best-effort id of an undecodable definition, for error reporting.
    #[must_use]
    pub fn id_of(value: &serde_json::Value) -> Option<&str> {
        value.get("id").and_then(serde_json::Value::as_str)
    }
}
