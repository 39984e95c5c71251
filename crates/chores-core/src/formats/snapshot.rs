//! # Snapshot Format
//!
//! JSON documents persisted between runs. Every field is optional on the way
//! in: a snapshot written by an older build, or one missing keys, restores to
//! defaults for whatever it lacks.
//!
//! The store document is
//!
//! ```json
//! { "version": 2, "chores": { "<chore id>": { "chore_state": "due", ... } } }
//! ```
//!
//! Chore entries are kept as raw JSON so that one corrupt entry can be
//! discarded without losing the rest of the file.

use crate::types::{ChoreError, ChoreState, CompletedBy, SubState};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current store document version.
pub const STORE_VERSION: u32 = 2;

/// Upper bound on a state file accepted by [`StoreSnapshot::from_json`].
pub const MAX_STATE_FILE_SIZE: usize = 16 * 1024 * 1024;

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// DETECTOR / STAGE
// =============================================================================

/// Persisted detector fields. Variant-specific fields are absent when unused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSnapshot {
    pub state: SubState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_entered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "is_false")]
    pub machine_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_dropped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

/// Persisted stage: the detector's fields plus stage policy.
///
/// `steps_done` and `enabled` are only written for completion stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    #[serde(flatten)]
    pub detector: DetectorSnapshot,
    #[serde(default)]
    pub gate_holding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_done: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

// =============================================================================
// CHORE
// =============================================================================

/// One entry of the bounded completion history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_at: DateTime<Utc>,
    pub completed_by: CompletedBy,
}

/// Everything needed to resume a chore after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreSnapshot {
    pub chore_state: ChoreState,
    pub state_entered_at: Option<DateTime<Utc>>,
    pub due_since: Option<DateTime<Utc>>,
    pub last_completed: Option<DateTime<Utc>>,
    pub forced: bool,
    pub trigger: StageSnapshot,
    pub completion: StageSnapshot,
    pub completion_history: Vec<CompletionRecord>,
}

// =============================================================================
// STORE
// =============================================================================

fn store_version() -> u32 {
    STORE_VERSION
}

/// The whole persisted document: one raw snapshot per chore id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default = "store_version")]
    pub version: u32,
    #[serde(default)]
    pub chores: BTreeMap<String, serde_json::Value>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            chores: BTreeMap::new(),
        }
    }
}

impl StoreSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store document, rejecting oversized input and newer versions.
    pub fn from_json(text: &str) -> Result<Self, ChoreError> {
        if text.len() > MAX_STATE_FILE_SIZE {
            return Err(ChoreError::SerializationError(format!(
                "state file is {} bytes, maximum is {MAX_STATE_FILE_SIZE}",
                text.len()
            )));
        }
        let store: StoreSnapshot = serde_json::from_str(text)
            .map_err(|e| ChoreError::SerializationError(e.to_string()))?;
        if store.version > STORE_VERSION {
            return Err(ChoreError::SerializationError(format!(
                "unsupported state file version {} (expected at most {STORE_VERSION})",
                store.version
            )));
        }
        Ok(store)
    }

    /// Pretty-printed document, ready to write.
    pub fn to_json(&self) -> Result<String, ChoreError> {
        serde_json::to_string_pretty(self).map_err(|e| ChoreError::SerializationError(e.to_string()))
    }

    pub fn insert(&mut self, chore_id: &str, snapshot: &ChoreSnapshot) -> Result<(), ChoreError> {
        let value = serde_json::to_value(snapshot)
            .map_err(|e| ChoreError::SerializationError(e.to_string()))?;
        self.chores.insert(chore_id.to_string(), value);
        Ok(())
    }

    /// Decode the snapshot stored for `chore_id`, if any.
    #[must_use]
    pub fn get(&self, chore_id: &str) -> Option<Result<ChoreSnapshot, ChoreError>> {
        self.chores.get(chore_id).map(|raw| {
            ChoreSnapshot::deserialize(raw)
                .map_err(|e| ChoreError::SerializationError(format!("chore '{chore_id}': {e}")))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chores.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_restore_to_defaults() {
        let snap: ChoreSnapshot = serde_json::from_value(json!({
            "chore_state": "due",
            "trigger": {"state": "done"}
        }))
        .expect("decode");

        assert_eq!(snap.chore_state, ChoreState::Due);
        assert_eq!(snap.trigger.detector.state, SubState::Done);
        assert!(!snap.trigger.gate_holding);
        assert_eq!(snap.completion, StageSnapshot::default());
        assert!(snap.completion_history.is_empty());
    }

    #[test]
    fn stage_fields_flatten_alongside_detector() {
        let stage = StageSnapshot {
            detector: DetectorSnapshot {
                state: SubState::Active,
                machine_running: true,
                ..DetectorSnapshot::default()
            },
            gate_holding: true,
            steps_done: Some(1),
            enabled: Some(true),
        };
        let value = serde_json::to_value(&stage).expect("encode");
        assert_eq!(value["state"], "active");
        assert_eq!(value["machine_running"], true);
        assert_eq!(value["steps_done"], 1);
        assert!(value.get("opened_at").is_none());
    }

    #[test]
    fn corrupt_entry_is_isolated() {
        let store = StoreSnapshot::from_json(
            r#"{"version": 2, "chores": {
                "good": {"chore_state": "completed"},
                "bad": {"chore_state": "exploded"}
            }}"#,
        )
        .expect("store decodes");

        let good = store.get("good").expect("present").expect("valid");
        assert_eq!(good.chore_state, ChoreState::Completed);
        assert!(matches!(
            store.get("bad"),
            Some(Err(ChoreError::SerializationError(_)))
        ));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn rejects_garbage_and_future_versions() {
        assert!(StoreSnapshot::from_json("not json").is_err());
        assert!(StoreSnapshot::from_json(r#"{"version": 99, "chores": {}}"#).is_err());

        let store = StoreSnapshot::from_json("{}").expect("empty object");
        assert_eq!(store.version, STORE_VERSION);
        assert!(store.is_empty());
    }

    #[test]
    fn insert_then_reload() {
        let mut store = StoreSnapshot::new();
        let snap = ChoreSnapshot {
            chore_state: ChoreState::Started,
            forced: true,
            ..ChoreSnapshot::default()
        };
        store.insert("laundry", &snap).expect("insert");

        let text = store.to_json().expect("encode");
        let reloaded = StoreSnapshot::from_json(&text).expect("decode");
        match reloaded.get("laundry") {
            Some(Ok(restored)) => assert_eq!(restored, snap),
            other => panic!("unexpected {other:?}"),
        }
    }
}
