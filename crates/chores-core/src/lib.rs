//! # chores-core
//!
//! The deterministic chore engine - THE LOGIC.
//!
//! A chore is a household task whose life cycle is driven by observed
//! signals: a washing machine finishing, a door opening, a daily schedule.
//! Each chore moves through `inactive -> pending -> due -> started ->
//! completed` and back, as decided by two gated stages (trigger and
//! completion) and a reset policy.
//!
//! ## Layers
//!
//! - `types` / `timer`: states, entity readings, the evaluation context
//! - `detector`: the 11 signal patterns behind one tagged union
//! - `gate` / `stage`: secondary conditions and the trigger/completion wrappers
//! - `reset`: how a completed chore returns to `inactive`
//! - `chore`: the 5-state machine
//! - `registry`: dispatch, force commands, snapshots
//! - `formats`: the persisted JSON document
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network, NO file I/O (pure Rust)
//! - Never reads the system clock: every operation receives `now`
//! - Never initiates interaction; only reacts to entity updates or polls

// =============================================================================
// MODULES
// =============================================================================

pub mod chore;
pub mod config;
pub mod detector;
pub mod formats;
pub mod gate;
pub mod registry;
pub mod reset;
pub mod stage;
pub mod timer;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ChoreError, ChoreState, CompletedBy, Context, EntityStates, ScheduleSlot, StageRole,
    StateChange, StateReader, SubState, TimeOfDay,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use chore::{Chore, ChoreStatus, HISTORY_LIMIT, Transition};
pub use config::{
    ChoreConfig, DetectorConfig, GateConfig, ResetConfig, StageConfig, ThresholdOperator,
};
pub use detector::{Detector, DetectorKind, DetectorType};
pub use gate::Gate;
pub use registry::{ChoreEvent, EventKind, LoadIssue, LoadReport, Registry};
pub use reset::ResetPolicy;
pub use stage::{CompletionStage, TriggerStage};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{ChoreSnapshot, MAX_STATE_FILE_SIZE, STORE_VERSION, StoreSnapshot};

// =============================================================================
// TEST FIXTURES
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use crate::types::{Context, EntityStates};
    use chrono::{DateTime, FixedOffset, TimeZone};

    /// Entity readings from `(entity_id, value)` pairs.
    pub fn states(pairs: &[(&str, &str)]) -> EntityStates {
        let mut states = EntityStates::new();
        for (entity_id, value) in pairs {
            let _ = states.set(entity_id, value);
        }
        states
    }

    /// A wall-clock instant at +01:00.
    pub fn at_time(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        at_time_secs(y, mo, d, h, mi, 0)
    }

    fn at_time_secs(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .and_then(|offset| offset.with_ymd_and_hms(y, mo, d, h, mi, s).single())
            .expect("valid test timestamp")
    }

    pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, states: &EntityStates) -> Context<'_> {
        Context::new(at_time(y, mo, d, h, mi), states)
    }

    pub fn at_secs(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
        s: u32,
        states: &EntityStates,
    ) -> Context<'_> {
        Context::new(at_time_secs(y, mo, d, h, mi, s), states)
    }
}
