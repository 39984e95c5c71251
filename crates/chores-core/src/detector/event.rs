//! Single-event detectors: `sensor_state`, `contact` and `state_change`.
//!
//! None of them track time. They react to one qualifying transition and hold
//! their state until reset.

use super::{DetectorBase, attr};
use crate::types::{Context, StateChange, SubState};
use serde_json::{Map, Value};

/// Reading of an open contact / active binary sensor.
pub const STATE_ON: &str = "on";

/// Reading of a closed contact / inactive binary sensor.
pub const STATE_OFF: &str = "off";

// =============================================================================
// SENSOR STATE
// =============================================================================

/// Done as soon as the watched entity reports the target value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorState {
    pub(crate) entity_id: String,
    target: String,
}

impl SensorState {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            target: target.into(),
        }
    }

    pub(super) fn handle(
        &mut self,
        base: &mut DetectorBase,
        change: &StateChange,
        ctx: &Context<'_>,
    ) -> bool {
        if change.new_value() == Some(self.target.as_str()) && base.state() != SubState::Done {
            return base.set(SubState::Done, ctx.utc());
        }
        false
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
        attrs.insert("target_state".into(), Value::from(self.target.clone()));
    }
}

// =============================================================================
// CONTACT
// =============================================================================

/// Done as soon as the watched contact opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub(crate) entity_id: String,
}

impl Contact {
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
        }
    }

    pub(super) fn handle(
        &mut self,
        base: &mut DetectorBase,
        change: &StateChange,
        ctx: &Context<'_>,
    ) -> bool {
        if change.new_value() == Some(STATE_ON) && base.state() != SubState::Done {
            return base.set(SubState::Done, ctx.utc());
        }
        false
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
    }
}

// =============================================================================
// STATE CHANGE
// =============================================================================

/// Active on entering `from`, done on a direct `from → to` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeDetector {
    pub(crate) entity_id: String,
    from: String,
    to: String,
}

impl StateChangeDetector {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub(super) fn handle(
        &mut self,
        base: &mut DetectorBase,
        change: &StateChange,
        ctx: &Context<'_>,
    ) -> bool {
        let Some(new) = change.new_value() else {
            return false;
        };

        if new == self.from && base.state() == SubState::Idle {
            return base.set(SubState::Active, ctx.utc());
        }
        if change.old() == Some(self.from.as_str())
            && new == self.to
            && matches!(base.state(), SubState::Idle | SubState::Active)
        {
            return base.set(SubState::Done, ctx.utc());
        }
        false
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
        attrs.insert("expected_from".into(), Value::from(self.from.clone()));
        attrs.insert("expected_to".into(), Value::from(self.to.clone()));
    }
}
