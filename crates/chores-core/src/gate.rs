//! # Gates
//!
//! A gate is a secondary condition attached to a stage: "the detector is
//! done, but only count it once `entity_id` reads `expected`". Gates hold no
//! state of their own; the current reading always comes from the context.

use crate::config::GateConfig;
use crate::types::{Context, StateChange};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    entity_id: String,
    expected: String,
}

impl Gate {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            expected: expected.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.entity_id, &config.state)
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Whether the gate entity currently reads the expected value.
    #[must_use]
    pub fn is_met(&self, ctx: &Context<'_>) -> bool {
        ctx.state(&self.entity_id) == Some(self.expected.as_str())
    }

    /// Whether `change` just satisfied this gate.
    ///
    /// Transitions out of an unreadable value are startup or reconnect noise
    /// and never count.
    #[must_use]
    pub fn opened_by(&self, change: &StateChange) -> bool {
        change.entity_id == self.entity_id
            && !change.is_from_unreadable()
            && change.new_value() == Some(self.expected.as_str())
    }

    pub fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attrs.insert("gate_entity".into(), Value::from(self.entity_id.clone()));
        attrs.insert(
            "gate_expected_state".into(),
            Value::from(self.expected.clone()),
        );
        attrs.insert(
            "gate_current_state".into(),
            ctx.state(&self.entity_id)
                .map_or(Value::Null, Value::from),
        );
        attrs.insert("gate_met".into(), Value::from(self.is_met(ctx)));
    }
}
