//! `duration`: an entity must stay in a target value for a configured time.

use super::{DetectorBase, attr};
use crate::types::{Context, StateChange, SubState, is_unreadable};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};

/// Entering the target → active; staying there for `duration` → done.
///
/// Transitions through unreadable values and attribute-only updates
/// (`old == new`) never touch the running window. Leaving the target for a
/// readable value before the window elapses drops back to idle.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationDetector {
    pub(crate) entity_id: String,
    target: String,
    duration_hours: f64,
    duration: TimeDelta,
    state_since: Option<DateTime<Utc>>,
}

impl DurationDetector {
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        target: impl Into<String>,
        duration_hours: f64,
        duration: TimeDelta,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            target: target.into(),
            duration_hours,
            duration,
            state_since: None,
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
        if change.is_from_unreadable() || is_unreadable(Some(new)) || change.old() == Some(new) {
            return false;
        }

        let now = ctx.utc();
        let on_target = new == self.target;
        match base.state() {
            SubState::Idle if on_target => {
                self.state_since = Some(now);
                base.set(SubState::Active, now)
            }
            SubState::Active if !on_target => {
                self.state_since = None;
                base.set(SubState::Idle, now)
            }
            _ => false,
        }
    }

    /// Pick up a target value that was already present, then check elapsed time.
    pub(super) fn evaluate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        let now = ctx.utc();
        let reading = ctx.state(&self.entity_id);
        let mut changed = false;

        if base.state() == SubState::Idle && reading == Some(self.target.as_str()) {
            self.state_since = Some(self.state_since.unwrap_or(now));
            changed |= base.set(SubState::Active, now);
        }

        if base.state() == SubState::Active
            && let Some(since) = self.state_since
        {
            if !is_unreadable(reading) && reading != Some(self.target.as_str()) {
                self.state_since = None;
                changed |= base.set(SubState::Idle, now);
            } else if now - since >= self.duration {
                changed |= base.set(SubState::Done, now);
            }
        }
        changed
    }

    pub(super) fn reset_internal(&mut self) {
        self.state_since = None;
    }

    pub(super) fn next_deadline(&self, base: &DetectorBase) -> Option<DateTime<Utc>> {
        match (base.state(), self.state_since) {
            (SubState::Active, Some(since)) => since.checked_add_signed(self.duration),
            _ => None,
        }
    }

    pub(super) fn state_since(&self) -> Option<DateTime<Utc>> {
        self.state_since
    }

    pub(super) fn restore(&mut self, state_since: Option<DateTime<Utc>>) {
        self.state_since = state_since;
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
        attrs.insert("target_state".into(), Value::from(self.target.clone()));
        attrs.insert("duration_hours".into(), Value::from(self.duration_hours));
        if let Some(since) = self.state_since {
            let remaining = (self.duration - (ctx.utc() - since)).num_seconds().max(0);
            attrs.insert("state_since".into(), Value::from(since.to_rfc3339()));
            attrs.insert("time_remaining_seconds".into(), Value::from(remaining));
        }
    }
}
