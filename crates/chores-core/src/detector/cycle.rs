//! Two-step cycle detectors: `contact_cycle` and `presence_cycle`.
//!
//! Both go `idle → active → done` and ignore transitions whose previous
//! reading carried no signal, so a reconnecting sensor never counts as a
//! real cycle.

use super::event::{STATE_OFF, STATE_ON};
use super::{DetectorBase, attr};
use crate::timer::{Timer, TimerHandle};
use crate::types::{Context, StateChange, SubState};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};

// =============================================================================
// CONTACT CYCLE
// =============================================================================

/// Open (debounced) → active, close → done.
///
/// An open only counts once the contact has stayed open for the debounce
/// window; closing it earlier cancels the pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactCycle {
    pub(crate) entity_id: String,
    debounce: TimeDelta,
    timer: Timer,
    pending: Option<TimerHandle>,
    opened_at: Option<DateTime<Utc>>,
}

impl ContactCycle {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, debounce: TimeDelta) -> Self {
        Self {
            entity_id: entity_id.into(),
            debounce,
            timer: Timer::new(),
            pending: None,
            opened_at: None,
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timer.cancel(handle);
        }
        self.opened_at = None;
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
        if change.is_from_unreadable() {
            return false;
        }

        match (new, base.state()) {
            (STATE_ON, SubState::Idle) => {
                self.cancel_pending();
                let now = ctx.utc();
                self.pending = Some(self.timer.schedule(now, self.debounce));
                self.opened_at = Some(now);
                false
            }
            (STATE_OFF, SubState::Idle) if self.pending.is_some() => {
                self.cancel_pending();
                false
            }
            (STATE_OFF, SubState::Active) => base.set(SubState::Done, ctx.utc()),
            _ => false,
        }
    }

    /// Confirm a debounced open once the window has elapsed.
    pub(super) fn evaluate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        let now = ctx.utc();
        if !self.timer.take_expired(now) {
            return false;
        }
        self.pending = None;
        self.opened_at = None;
        base.state() == SubState::Idle && base.set(SubState::Active, now)
    }

    pub(super) fn reset_internal(&mut self) {
        self.cancel_pending();
    }

    pub(super) fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timer.deadline()
    }

    pub(super) fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Re-arm the debounce window from a persisted open timestamp.
    pub(super) fn restore(&mut self, base: &DetectorBase, opened_at: Option<DateTime<Utc>>) {
        self.cancel_pending();
        if let Some(opened) = opened_at
            && base.state() == SubState::Idle
        {
            self.pending = Some(self.timer.schedule(opened, self.debounce));
            self.opened_at = Some(opened);
        }
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
        attrs.insert(
            "debounce_seconds".into(),
            Value::from(self.debounce.num_seconds()),
        );
        attrs.insert(
            "debounce_pending".into(),
            Value::from(self.timer.is_pending()),
        );
    }
}

// =============================================================================
// PRESENCE CYCLE
// =============================================================================

/// Leave → active, return → done.
///
/// People and device trackers report `not_home`/`home`; any other entity is
/// treated as a binary sensor reporting `off`/`on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceCycle {
    pub(crate) entity_id: String,
    away: &'static str,
    home: &'static str,
}

impl PresenceCycle {
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let tracker =
            entity_id.starts_with("person.") || entity_id.starts_with("device_tracker.");
        let (away, home) = if tracker {
            ("not_home", "home")
        } else {
            (STATE_OFF, STATE_ON)
        };
        Self {
            entity_id,
            away,
            home,
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
        if change.is_from_unreadable() {
            return false;
        }

        if new == self.away && base.state() == SubState::Idle {
            return base.set(SubState::Active, ctx.utc());
        }
        if new == self.home && base.state() == SubState::Active {
            return base.set(SubState::Done, ctx.utc());
        }
        false
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attr::watched(attrs, &self.entity_id, ctx);
        attrs.insert("away_state".into(), Value::from(self.away));
        attrs.insert("home_state".into(), Value::from(self.home));
    }
}
