//! Numeric detectors: `sensor_threshold` and `power_cycle`.
//!
//! Non-numeric, `unknown` and `unavailable` readings are "no signal": they
//! never complete a threshold and never count as a power drop.

use super::{DetectorBase, attr};
use crate::config::ThresholdOperator;
use crate::timer::{Timer, TimerHandle};
use crate::types::{Context, StateChange, SubState, parse_numeric};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};

// =============================================================================
// SENSOR THRESHOLD
// =============================================================================

/// Done when a numeric reading satisfies `value <op> threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorThreshold {
    pub(crate) entity_id: String,
    threshold: f64,
    operator: ThresholdOperator,
}

impl SensorThreshold {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, threshold: f64, operator: ThresholdOperator) -> Self {
        Self {
            entity_id: entity_id.into(),
            threshold,
            operator,
        }
    }

    fn apply(&self, base: &mut DetectorBase, reading: Option<&str>, ctx: &Context<'_>) -> bool {
        let Some(value) = parse_numeric(reading) else {
            return false;
        };
        if self.operator.matches(value, self.threshold) && base.state() != SubState::Done {
            return base.set(SubState::Done, ctx.utc());
        }
        false
    }

    pub(super) fn handle(
        &mut self,
        base: &mut DetectorBase,
        change: &StateChange,
        ctx: &Context<'_>,
    ) -> bool {
        self.apply(base, change.new_value(), ctx)
    }

    /// React to a reading that already satisfies the threshold.
    pub(super) fn check_immediate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        self.apply(base, ctx.state(&self.entity_id), ctx)
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        let reading = ctx.state(&self.entity_id);
        let current = match parse_numeric(reading) {
            Some(v) => Value::from(v),
            None if crate::types::is_unreadable(reading) => Value::Null,
            None => Value::from(reading.unwrap_or_default()),
        };
        attrs.insert("watched_entity".into(), Value::from(self.entity_id.clone()));
        attrs.insert("current_value".into(), current);
        attrs.insert("threshold".into(), Value::from(self.threshold));
        attrs.insert("operator".into(), Value::from(self.operator.as_str()));
    }
}

// =============================================================================
// POWER CYCLE
// =============================================================================

/// Draw rises → active; draw falls and stays low for the cooldown → done.
///
/// Either sensor above its threshold means "running". When no configured
/// sensor reports a number (offline or garbage) the state and cooldown are
/// left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerCycle {
    pub(crate) power_sensor: Option<String>,
    pub(crate) current_sensor: Option<String>,
    power_threshold: f64,
    current_threshold: f64,
    cooldown: TimeDelta,
    machine_running: bool,
    power_dropped_at: Option<DateTime<Utc>>,
    timer: Timer,
    pending: Option<TimerHandle>,
}

impl PowerCycle {
    #[must_use]
    pub fn new(
        power_sensor: Option<String>,
        current_sensor: Option<String>,
        power_threshold: f64,
        current_threshold: f64,
        cooldown: TimeDelta,
    ) -> Self {
        Self {
            power_sensor,
            current_sensor,
            power_threshold,
            current_threshold,
            cooldown,
            machine_running: false,
            power_dropped_at: None,
            timer: Timer::new(),
            pending: None,
        }
    }

    pub(super) fn watched(&self) -> impl Iterator<Item = &str> {
        self.power_sensor
            .as_deref()
            .into_iter()
            .chain(self.current_sensor.as_deref())
    }

    /// `Some(true)` if any numeric reading is above its threshold,
    /// `Some(false)` if at least one reading is numeric and none is above,
    /// `None` if no sensor reports a number.
    fn is_above(&self, ctx: &Context<'_>) -> Option<bool> {
        let sensors = [
            (self.power_sensor.as_deref(), self.power_threshold),
            (self.current_sensor.as_deref(), self.current_threshold),
        ];
        let mut any_numeric = false;
        let mut above = false;
        for (entity_id, threshold) in sensors {
            let Some(value) = entity_id.and_then(|id| parse_numeric(ctx.state(id))) else {
                continue;
            };
            any_numeric = true;
            above |= value > threshold;
        }
        any_numeric.then_some(above)
    }

    fn cancel_cooldown(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timer.cancel(handle);
        }
        self.power_dropped_at = None;
    }

    fn arm_cooldown(&mut self, dropped_at: DateTime<Utc>) {
        self.power_dropped_at = Some(dropped_at);
        self.pending = Some(self.timer.schedule(dropped_at, self.cooldown));
    }

    /// Re-read both sensors. Every change on a watched sensor notifies.
    pub(super) fn handle(
        &mut self,
        base: &mut DetectorBase,
        _change: &StateChange,
        ctx: &Context<'_>,
    ) -> bool {
        match self.is_above(ctx) {
            Some(true) => {
                self.machine_running = true;
                self.cancel_cooldown();
                if base.state() == SubState::Idle {
                    base.set(SubState::Active, ctx.utc());
                }
            }
            Some(false) => {
                if self.machine_running && self.power_dropped_at.is_none() {
                    self.arm_cooldown(ctx.utc());
                }
            }
            None => {}
        }
        true
    }

    /// Complete the cycle once the cooldown has run out.
    pub(super) fn evaluate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        let now = ctx.utc();
        if base.state() != SubState::Active || self.power_dropped_at.is_none() {
            return false;
        }
        if !self.timer.take_expired(now) {
            return false;
        }
        self.pending = None;
        self.machine_running = false;
        base.set(SubState::Done, now)
    }

    pub(super) fn reset_internal(&mut self) {
        self.cancel_cooldown();
        self.machine_running = false;
    }

    pub(super) fn next_deadline(&self, base: &DetectorBase) -> Option<DateTime<Utc>> {
        if base.state() == SubState::Active {
            self.timer.deadline()
        } else {
            None
        }
    }

    pub(super) fn machine_running(&self) -> bool {
        self.machine_running
    }

    pub(super) fn power_dropped_at(&self) -> Option<DateTime<Utc>> {
        self.power_dropped_at
    }

    /// Re-derive the cooldown timer from the persisted drop timestamp.
    pub(super) fn restore(&mut self, machine_running: bool, dropped_at: Option<DateTime<Utc>>) {
        self.cancel_cooldown();
        self.machine_running = machine_running;
        if let Some(dropped) = dropped_at {
            self.arm_cooldown(dropped);
        }
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        let watched = self.watched().next().unwrap_or("N/A");
        attrs.insert("watched_entity".into(), Value::from(watched));
        attrs.insert("machine_running".into(), Value::from(self.machine_running));
        if let Some(power) = &self.power_sensor {
            attrs.insert("power_value".into(), attr::reading(ctx, power));
        }
        if let Some(current) = &self.current_sensor {
            attrs.insert("current_value".into(), attr::reading(ctx, current));
        }
        if let Some(deadline) = self.timer.deadline() {
            let remaining = (deadline - ctx.utc()).num_seconds().max(0);
            attrs.insert("cooldown_remaining_seconds".into(), Value::from(remaining));
        }
    }
}
