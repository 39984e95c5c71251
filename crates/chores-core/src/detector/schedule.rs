//! Wall-clock detectors: `daily` and `weekly`. Trigger-only.
//!
//! Both jump straight from `idle` to `done` once today's slot has passed and
//! they have not fired yet today. A process that starts after the slot still
//! fires on its first evaluation.

use super::DetectorBase;
use crate::types::{
    Context, ScheduleSlot, SubState, TimeOfDay, next_daily_after, next_weekly_after,
};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta, Utc};
use serde_json::{Map, Value};

/// Fire `base` at `slot` unless it already fired on `slot`'s local date.
fn fire_if_due(
    base: &mut DetectorBase,
    last_fired_on: &mut Option<NaiveDate>,
    slot: Option<DateTime<FixedOffset>>,
    ctx: &Context<'_>,
) -> bool {
    let Some(slot) = slot else {
        return false;
    };
    let today = ctx.now.date_naive();
    if base.state() != SubState::Idle || *last_fired_on == Some(today) || ctx.now < slot {
        return false;
    }
    *last_fired_on = Some(today);
    base.set(SubState::Done, ctx.utc())
}

// =============================================================================
// DAILY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Daily {
    time: TimeOfDay,
    last_fired_on: Option<NaiveDate>,
}

impl Daily {
    #[must_use]
    pub fn new(time: TimeOfDay) -> Self {
        Self {
            time,
            last_fired_on: None,
        }
    }

    #[must_use]
    pub fn time(&self) -> TimeOfDay {
        self.time
    }

    pub(super) fn evaluate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        let slot = self.time.same_day_as(ctx.now);
        fire_if_due(base, &mut self.last_fired_on, Some(slot), ctx)
    }

    /// Next scheduled occurrence strictly after `now`.
    #[must_use]
    pub fn next_trigger(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        next_daily_after(now, self.time)
    }

    /// The instant the next evaluation can fire, possibly already past.
    pub(super) fn next_deadline(
        &self,
        base: &DetectorBase,
        ctx: &Context<'_>,
    ) -> Option<DateTime<Utc>> {
        if base.state() != SubState::Idle {
            return None;
        }
        let today = self.time.same_day_as(ctx.now);
        let deadline = if self.last_fired_on == Some(ctx.now.date_naive()) {
            today + TimeDelta::days(1)
        } else {
            today
        };
        Some(deadline.with_timezone(&Utc))
    }

    pub(super) fn last_fired_on(&self) -> Option<NaiveDate> {
        self.last_fired_on
    }

    pub(super) fn restore(&mut self, last_fired_on: Option<NaiveDate>) {
        self.last_fired_on = last_fired_on;
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        attrs.insert("trigger_time".into(), Value::from(self.time.to_string()));
        attrs.insert(
            "next_trigger".into(),
            Value::from(self.next_trigger(ctx.now).to_rfc3339()),
        );
    }
}

// =============================================================================
// WEEKLY
// =============================================================================

/// Fires on each matching weekday. Only the first slot for a given weekday is
/// considered "today's" slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weekly {
    schedule: Vec<ScheduleSlot>,
    last_fired_on: Option<NaiveDate>,
}

impl Weekly {
    #[must_use]
    pub fn new(schedule: Vec<ScheduleSlot>) -> Self {
        Self {
            schedule,
            last_fired_on: None,
        }
    }

    #[must_use]
    pub fn schedule(&self) -> &[ScheduleSlot] {
        &self.schedule
    }

    fn todays_slot(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.schedule
            .iter()
            .find(|slot| slot.day == now.weekday())
            .map(|slot| slot.time.same_day_as(now))
    }

    pub(super) fn evaluate(&mut self, base: &mut DetectorBase, ctx: &Context<'_>) -> bool {
        let slot = self.todays_slot(ctx.now);
        fire_if_due(base, &mut self.last_fired_on, slot, ctx)
    }

    #[must_use]
    pub fn next_trigger(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        next_weekly_after(now, &self.schedule)
    }

    pub(super) fn next_deadline(
        &self,
        base: &DetectorBase,
        ctx: &Context<'_>,
    ) -> Option<DateTime<Utc>> {
        if base.state() != SubState::Idle {
            return None;
        }
        let pending_today = self
            .todays_slot(ctx.now)
            .filter(|_| self.last_fired_on != Some(ctx.now.date_naive()));
        pending_today
            .or_else(|| self.next_trigger(ctx.now))
            .map(|t| t.with_timezone(&Utc))
    }

    pub(super) fn last_fired_on(&self) -> Option<NaiveDate> {
        self.last_fired_on
    }

    pub(super) fn restore(&mut self, last_fired_on: Option<NaiveDate>) {
        self.last_fired_on = last_fired_on;
    }

    pub(super) fn attributes(&self, ctx: &Context<'_>, attrs: &mut Map<String, Value>) {
        let schedule: Vec<Value> = self
            .schedule
            .iter()
            .map(|slot| Value::from(format!("{} {}", slot.day_name(), slot.time)))
            .collect();
        attrs.insert("schedule".into(), Value::Array(schedule));
        if let Some(next) = self.next_trigger(ctx.now) {
            attrs.insert("next_trigger".into(), Value::from(next.to_rfc3339()));
        }
    }
}
