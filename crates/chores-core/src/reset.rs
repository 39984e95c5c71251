//! # Reset Policies
//!
//! A reset policy decides when a completed chore goes back to `inactive`.
//! Policies are pure: they only look at the instant the chore was completed
//! and the current time.
//!
//! Without an explicit `reset` entry, the policy follows the trigger:
//!
//! | Trigger | Policy |
//! |---------|--------|
//! | `daily` | `implicit_daily` at the trigger time |
//! | `weekly` | `implicit_weekly` on the trigger schedule |
//! | anything else | `implicit_event` (immediately) |

use crate::config::{DetectorConfig, ResetConfig};
use crate::types::{
    ChoreError, MAX_SPAN_DAYS, ScheduleSlot, TimeOfDay, next_daily_after, next_weekly_after,
    span_minutes,
};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetPolicy {
    /// `minutes <= 0` resets immediately.
    Delay { minutes: i64 },
    DailyReset { time: TimeOfDay },
    ImplicitDaily { time: TimeOfDay },
    ImplicitWeekly { schedule: Vec<ScheduleSlot> },
    ImplicitEvent,
}

impl ResetPolicy {
    /// The configured policy, or the default for `trigger`.
    ///
    /// A delay longer than [`MAX_SPAN_DAYS`] is a configuration error.
    pub fn from_config(
        reset: Option<&ResetConfig>,
        trigger: &DetectorConfig,
    ) -> Result<Self, ChoreError> {
        let policy = match (reset, trigger) {
            (Some(ResetConfig::Delay { minutes }), _) => {
                if *minutes > 0 && Self::delay_span(*minutes).is_none() {
                    return Err(ChoreError::config(format!(
                        "reset minutes out of range: {minutes} (limit {MAX_SPAN_DAYS} days)"
                    )));
                }
                ResetPolicy::Delay { minutes: *minutes }
            }
            (Some(ResetConfig::DailyReset { time }), _) => ResetPolicy::DailyReset { time: *time },
            (None, DetectorConfig::Daily { time }) => ResetPolicy::ImplicitDaily { time: *time },
            (None, DetectorConfig::Weekly { schedule }) => ResetPolicy::ImplicitWeekly {
                schedule: schedule.clone(),
            },
            (None, _) => ResetPolicy::ImplicitEvent,
        };
        Ok(policy)
    }

    fn delay_span(minutes: i64) -> Option<TimeDelta> {
        u64::try_from(minutes).ok().and_then(span_minutes)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPolicy::Delay { .. } => "delay",
            ResetPolicy::DailyReset { .. } => "daily_reset",
            ResetPolicy::ImplicitDaily { .. } => "implicit_daily",
            ResetPolicy::ImplicitWeekly { .. } => "implicit_weekly",
            ResetPolicy::ImplicitEvent => "implicit_event",
        }
    }

    /// Next wall-clock reset strictly after `after`, for scheduled policies.
    fn next_occurrence_after(&self, after: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        match self {
            ResetPolicy::DailyReset { time } | ResetPolicy::ImplicitDaily { time } => {
                Some(next_daily_after(after, *time))
            }
            ResetPolicy::ImplicitWeekly { schedule } => Some(
                next_weekly_after(after, schedule).unwrap_or(after + TimeDelta::days(1)),
            ),
            ResetPolicy::Delay { .. } | ResetPolicy::ImplicitEvent => None,
        }
    }

    /// Whether a chore completed at `completed_at` should reset at `now`.
    #[must_use]
    pub fn should_reset(&self, completed_at: DateTime<Utc>, now: DateTime<FixedOffset>) -> bool {
        match self {
            ResetPolicy::ImplicitEvent => true,
            ResetPolicy::Delay { minutes } if *minutes <= 0 => true,
            ResetPolicy::Delay { minutes } => Self::delay_span(*minutes)
                .is_some_and(|delay| now.with_timezone(&Utc) - completed_at >= delay),
            _ => self
                .next_reset_at(completed_at, now)
                .is_some_and(|reset_at| now >= reset_at),
        }
    }

    /// When a chore completed at `completed_at` will reset, in `now`'s offset.
    ///
    /// `None` for policies that reset immediately.
    #[must_use]
    pub fn next_reset_at(
        &self,
        completed_at: DateTime<Utc>,
        now: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let completed_local = completed_at.with_timezone(now.offset());
        match self {
            ResetPolicy::Delay { minutes } if *minutes > 0 => Self::delay_span(*minutes)
                .and_then(|delay| completed_local.checked_add_signed(delay)),
            _ => self.next_occurrence_after(completed_local),
        }
    }

    /// Next reset window regardless of completion, for scheduled policies.
    #[must_use]
    pub fn next_scheduled_reset(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.next_occurrence_after(now)
    }

    /// `completed_at` is `None` while the chore is not completed.
    #[must_use]
    pub fn attributes(
        &self,
        completed_at: Option<DateTime<Utc>>,
        now: DateTime<FixedOffset>,
    ) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("reset_type".into(), Value::from(self.as_str()));

        let next = match completed_at {
            Some(completed) => self.next_reset_at(completed, now),
            None => self.next_scheduled_reset(now),
        };
        attrs.insert(
            "next_reset_at".into(),
            next.map_or(Value::Null, |t| Value::from(t.to_rfc3339())),
        );
        attrs.insert(
            "seconds_remaining".into(),
            next.map_or(Value::Null, |t| Value::from((t - now).num_seconds().max(0))),
        );

        match self {
            ResetPolicy::Delay { minutes } => {
                attrs.insert("delay_minutes".into(), Value::from(*minutes));
            }
            ResetPolicy::DailyReset { time } => {
                attrs.insert("reset_time".into(), Value::from(time.to_string()));
            }
            ResetPolicy::ImplicitDaily { time } => {
                attrs.insert("trigger_time".into(), Value::from(time.to_string()));
            }
            ResetPolicy::ImplicitWeekly { schedule } => {
                attrs.insert("schedule_entries".into(), Value::from(schedule.len()));
            }
            ResetPolicy::ImplicitEvent => {}
        }
        attrs
    }
}
