//! # Wall-Clock Helpers
//!
//! Time-of-day and weekday arithmetic for daily/weekly detectors and the
//! scheduled reset policies. All functions are pure: the caller supplies the
//! reference instant, and results are in the same offset as that instant.

use super::ChoreError;
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Timelike, Weekday,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// TIME OF DAY
// =============================================================================

/// A minute-resolution wall-clock time, written `HH:MM` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Midnight, the default for `daily_reset`.
    #[must_use]
    pub fn midnight() -> Self {
        TimeOfDay(NaiveTime::default())
    }

    pub fn new(hour: u32, minute: u32) -> Result<Self, ChoreError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(TimeOfDay)
            .ok_or_else(|| ChoreError::config(format!("invalid time {hour:02}:{minute:02}")))
    }

    /// Parse `HH:MM` (a trailing `:SS` is accepted and ignored).
    pub fn parse(raw: &str) -> Result<Self, ChoreError> {
        let mut parts = raw.trim().split(':');
        let hour = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minute = parts.next().and_then(|p| p.parse::<u32>().ok());
        let seconds_ok = parts
            .next()
            .map(|p| p.parse::<u32>().is_ok())
            .unwrap_or(true);
        match (hour, minute, seconds_ok, parts.next()) {
            (Some(h), Some(m), true, None) => Self::new(h, m),
            _ => Err(ChoreError::config(format!(
                "invalid time '{raw}', expected HH:MM"
            ))),
        }
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    #[must_use]
    pub fn naive(&self) -> NaiveTime {
        self.0
    }

    /// This time on `date`, in `offset`.
    #[must_use]
    pub fn on(&self, date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
        let local = date.and_time(self.0);
        let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, offset)
    }

    /// This time on the same local date as `reference`.
    #[must_use]
    pub fn same_day_as(&self, reference: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.on(reference.date_naive(), *reference.offset())
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ChoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

// =============================================================================
// WEEKDAYS
// =============================================================================

/// Parse a three-letter weekday (`mon` .. `sun`, case-insensitive).
pub fn parse_weekday(raw: &str) -> Result<Weekday, ChoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        other => Err(ChoreError::config(format!(
            "invalid weekday '{other}', expected one of mon, tue, wed, thu, fri, sat, sun"
        ))),
    }
}

fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// One `(weekday, time)` entry of a weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlot", into = "RawSlot")]
pub struct ScheduleSlot {
    pub day: Weekday,
    pub time: TimeOfDay,
}

#[derive(Serialize, Deserialize)]
struct RawSlot {
    day: String,
    time: TimeOfDay,
}

impl TryFrom<RawSlot> for ScheduleSlot {
    type Error = ChoreError;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        Ok(ScheduleSlot {
            day: parse_weekday(&raw.day)?,
            time: raw.time,
        })
    }
}

impl From<ScheduleSlot> for RawSlot {
    fn from(slot: ScheduleSlot) -> Self {
        RawSlot {
            day: weekday_key(slot.day).to_string(),
            time: slot.time,
        }
    }
}

impl ScheduleSlot {
    #[must_use]
    pub fn day_name(&self) -> &'static str {
        weekday_key(self.day)
    }
}

// =============================================================================
// SPANS
// =============================================================================

/// Longest configurable window (debounce, cooldown, duration, reset delay).
pub const MAX_SPAN_DAYS: i64 = 3650;

const MAX_SPAN_SECS: i64 = MAX_SPAN_DAYS * 86_400;

/// A whole number of seconds as a `TimeDelta`.
///
/// `None` past [`MAX_SPAN_DAYS`].
#[must_use]
pub fn span_seconds(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs)
        .ok()
        .filter(|secs| *secs <= MAX_SPAN_SECS)
        .and_then(TimeDelta::try_seconds)
}

/// A whole number of minutes as a `TimeDelta`.
///
/// `None` past [`MAX_SPAN_DAYS`].
#[must_use]
pub fn span_minutes(minutes: u64) -> Option<TimeDelta> {
    minutes.checked_mul(60).and_then(span_seconds)
}

/// A fractional number of hours as a `TimeDelta`.
///
/// Negative, non-finite or out-of-range inputs yield `None`.
#[must_use]
pub fn span_hours(hours: f64) -> Option<TimeDelta> {
    let secs = Duration::try_from_secs_f64(hours * 3600.0).ok()?;
    TimeDelta::from_std(secs)
        .ok()
        .filter(|span| span.num_seconds() <= MAX_SPAN_SECS)
}

// =============================================================================
// NEXT OCCURRENCE
// =============================================================================

/// Next occurrence of `time` strictly after `after`.
///
/// The candidate is `time` on the local date of `after`; if `after` is at or
/// past it, the candidate moves to the following day.
#[must_use]
pub fn next_daily_after(after: DateTime<FixedOffset>, time: TimeOfDay) -> DateTime<FixedOffset> {
    let candidate = time.same_day_as(after);
    if after >= candidate {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

/// Earliest schedule entry strictly after `after`, wrapping into next week.
///
/// Returns `None` only for an empty schedule.
#[must_use]
pub fn next_weekly_after(
    after: DateTime<FixedOffset>,
    schedule: &[ScheduleSlot],
) -> Option<DateTime<FixedOffset>> {
    let today = after.weekday().num_days_from_monday() as i64;
    schedule
        .iter()
        .map(|slot| {
            let days_ahead = (slot.day.num_days_from_monday() as i64 - today).rem_euclid(7);
            let candidate = slot.time.same_day_as(after) + TimeDelta::days(days_ahead);
            if candidate <= after {
                candidate + TimeDelta::days(7)
            } else {
                candidate
            }
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .expect("offset")
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn parse_time_of_day() {
        let t = TimeOfDay::parse("06:30").expect("parse");
        assert_eq!((t.hour(), t.minute()), (6, 30));
        assert_eq!(TimeOfDay::parse("7:05:00").expect("parse").to_string(), "07:05");
        assert!(TimeOfDay::parse("25:00").is_err());
        assert!(TimeOfDay::parse("noon").is_err());
        assert!(TimeOfDay::parse("06").is_err());
    }

    #[test]
    fn time_of_day_serde_round_trip() {
        let t: TimeOfDay = serde_json::from_str("\"18:00\"").expect("deserialize");
        assert_eq!(serde_json::to_string(&t).expect("serialize"), "\"18:00\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"xx\"").is_err());
    }

    #[test]
    fn spans() {
        assert_eq!(span_seconds(2), Some(TimeDelta::seconds(2)));
        assert_eq!(span_minutes(5), Some(TimeDelta::minutes(5)));
        assert_eq!(span_hours(1.5), Some(TimeDelta::minutes(90)));
        assert_eq!(span_hours(-1.0), None);
        assert_eq!(span_hours(f64::NAN), None);
    }

    #[test]
    fn spans_reject_out_of_range() {
        assert_eq!(span_seconds(u64::MAX), None);
        assert_eq!(span_minutes(u64::MAX), None);
        assert_eq!(span_hours(1e300), None);
        assert_eq!(span_hours(f64::INFINITY), None);
        let limit = u64::try_from(MAX_SPAN_DAYS * 24 * 60).expect("positive");
        assert_eq!(span_minutes(limit), Some(TimeDelta::days(MAX_SPAN_DAYS)));
        assert_eq!(span_minutes(limit + 1), None);
    }

    #[test]
    fn weekday_parsing() {
        assert_eq!(parse_weekday("wed").expect("parse"), Weekday::Wed);
        assert_eq!(parse_weekday("FRI").expect("parse"), Weekday::Fri);
        assert!(parse_weekday("funday").is_err());
    }

    #[test]
    fn next_daily_moves_to_tomorrow_at_or_after_time() {
        let six = TimeOfDay::new(6, 0).expect("time");
        // 2026-03-04 05:00 -> same day 06:00
        assert_eq!(next_daily_after(local(2026, 3, 4, 5, 0), six), local(2026, 3, 4, 6, 0));
        // exactly 06:00 -> next day
        assert_eq!(next_daily_after(local(2026, 3, 4, 6, 0), six), local(2026, 3, 5, 6, 0));
        assert_eq!(next_daily_after(local(2026, 3, 4, 23, 0), six), local(2026, 3, 5, 6, 0));
    }

    #[test]
    fn next_weekly_picks_earliest_slot() {
        // 2026-03-03 is a Tuesday
        let schedule = vec![
            ScheduleSlot {
                day: Weekday::Wed,
                time: TimeOfDay::new(17, 0).expect("time"),
            },
            ScheduleSlot {
                day: Weekday::Fri,
                time: TimeOfDay::new(18, 0).expect("time"),
            },
        ];
        let tue = local(2026, 3, 3, 17, 1);
        assert_eq!(next_weekly_after(tue, &schedule), Some(local(2026, 3, 4, 17, 0)));

        let wed_after = local(2026, 3, 4, 17, 0);
        assert_eq!(next_weekly_after(wed_after, &schedule), Some(local(2026, 3, 6, 18, 0)));

        let sat = local(2026, 3, 7, 9, 0);
        assert_eq!(next_weekly_after(sat, &schedule), Some(local(2026, 3, 11, 17, 0)));

        assert_eq!(next_weekly_after(sat, &[]), None);
    }

    #[test]
    fn schedule_slot_serde() {
        let slot: ScheduleSlot =
            serde_json::from_str(r#"{"day":"wed","time":"17:00"}"#).expect("deserialize");
        assert_eq!(slot.day, Weekday::Wed);
        let json = serde_json::to_string(&slot).expect("serialize");
        assert_eq!(json, r#"{"day":"wed","time":"17:00"}"#);
        assert!(serde_json::from_str::<ScheduleSlot>(r#"{"day":"xyz","time":"17:00"}"#).is_err());
    }
}
