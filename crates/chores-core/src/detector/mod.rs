//! # Detectors
//!
//! A detector watches one external condition and reports a [`SubState`]:
//! `idle → active → done`. Every variant lives in [`DetectorKind`]; the
//! [`Detector`] wrapper owns the fields all variants share and dispatches to
//! the variant with an exhaustive `match`.
//!
//! | Type | Roles | Steps |
//! |------|-------|-------|
//! | `manual` | completion | 1 |
//! | `sensor_state`, `contact`, `sensor_threshold`, `state_change`, `power_cycle`, `duration` | both | 1 |
//! | `contact_cycle`, `presence_cycle` | both | 2 |
//! | `daily`, `weekly` | trigger | 1 |
//!
//! Detectors never read the clock or any global state: event handlers and
//! polls both receive a [`Context`].

mod cycle;
mod duration;
mod event;
mod schedule;
mod threshold;

pub use cycle::{ContactCycle, PresenceCycle};
pub use duration::DurationDetector;
pub use event::{Contact, STATE_OFF, STATE_ON, SensorState, StateChangeDetector};
pub use schedule::{Daily, Weekly};
pub use threshold::{PowerCycle, SensorThreshold};

use crate::config::DetectorConfig;
use crate::formats::DetectorSnapshot;
use crate::types::{
    ChoreError, Context, MAX_SPAN_DAYS, StageRole, StateChange, SubState, span_hours, span_minutes,
    span_seconds,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

// =============================================================================
// SHARED STATE
// =============================================================================

/// Fields every detector carries regardless of variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorBase {
    state: SubState,
    state_entered_at: Option<DateTime<Utc>>,
}

impl DetectorBase {
    #[must_use]
    pub fn state(&self) -> SubState {
        self.state
    }

    #[must_use]
    pub fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.state_entered_at
    }

    /// Move to `new`, stamping the entry time. Returns false if already there.
    pub(crate) fn set(&mut self, new: SubState, now: DateTime<Utc>) -> bool {
        if self.state == new {
            return false;
        }
        self.state = new;
        self.state_entered_at = Some(now);
        true
    }
}

/// Attribute helpers shared by the variant modules.
mod attr {
    use crate::types::Context;
    use serde_json::{Map, Value};

    /// Current reading of `entity_id`, or null when unknown.
    pub(super) fn reading(ctx: &Context<'_>, entity_id: &str) -> Value {
        ctx.state(entity_id).map_or(Value::Null, Value::from)
    }

    pub(super) fn watched(attrs: &mut Map<String, Value>, entity_id: &str, ctx: &Context<'_>) {
        attrs.insert("watched_entity".into(), Value::from(entity_id));
        attrs.insert("watched_state".into(), reading(ctx, entity_id));
    }
}

// =============================================================================
// DETECTOR TYPE REGISTRY
// =============================================================================

/// The closed set of detector type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorType {
    Manual,
    SensorState,
    Contact,
    ContactCycle,
    PresenceCycle,
    SensorThreshold,
    PowerCycle,
    StateChange,
    Daily,
    Weekly,
    Duration,
}

impl DetectorType {
    pub const ALL: [DetectorType; 11] = [
        DetectorType::Manual,
        DetectorType::SensorState,
        DetectorType::Contact,
        DetectorType::ContactCycle,
        DetectorType::PresenceCycle,
        DetectorType::SensorThreshold,
        DetectorType::PowerCycle,
        DetectorType::StateChange,
        DetectorType::Daily,
        DetectorType::Weekly,
        DetectorType::Duration,
    ];

    /// The type of a configured detector.
    #[must_use]
    pub fn of(config: &DetectorConfig) -> Self {
        match config {
            DetectorConfig::Manual => DetectorType::Manual,
            DetectorConfig::SensorState { .. } => DetectorType::SensorState,
            DetectorConfig::Contact { .. } => DetectorType::Contact,
            DetectorConfig::ContactCycle { .. } => DetectorType::ContactCycle,
            DetectorConfig::PresenceCycle { .. } => DetectorType::PresenceCycle,
            DetectorConfig::SensorThreshold { .. } => DetectorType::SensorThreshold,
            DetectorConfig::PowerCycle { .. } => DetectorType::PowerCycle,
            DetectorConfig::StateChange { .. } => DetectorType::StateChange,
            DetectorConfig::Daily { .. } => DetectorType::Daily,
            DetectorConfig::Weekly { .. } => DetectorType::Weekly,
            DetectorConfig::Duration { .. } => DetectorType::Duration,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorType::Manual => "manual",
            DetectorType::SensorState => "sensor_state",
            DetectorType::Contact => "contact",
            DetectorType::ContactCycle => "contact_cycle",
            DetectorType::PresenceCycle => "presence_cycle",
            DetectorType::SensorThreshold => "sensor_threshold",
            DetectorType::PowerCycle => "power_cycle",
            DetectorType::StateChange => "state_change",
            DetectorType::Daily => "daily",
            DetectorType::Weekly => "weekly",
            DetectorType::Duration => "duration",
        }
    }

    /// Whether this detector may be used in `role`.
    #[must_use]
    pub fn supports(&self, role: StageRole) -> bool {
        match self {
            DetectorType::Manual => role == StageRole::Completion,
            DetectorType::Daily | DetectorType::Weekly => role == StageRole::Trigger,
            _ => true,
        }
    }

    /// Number of steps reported when the detector is done.
    #[must_use]
    pub fn steps_total(&self) -> u8 {
        match self {
            DetectorType::ContactCycle | DetectorType::PresenceCycle => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for DetectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorType {
    type Err = ChoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ChoreError::config(format!("unknown detector type '{s}'")))
    }
}

// =============================================================================
// DETECTOR
// =============================================================================

/// Variant-specific data of a detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorKind {
    Manual,
    SensorState(SensorState),
    Contact(Contact),
    ContactCycle(ContactCycle),
    PresenceCycle(PresenceCycle),
    SensorThreshold(SensorThreshold),
    PowerCycle(PowerCycle),
    StateChange(StateChangeDetector),
    Daily(Daily),
    Weekly(Weekly),
    Duration(DurationDetector),
}

fn out_of_range(field: &str, value: String) -> ChoreError {
    ChoreError::config(format!(
        "{field} out of range: {value} (limit {MAX_SPAN_DAYS} days)"
    ))
}

/// A leaf condition watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    base: DetectorBase,
    kind: DetectorKind,
}

impl Detector {
    /// Build a detector for `role`, rejecting configurations that cannot work.
    pub fn from_config(config: &DetectorConfig, role: StageRole) -> Result<Self, ChoreError> {
        let detector_type = DetectorType::of(config);
        if !detector_type.supports(role) {
            return Err(ChoreError::config(format!(
                "detector '{detector_type}' cannot be used as {role}"
            )));
        }

        let kind = match config {
            DetectorConfig::Manual => DetectorKind::Manual,
            DetectorConfig::SensorState { entity_id, state } => {
                DetectorKind::SensorState(SensorState::new(entity_id, state))
            }
            DetectorConfig::Contact { entity_id } => DetectorKind::Contact(Contact::new(entity_id)),
            DetectorConfig::ContactCycle {
                entity_id,
                debounce_seconds,
            } => {
                let debounce = span_seconds(*debounce_seconds).ok_or_else(|| {
                    out_of_range("debounce_seconds", debounce_seconds.to_string())
                })?;
                DetectorKind::ContactCycle(ContactCycle::new(entity_id, debounce))
            }
            DetectorConfig::PresenceCycle { entity_id } => {
                DetectorKind::PresenceCycle(PresenceCycle::new(entity_id))
            }
            DetectorConfig::SensorThreshold {
                entity_id,
                threshold,
                operator,
            } => DetectorKind::SensorThreshold(SensorThreshold::new(
                entity_id, *threshold, *operator,
            )),
            DetectorConfig::PowerCycle {
                power_sensor,
                current_sensor,
                power_threshold,
                current_threshold,
                cooldown_minutes,
            } => {
                if power_sensor.is_none() && current_sensor.is_none() {
                    return Err(ChoreError::config(
                        "power_cycle needs a power_sensor or a current_sensor",
                    ));
                }
                let cooldown = span_minutes(*cooldown_minutes).ok_or_else(|| {
                    out_of_range("cooldown_minutes", cooldown_minutes.to_string())
                })?;
                DetectorKind::PowerCycle(PowerCycle::new(
                    power_sensor.clone(),
                    current_sensor.clone(),
                    *power_threshold,
                    *current_threshold,
                    cooldown,
                ))
            }
            DetectorConfig::StateChange {
                entity_id,
                from,
                to,
            } => DetectorKind::StateChange(StateChangeDetector::new(entity_id, from, to)),
            DetectorConfig::Daily { time } => DetectorKind::Daily(Daily::new(*time)),
            DetectorConfig::Weekly { schedule } => {
                if schedule.is_empty() {
                    return Err(ChoreError::config("weekly schedule must not be empty"));
                }
                DetectorKind::Weekly(Weekly::new(schedule.clone()))
            }
            DetectorConfig::Duration {
                entity_id,
                state,
                duration_hours,
            } => {
                let span = span_hours(*duration_hours)
                    .filter(|span| span.num_seconds() > 0)
                    .ok_or_else(|| out_of_range("duration_hours", duration_hours.to_string()))?;
                DetectorKind::Duration(DurationDetector::new(
                    entity_id,
                    state,
                    *duration_hours,
                    span,
                ))
            }
        };

        Ok(Self {
            base: DetectorBase::default(),
            kind,
        })
    }

    #[must_use]
    pub fn detector_type(&self) -> DetectorType {
        match &self.kind {
            DetectorKind::Manual => DetectorType::Manual,
            DetectorKind::SensorState(_) => DetectorType::SensorState,
            DetectorKind::Contact(_) => DetectorType::Contact,
            DetectorKind::ContactCycle(_) => DetectorType::ContactCycle,
            DetectorKind::PresenceCycle(_) => DetectorType::PresenceCycle,
            DetectorKind::SensorThreshold(_) => DetectorType::SensorThreshold,
            DetectorKind::PowerCycle(_) => DetectorType::PowerCycle,
            DetectorKind::StateChange(_) => DetectorType::StateChange,
            DetectorKind::Daily(_) => DetectorType::Daily,
            DetectorKind::Weekly(_) => DetectorType::Weekly,
            DetectorKind::Duration(_) => DetectorType::Duration,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &DetectorKind {
        &self.kind
    }

    #[must_use]
    pub fn state(&self) -> SubState {
        self.base.state()
    }

    #[must_use]
    pub fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.base.state_entered_at()
    }

    #[must_use]
    pub fn steps_total(&self) -> u8 {
        self.detector_type().steps_total()
    }

    /// Force a state. Returns whether it changed.
    pub fn set_state(&mut self, new: SubState, now: DateTime<Utc>) -> bool {
        self.base.set(new, now)
    }

    /// Back to idle, dropping any in-progress tracking.
    ///
    /// The daily/weekly "fired today" date survives a reset.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.base.set(SubState::Idle, now);
        match &mut self.kind {
            DetectorKind::ContactCycle(d) => d.reset_internal(),
            DetectorKind::PowerCycle(d) => d.reset_internal(),
            DetectorKind::Duration(d) => d.reset_internal(),
            _ => {}
        }
    }

    /// Entities whose changes this detector reacts to.
    #[must_use]
    pub fn watched_entities(&self) -> Vec<&str> {
        match &self.kind {
            DetectorKind::Manual | DetectorKind::Daily(_) | DetectorKind::Weekly(_) => Vec::new(),
            DetectorKind::SensorState(d) => vec![d.entity_id.as_str()],
            DetectorKind::Contact(d) => vec![d.entity_id.as_str()],
            DetectorKind::ContactCycle(d) => vec![d.entity_id.as_str()],
            DetectorKind::PresenceCycle(d) => vec![d.entity_id.as_str()],
            DetectorKind::SensorThreshold(d) => vec![d.entity_id.as_str()],
            DetectorKind::PowerCycle(d) => d.watched().collect(),
            DetectorKind::StateChange(d) => vec![d.entity_id.as_str()],
            DetectorKind::Duration(d) => vec![d.entity_id.as_str()],
        }
    }

    #[must_use]
    pub fn watches(&self, entity_id: &str) -> bool {
        self.watched_entities().contains(&entity_id)
    }

    /// React to an external transition. Returns true when the owner should
    /// re-evaluate.
    pub fn handle_change(&mut self, change: &StateChange, ctx: &Context<'_>) -> bool {
        if !self.watches(&change.entity_id) {
            return false;
        }
        let base = &mut self.base;
        match &mut self.kind {
            DetectorKind::Manual | DetectorKind::Daily(_) | DetectorKind::Weekly(_) => false,
            DetectorKind::SensorState(d) => d.handle(base, change, ctx),
            DetectorKind::Contact(d) => d.handle(base, change, ctx),
            DetectorKind::ContactCycle(d) => d.handle(base, change, ctx),
            DetectorKind::PresenceCycle(d) => d.handle(base, change, ctx),
            DetectorKind::SensorThreshold(d) => d.handle(base, change, ctx),
            DetectorKind::PowerCycle(d) => d.handle(base, change, ctx),
            DetectorKind::StateChange(d) => d.handle(base, change, ctx),
            DetectorKind::Duration(d) => d.handle(base, change, ctx),
        }
    }

    /// Poll-driven checks: schedules, elapsed windows, expired timers.
    ///
    /// Idempotent: a second call with the same context changes nothing.
    pub fn evaluate(&mut self, ctx: &Context<'_>) -> SubState {
        let base = &mut self.base;
        match &mut self.kind {
            DetectorKind::ContactCycle(d) => {
                d.evaluate(base, ctx);
            }
            DetectorKind::PowerCycle(d) => {
                d.evaluate(base, ctx);
            }
            DetectorKind::Daily(d) => {
                d.evaluate(base, ctx);
            }
            DetectorKind::Weekly(d) => {
                d.evaluate(base, ctx);
            }
            DetectorKind::Duration(d) => {
                d.evaluate(base, ctx);
            }
            _ => {}
        }
        self.base.state()
    }

    /// React to a condition that was already true before the detector was
    /// enabled. Returns whether the state changed.
    pub fn check_immediate(&mut self, ctx: &Context<'_>) -> bool {
        match &mut self.kind {
            DetectorKind::SensorThreshold(d) => d.check_immediate(&mut self.base, ctx),
            _ => false,
        }
    }

    /// Earliest instant at which [`Detector::evaluate`] may change state.
    #[must_use]
    pub fn next_deadline(&self, ctx: &Context<'_>) -> Option<DateTime<Utc>> {
        match &self.kind {
            DetectorKind::ContactCycle(d) => d.next_deadline(),
            DetectorKind::PowerCycle(d) => d.next_deadline(&self.base),
            DetectorKind::Daily(d) => d.next_deadline(&self.base, ctx),
            DetectorKind::Weekly(d) => d.next_deadline(&self.base, ctx),
            DetectorKind::Duration(d) => d.next_deadline(&self.base),
            _ => None,
        }
    }

    /// Next scheduled firing, for daily and weekly detectors.
    #[must_use]
    pub fn next_trigger(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        match &self.kind {
            DetectorKind::Daily(d) => Some(d.next_trigger(now)),
            DetectorKind::Weekly(d) => d.next_trigger(now),
            _ => None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> DetectorSnapshot {
        let mut snap = DetectorSnapshot {
            state: self.base.state(),
            state_entered_at: self.base.state_entered_at(),
            ..DetectorSnapshot::default()
        };
        match &self.kind {
            DetectorKind::ContactCycle(d) => snap.opened_at = d.opened_at(),
            DetectorKind::PowerCycle(d) => {
                snap.machine_running = d.machine_running();
                snap.power_dropped_at = d.power_dropped_at();
            }
            DetectorKind::Daily(d) => snap.last_fired_on = d.last_fired_on(),
            DetectorKind::Weekly(d) => snap.last_fired_on = d.last_fired_on(),
            DetectorKind::Duration(d) => snap.state_since = d.state_since(),
            _ => {}
        }
        snap
    }

    /// Restore from a snapshot; pending timers are re-derived from timestamps.
    pub fn restore(&mut self, snap: &DetectorSnapshot) {
        self.base = DetectorBase {
            state: snap.state,
            state_entered_at: snap.state_entered_at,
        };
        match &mut self.kind {
            DetectorKind::ContactCycle(d) => d.restore(&self.base, snap.opened_at),
            DetectorKind::PowerCycle(d) => d.restore(snap.machine_running, snap.power_dropped_at),
            DetectorKind::Daily(d) => d.restore(snap.last_fired_on),
            DetectorKind::Weekly(d) => d.restore(snap.last_fired_on),
            DetectorKind::Duration(d) => d.restore(snap.state_since),
            _ => {}
        }
    }

    /// Progress attributes for display and diagnostics.
    #[must_use]
    pub fn attributes(&self, ctx: &Context<'_>) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert(
            "detector_type".into(),
            Value::from(self.detector_type().as_str()),
        );
        attrs.insert("state".into(), Value::from(self.state().as_str()));
        attrs.insert(
            "state_entered_at".into(),
            self.state_entered_at()
                .map_or(Value::Null, |t| Value::from(t.to_rfc3339())),
        );
        attrs.insert("steps_total".into(), Value::from(self.steps_total()));
        match &self.kind {
            DetectorKind::Manual => {}
            DetectorKind::SensorState(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::Contact(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::ContactCycle(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::PresenceCycle(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::SensorThreshold(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::PowerCycle(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::StateChange(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::Daily(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::Weekly(d) => d.attributes(ctx, &mut attrs),
            DetectorKind::Duration(d) => d.attributes(ctx, &mut attrs),
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdOperator;
    use crate::testing::{at, states};
    use crate::types::TimeOfDay;

    fn build(config: DetectorConfig, role: StageRole) -> Detector {
        Detector::from_config(&config, role).expect("valid detector")
    }

    #[test]
    fn type_strings_round_trip() {
        for t in DetectorType::ALL {
            assert_eq!(t.as_str().parse::<DetectorType>().expect("parse"), t);
        }
        assert!(matches!(
            "telepathy".parse::<DetectorType>(),
            Err(ChoreError::Config(_))
        ));
    }

    #[test]
    fn role_restrictions() {
        let manual = Detector::from_config(&DetectorConfig::Manual, StageRole::Trigger);
        assert!(matches!(manual, Err(ChoreError::Config(_))));

        let daily = DetectorConfig::Daily {
            time: TimeOfDay::new(6, 0).expect("time"),
        };
        assert!(Detector::from_config(&daily, StageRole::Completion).is_err());
        assert!(Detector::from_config(&daily, StageRole::Trigger).is_ok());
    }

    #[test]
    fn structural_validation() {
        let weekly = DetectorConfig::Weekly { schedule: vec![] };
        assert!(Detector::from_config(&weekly, StageRole::Trigger).is_err());

        let power = DetectorConfig::PowerCycle {
            power_sensor: None,
            current_sensor: None,
            power_threshold: 10.0,
            current_threshold: 0.04,
            cooldown_minutes: 5,
        };
        assert!(Detector::from_config(&power, StageRole::Trigger).is_err());

        for hours in [0.0, -2.0, f64::NAN] {
            let duration = DetectorConfig::Duration {
                entity_id: "binary_sensor.x".into(),
                state: "on".into(),
                duration_hours: hours,
            };
            assert!(Detector::from_config(&duration, StageRole::Trigger).is_err());
        }
    }

    #[test]
    fn rejects_windows_out_of_range() {
        let power = DetectorConfig::PowerCycle {
            power_sensor: Some("sensor.washer_power".into()),
            current_sensor: None,
            power_threshold: 10.0,
            current_threshold: 0.04,
            cooldown_minutes: u64::MAX,
        };
        assert!(matches!(
            Detector::from_config(&power, StageRole::Trigger),
            Err(ChoreError::Config(_))
        ));

        let cycle = DetectorConfig::ContactCycle {
            entity_id: "binary_sensor.door".into(),
            debounce_seconds: u64::MAX,
        };
        assert!(Detector::from_config(&cycle, StageRole::Completion).is_err());

        let duration = DetectorConfig::Duration {
            entity_id: "binary_sensor.x".into(),
            state: "on".into(),
            duration_hours: 1e12,
        };
        assert!(Detector::from_config(&duration, StageRole::Trigger).is_err());

        let year = DetectorConfig::Duration {
            entity_id: "binary_sensor.x".into(),
            state: "on".into(),
            duration_hours: 24.0 * 365.0,
        };
        assert!(Detector::from_config(&year, StageRole::Trigger).is_ok());
    }

    #[test]
    fn steps_total_per_type() {
        let cycle = build(
            DetectorConfig::ContactCycle {
                entity_id: "binary_sensor.door".into(),
                debounce_seconds: 2,
            },
            StageRole::Completion,
        );
        assert_eq!(cycle.steps_total(), 2);
        assert_eq!(build(DetectorConfig::Manual, StageRole::Completion).steps_total(), 1);
    }

    #[test]
    fn ignores_unwatched_entities() {
        let readings = states(&[]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);
        let mut detector = build(
            DetectorConfig::Contact {
                entity_id: "binary_sensor.door".into(),
            },
            StageRole::Completion,
        );
        let other = StateChange::new("binary_sensor.window", Some("off"), Some("on"));
        assert!(!detector.handle_change(&other, &ctx));
        assert_eq!(detector.state(), SubState::Idle);
    }

    #[test]
    fn set_state_reports_change_and_stamps_time() {
        let readings = states(&[]);
        let now = at(2026, 3, 4, 9, 0, &readings).utc();
        let mut detector = build(DetectorConfig::Manual, StageRole::Completion);

        assert!(detector.set_state(SubState::Done, now));
        assert!(!detector.set_state(SubState::Done, now));
        assert_eq!(detector.state_entered_at(), Some(now));

        detector.reset(now);
        assert_eq!(detector.state(), SubState::Idle);
    }

    #[test]
    fn snapshot_restores_power_cooldown() {
        let readings = states(&[("sensor.washer_power", "1")]);
        let config = DetectorConfig::PowerCycle {
            power_sensor: Some("sensor.washer_power".into()),
            current_sensor: None,
            power_threshold: 10.0,
            current_threshold: 0.04,
            cooldown_minutes: 5,
        };
        let mut original = build(config.clone(), StageRole::Trigger);
        let running = states(&[("sensor.washer_power", "400")]);
        let change = StateChange::new("sensor.washer_power", Some("0"), Some("400"));
        original.handle_change(&change, &at(2026, 3, 4, 9, 0, &running));
        let change = StateChange::new("sensor.washer_power", Some("400"), Some("1"));
        original.handle_change(&change, &at(2026, 3, 4, 10, 0, &readings));

        let snap = original.snapshot();
        assert!(snap.machine_running);

        let mut restored = build(config, StageRole::Trigger);
        restored.restore(&snap);
        assert_eq!(restored.state(), SubState::Active);
        assert_eq!(
            restored.evaluate(&at(2026, 3, 4, 10, 5, &readings)),
            SubState::Done
        );
    }

    #[test]
    fn threshold_check_immediate_via_detector() {
        let readings = states(&[("sensor.bin_weight", "12")]);
        let mut detector = build(
            DetectorConfig::SensorThreshold {
                entity_id: "sensor.bin_weight".into(),
                threshold: 10.0,
                operator: ThresholdOperator::Above,
            },
            StageRole::Completion,
        );
        assert!(detector.check_immediate(&at(2026, 3, 4, 9, 0, &readings)));
        assert_eq!(detector.state(), SubState::Done);
    }

    #[test]
    fn attributes_describe_detector() {
        let readings = states(&[("binary_sensor.door", "off")]);
        let detector = build(
            DetectorConfig::Contact {
                entity_id: "binary_sensor.door".into(),
            },
            StageRole::Completion,
        );
        let attrs = detector.attributes(&at(2026, 3, 4, 9, 0, &readings));
        assert_eq!(attrs["detector_type"], "contact");
        assert_eq!(attrs["watched_entity"], "binary_sensor.door");
        assert_eq!(attrs["watched_state"], "off");
        assert_eq!(attrs["state"], "idle");
    }
}
