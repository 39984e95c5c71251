//! # Stages
//!
//! A stage wraps one [`Detector`] and at most one [`Gate`]. When the detector
//! reaches `done` while the gate is unmet, the stage *holds*: it reports
//! `active` until the gate is satisfied, even though the detector itself is
//! already done.
//!
//! - [`TriggerStage`] is always listening. It resets after each cycle.
//! - [`CompletionStage`] only counts detector progress while enabled (the
//!   chore is due or started) and tracks how many steps are done.
//!
//! Both return `true` from their event handlers when the owning chore should
//! re-evaluate.

use crate::config::StageConfig;
use crate::detector::{Detector, DetectorType};
use crate::formats::StageSnapshot;
use crate::gate::Gate;
use crate::types::{ChoreError, Context, StageRole, StateChange, SubState};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Map, Value};

/// Build the detector and gate of a stage for `role`.
fn build(config: &StageConfig, role: StageRole) -> Result<(Detector, Option<Gate>), ChoreError> {
    let detector = Detector::from_config(&config.detector, role)?;
    let gate = config.gate.as_ref().map(Gate::from_config);
    Ok((detector, gate))
}

/// Whether a done detector must be held back by an unmet gate.
fn must_hold(detector: &Detector, gate: Option<&Gate>, ctx: &Context<'_>) -> bool {
    detector.state() == SubState::Done && gate.is_some_and(|g| !g.is_met(ctx))
}

/// Detector entities plus the gate entity.
fn watched<'a>(detector: &'a Detector, gate: Option<&'a Gate>) -> Vec<&'a str> {
    let mut entities = detector.watched_entities();
    if let Some(gate) = gate
        && !entities.contains(&gate.entity_id())
    {
        entities.push(gate.entity_id());
    }
    entities
}

fn stage_attributes(
    detector: &Detector,
    gate: Option<&Gate>,
    role: StageRole,
    ctx: &Context<'_>,
) -> Map<String, Value> {
    let mut attrs = detector.attributes(ctx);
    if let Some(kind) = attrs.remove("detector_type") {
        attrs.insert(format!("{role}_type"), kind);
    }
    if let Some(gate) = gate {
        gate.attributes(ctx, &mut attrs);
    }
    attrs
}

// =============================================================================
// TRIGGER STAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerStage {
    detector: Detector,
    gate: Option<Gate>,
    gate_holding: bool,
}

impl TriggerStage {
    #[must_use]
    pub fn new(detector: Detector, gate: Option<Gate>) -> Self {
        Self {
            detector,
            gate,
            gate_holding: false,
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ChoreError> {
        let (detector, gate) = build(config, StageRole::Trigger)?;
        Ok(Self::new(detector, gate))
    }

    #[must_use]
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    #[must_use]
    pub fn detector_type(&self) -> DetectorType {
        self.detector.detector_type()
    }

    #[must_use]
    pub fn gate(&self) -> Option<&Gate> {
        self.gate.as_ref()
    }

    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.gate_holding
    }

    /// Effective state: `active` while holding, else the detector's state.
    #[must_use]
    pub fn state(&self) -> SubState {
        if self.gate_holding {
            SubState::Active
        } else {
            self.detector.state()
        }
    }

    #[must_use]
    pub fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.detector.state_entered_at()
    }

    /// Force the detector state. Always releases a hold.
    pub fn set_state(&mut self, new: SubState, now: DateTime<Utc>) -> bool {
        self.gate_holding = false;
        self.detector.set_state(new, now)
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.gate_holding = false;
        self.detector.reset(now);
    }

    /// Run the detector's poll checks and re-check the gate.
    ///
    /// A hold is only engaged when the detector *becomes* done here; once
    /// engaged it is released as soon as the gate is met.
    pub fn evaluate(&mut self, ctx: &Context<'_>) -> SubState {
        let before = self.detector.state();
        let after = self.detector.evaluate(ctx);

        if after == SubState::Done
            && let Some(gate) = &self.gate
        {
            if before != SubState::Done {
                self.gate_holding = !gate.is_met(ctx);
            } else if self.gate_holding && gate.is_met(ctx) {
                self.gate_holding = false;
            }
        }
        self.state()
    }

    /// Route an external transition to the detector and the gate.
    pub fn handle_change(&mut self, change: &StateChange, ctx: &Context<'_>) -> bool {
        let mut notify = false;

        if self.detector.handle_change(change, ctx) {
            if self.gate.is_some() {
                self.gate_holding = must_hold(&self.detector, self.gate.as_ref(), ctx);
            }
            notify = true;
        }

        if let Some(gate) = &self.gate
            && gate.opened_by(change)
            && self.detector.state() == SubState::Done
            && gate.is_met(ctx)
        {
            self.gate_holding = false;
            notify = true;
        }
        notify
    }

    #[must_use]
    pub fn watched_entities(&self) -> Vec<&str> {
        watched(&self.detector, self.gate.as_ref())
    }

    #[must_use]
    pub fn next_deadline(&self, ctx: &Context<'_>) -> Option<DateTime<Utc>> {
        self.detector.next_deadline(ctx)
    }

    #[must_use]
    pub fn next_trigger(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.detector.next_trigger(now)
    }

    #[must_use]
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            detector: self.detector.snapshot(),
            gate_holding: self.gate_holding,
            steps_done: None,
            enabled: None,
        }
    }

    pub fn restore(&mut self, snap: &StageSnapshot) {
        self.detector.restore(&snap.detector);
        self.gate_holding =
            snap.gate_holding && self.gate.is_some() && self.detector.state() == SubState::Done;
    }

    #[must_use]
    pub fn attributes(&self, ctx: &Context<'_>) -> Map<String, Value> {
        stage_attributes(&self.detector, self.gate.as_ref(), StageRole::Trigger, ctx)
    }
}

// =============================================================================
// COMPLETION STAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionStage {
    detector: Detector,
    gate: Option<Gate>,
    gate_holding: bool,
    enabled: bool,
    steps_done: u8,
}

impl CompletionStage {
    #[must_use]
    pub fn new(detector: Detector, gate: Option<Gate>) -> Self {
        Self {
            detector,
            gate,
            gate_holding: false,
            enabled: false,
            steps_done: 0,
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ChoreError> {
        let (detector, gate) = build(config, StageRole::Completion)?;
        Ok(Self::new(detector, gate))
    }

    #[must_use]
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    #[must_use]
    pub fn detector_type(&self) -> DetectorType {
        self.detector.detector_type()
    }

    #[must_use]
    pub fn gate(&self) -> Option<&Gate> {
        self.gate.as_ref()
    }

    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.gate_holding
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn steps_done(&self) -> u8 {
        self.steps_done
    }

    #[must_use]
    pub fn steps_total(&self) -> u8 {
        self.detector.steps_total()
    }

    #[must_use]
    pub fn state(&self) -> SubState {
        if self.gate_holding {
            SubState::Active
        } else {
            self.detector.state()
        }
    }

    #[must_use]
    pub fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.detector.state_entered_at()
    }

    fn update_steps(&mut self) {
        self.steps_done = match self.detector.state() {
            SubState::Idle => 0,
            SubState::Active => 1,
            SubState::Done => self.detector.steps_total(),
        };
    }

    /// Start counting. Progress made while disabled is discarded, then a
    /// condition that already holds is picked up immediately.
    pub fn enable(&mut self, ctx: &Context<'_>) {
        self.enabled = true;
        self.detector.reset(ctx.utc());
        self.steps_done = 0;
        if self.detector.check_immediate(ctx) {
            self.gate_holding = must_hold(&self.detector, self.gate.as_ref(), ctx);
        }
        self.update_steps();
    }

    /// Stop counting without touching stored state.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Force the detector state. Forcing `done` releases a hold.
    pub fn set_state(&mut self, new: SubState, now: DateTime<Utc>) -> bool {
        if new == SubState::Done {
            self.gate_holding = false;
        }
        let changed = self.detector.set_state(new, now);
        self.update_steps();
        changed
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.gate_holding = false;
        self.enabled = false;
        self.steps_done = 0;
        self.detector.reset(now);
    }

    /// Poll checks; a no-op while disabled.
    pub fn evaluate(&mut self, ctx: &Context<'_>) -> SubState {
        if !self.enabled {
            return self.state();
        }
        let before = self.detector.state();
        let after = self.detector.evaluate(ctx);

        if after == SubState::Done && before != SubState::Done {
            self.gate_holding = must_hold(&self.detector, self.gate.as_ref(), ctx);
        }
        if self.gate_holding && self.gate.as_ref().is_some_and(|g| g.is_met(ctx)) {
            self.gate_holding = false;
        }
        self.update_steps();
        self.state()
    }

    /// Route an external transition. Ignored entirely while disabled.
    pub fn handle_change(&mut self, change: &StateChange, ctx: &Context<'_>) -> bool {
        if !self.enabled {
            return false;
        }
        let mut notify = false;

        if self.detector.handle_change(change, ctx) {
            self.update_steps();
            self.gate_holding = must_hold(&self.detector, self.gate.as_ref(), ctx);
            notify = true;
        }

        if self.gate_holding
            && let Some(gate) = &self.gate
            && gate.opened_by(change)
            && gate.is_met(ctx)
        {
            self.gate_holding = false;
            notify = true;
        }
        notify
    }

    #[must_use]
    pub fn watched_entities(&self) -> Vec<&str> {
        watched(&self.detector, self.gate.as_ref())
    }

    #[must_use]
    pub fn next_deadline(&self, ctx: &Context<'_>) -> Option<DateTime<Utc>> {
        if self.enabled {
            self.detector.next_deadline(ctx)
        } else {
            None
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            detector: self.detector.snapshot(),
            gate_holding: self.gate_holding,
            steps_done: Some(self.steps_done),
            enabled: Some(self.enabled),
        }
    }

    pub fn restore(&mut self, snap: &StageSnapshot) {
        self.detector.restore(&snap.detector);
        self.enabled = snap.enabled.unwrap_or(false);
        self.gate_holding =
            snap.gate_holding && self.gate.is_some() && self.detector.state() == SubState::Done;
        self.update_steps();
    }

    #[must_use]
    pub fn attributes(&self, ctx: &Context<'_>) -> Map<String, Value> {
        let mut attrs =
            stage_attributes(&self.detector, self.gate.as_ref(), StageRole::Completion, ctx);
        attrs.insert("steps_done".into(), Value::from(self.steps_done));
        attrs.insert("enabled".into(), Value::from(self.enabled));
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorConfig, ThresholdOperator};
    use crate::testing::{at, states};
    use crate::types::TimeOfDay;

    const DOOR: &str = "binary_sensor.back_door";
    const LID: &str = "binary_sensor.bin_lid";

    fn daily_with_gate() -> TriggerStage {
        let config = StageConfig::new(DetectorConfig::Daily {
            time: TimeOfDay::new(6, 0).expect("time"),
        })
        .with_gate(DOOR, "on");
        TriggerStage::from_config(&config).expect("trigger")
    }

    fn contact_cycle_completion() -> CompletionStage {
        let config = StageConfig::new(DetectorConfig::ContactCycle {
            entity_id: LID.into(),
            debounce_seconds: 0,
        });
        CompletionStage::from_config(&config).expect("completion")
    }

    #[test]
    fn trigger_holds_until_gate_met() {
        let mut stage = daily_with_gate();
        let closed = states(&[(DOOR, "off")]);

        assert_eq!(stage.evaluate(&at(2026, 3, 4, 6, 1, &closed)), SubState::Active);
        assert!(stage.is_holding());
        assert_eq!(stage.detector().state(), SubState::Done);

        let open = states(&[(DOOR, "on")]);
        let change = StateChange::new(DOOR, Some("off"), Some("on"));
        assert!(stage.handle_change(&change, &at(2026, 3, 4, 6, 30, &open)));
        assert_eq!(stage.state(), SubState::Done);
    }

    #[test]
    fn trigger_poll_releases_missed_gate() {
        let mut stage = daily_with_gate();
        let closed = states(&[(DOOR, "off")]);
        stage.evaluate(&at(2026, 3, 4, 6, 1, &closed));

        let open = states(&[(DOOR, "on")]);
        assert_eq!(stage.evaluate(&at(2026, 3, 4, 7, 0, &open)), SubState::Done);
    }

    #[test]
    fn trigger_gate_noise_is_ignored() {
        let mut stage = daily_with_gate();
        let closed = states(&[(DOOR, "off")]);
        stage.evaluate(&at(2026, 3, 4, 6, 1, &closed));

        let open = states(&[(DOOR, "on")]);
        let noise = StateChange::new(DOOR, Some("unavailable"), Some("on"));
        assert!(!stage.handle_change(&noise, &at(2026, 3, 4, 6, 30, &open)));
        assert!(stage.is_holding());
    }

    #[test]
    fn trigger_set_state_clears_hold() {
        let mut stage = daily_with_gate();
        let closed = states(&[(DOOR, "off")]);
        let ctx = at(2026, 3, 4, 6, 1, &closed);
        stage.evaluate(&ctx);

        stage.set_state(SubState::Done, ctx.utc());
        assert!(!stage.is_holding());
        assert_eq!(stage.state(), SubState::Done);
    }

    #[test]
    fn trigger_watches_gate_entity() {
        let stage = daily_with_gate();
        assert_eq!(stage.watched_entities(), vec![DOOR]);
    }

    #[test]
    fn completion_ignores_progress_while_disabled() {
        let mut stage = contact_cycle_completion();
        let readings = states(&[]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);

        let open = StateChange::new(LID, Some("off"), Some("on"));
        assert!(!stage.handle_change(&open, &ctx));
        stage.evaluate(&ctx);
        assert_eq!(stage.steps_done(), 0);

        stage.enable(&ctx);
        assert_eq!(stage.state(), SubState::Idle);
    }

    #[test]
    fn disabled_completion_arms_no_timer() {
        let config = StageConfig::new(DetectorConfig::ContactCycle {
            entity_id: LID.into(),
            debounce_seconds: 2,
        });
        let mut stage = CompletionStage::from_config(&config).expect("completion");
        let readings = states(&[(LID, "on")]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);

        let open = StateChange::new(LID, Some("off"), Some("on"));
        assert!(!stage.handle_change(&open, &ctx));
        assert_eq!(stage.detector().next_deadline(&ctx), None);
        assert_eq!(stage.detector().state(), SubState::Idle);

        let close = StateChange::new(LID, Some("on"), Some("off"));
        assert!(!stage.handle_change(&close, &at(2026, 3, 4, 9, 5, &readings)));
        assert_eq!(stage.detector().state(), SubState::Idle);
        assert_eq!(stage.steps_done(), 0);
    }

    #[test]
    fn completion_counts_steps() {
        let mut stage = contact_cycle_completion();
        let readings = states(&[]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);
        stage.enable(&ctx);

        let open = StateChange::new(LID, Some("off"), Some("on"));
        stage.handle_change(&open, &ctx);
        assert_eq!(stage.evaluate(&ctx), SubState::Active);
        assert_eq!(stage.steps_done(), 1);

        let close = StateChange::new(LID, Some("on"), Some("off"));
        assert!(stage.handle_change(&close, &at(2026, 3, 4, 9, 1, &readings)));
        assert_eq!(stage.state(), SubState::Done);
        assert_eq!(stage.steps_done(), 2);
    }

    #[test]
    fn completion_enable_checks_existing_condition() {
        let config = StageConfig::new(DetectorConfig::SensorThreshold {
            entity_id: "sensor.bin_weight".into(),
            threshold: 5.0,
            operator: ThresholdOperator::Below,
        })
        .with_gate(DOOR, "on");
        let mut stage = CompletionStage::from_config(&config).expect("completion");

        let readings = states(&[("sensor.bin_weight", "1.5"), (DOOR, "off")]);
        stage.enable(&at(2026, 3, 4, 9, 0, &readings));
        assert_eq!(stage.detector().state(), SubState::Done);
        assert!(stage.is_holding());
        assert_eq!(stage.state(), SubState::Active);

        let open = states(&[("sensor.bin_weight", "1.5"), (DOOR, "on")]);
        let change = StateChange::new(DOOR, Some("off"), Some("on"));
        assert!(stage.handle_change(&change, &at(2026, 3, 4, 9, 5, &open)));
        assert_eq!(stage.state(), SubState::Done);
    }

    #[test]
    fn completion_reset_disables() {
        let mut stage = contact_cycle_completion();
        let readings = states(&[]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);
        stage.enable(&ctx);
        stage.set_state(SubState::Done, ctx.utc());
        assert_eq!(stage.steps_done(), 2);

        stage.reset(ctx.utc());
        assert!(!stage.is_enabled());
        assert_eq!(stage.state(), SubState::Idle);
        assert_eq!(stage.steps_done(), 0);
    }

    #[test]
    fn completion_snapshot_round_trip() {
        let mut stage = contact_cycle_completion();
        let readings = states(&[]);
        let ctx = at(2026, 3, 4, 9, 0, &readings);
        stage.enable(&ctx);
        stage.set_state(SubState::Active, ctx.utc());

        let snap = stage.snapshot();
        assert_eq!(snap.steps_done, Some(1));
        assert_eq!(snap.enabled, Some(true));

        let mut restored = contact_cycle_completion();
        restored.restore(&snap);
        assert_eq!(restored.state(), SubState::Active);
        assert!(restored.is_enabled());
        assert_eq!(restored.steps_done(), 1);
    }

    #[test]
    fn attributes_use_role_names() {
        let stage = daily_with_gate();
        let readings = states(&[(DOOR, "off")]);
        let attrs = stage.attributes(&at(2026, 3, 4, 5, 0, &readings));
        assert_eq!(attrs["trigger_type"], "daily");
        assert_eq!(attrs["gate_met"], false);
        assert!(attrs.get("detector_type").is_none());

        let completion = contact_cycle_completion();
        let attrs = completion.attributes(&at(2026, 3, 4, 5, 0, &readings));
        assert_eq!(attrs["completion_type"], "contact_cycle");
        assert_eq!(attrs["steps_total"], 2);
    }
}
