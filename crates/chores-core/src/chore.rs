//! # Chore State Machine
//!
//! A [`Chore`] owns one trigger stage, one completion stage and one reset
//! policy, and runs the lifecycle
//!
//! ```text
//! inactive → pending → due → started → completed → inactive
//! ```
//!
//! | From | Condition | To |
//! |------|-----------|----|
//! | inactive, pending | trigger done | due (completion enabled) |
//! | inactive | trigger active | pending |
//! | pending | trigger idle | inactive |
//! | due, started | completion done | completed |
//! | due | completion active | started |
//! | completed | reset policy fires | inactive (both stages reset) |
//!
//! Each call to [`Chore::evaluate`] fires at most one transition.
//!
//! ## Invariants
//!
//! - `due_since` is set exactly while the chore is `due` or `started`.
//! - `last_completed` is stamped on every entry into `completed`.
//! - The completion history never exceeds [`HISTORY_LIMIT`] entries.

use crate::config::ChoreConfig;
use crate::detector::DetectorType;
use crate::formats::{ChoreSnapshot, CompletionRecord};
use crate::reset::ResetPolicy;
use crate::stage::{CompletionStage, TriggerStage};
use crate::types::{ChoreError, ChoreState, CompletedBy, Context, StateChange, SubState, TimeOfDay};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of completion records kept per chore.
pub const HISTORY_LIMIT: usize = 100;

/// One state change of a chore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: ChoreState,
    pub current: ChoreState,
    pub forced: bool,
}

/// Presentation view of a chore, as served to the outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoreStatus {
    pub id: String,
    pub name: String,
    pub state: ChoreState,
    pub state_label: String,
    pub state_entered_at: Option<DateTime<Utc>>,
    pub due_since: Option<DateTime<Utc>>,
    pub last_completed: Option<DateTime<Utc>>,
    pub last_completed_by: Option<CompletedBy>,
    pub forced: bool,
    pub next_due: Option<DateTime<FixedOffset>>,
    pub notify_after: Option<DateTime<FixedOffset>>,
    pub should_notify: bool,
    pub trigger_type: String,
    pub trigger_state: SubState,
    pub completion_type: String,
    pub completion_state: SubState,
    pub steps_done: u8,
    pub steps_total: u8,
    pub reset_type: String,
    pub completion_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chore {
    id: String,
    name: String,
    description: Option<String>,
    context: Option<String>,
    state_labels: BTreeMap<ChoreState, String>,
    notify_at: Option<TimeOfDay>,
    notify_after_minutes: Option<u32>,

    trigger: TriggerStage,
    completion: CompletionStage,
    reset: ResetPolicy,

    state: ChoreState,
    state_entered_at: Option<DateTime<Utc>>,
    due_since: Option<DateTime<Utc>>,
    last_completed: Option<DateTime<Utc>>,
    forced: bool,
    history: Vec<CompletionRecord>,
}

impl Chore {
    /// Build a chore in the `inactive` state.
    pub fn from_config(config: &ChoreConfig) -> Result<Self, ChoreError> {
        if config.id.trim().is_empty() {
            return Err(ChoreError::config("chore id must not be empty"));
        }
        let trigger = TriggerStage::from_config(&config.trigger)
            .map_err(|e| ChoreError::config(format!("chore '{}' trigger: {e}", config.id)))?;
        let completion = CompletionStage::from_config(&config.completion)
            .map_err(|e| ChoreError::config(format!("chore '{}' completion: {e}", config.id)))?;
        let reset = ResetPolicy::from_config(config.reset.as_ref(), &config.trigger.detector)
            .map_err(|e| ChoreError::config(format!("chore '{}' reset: {e}", config.id)))?;

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            context: config.context.clone(),
            state_labels: config.state_labels.clone(),
            notify_at: config.notify_at,
            notify_after_minutes: config.notify_after_minutes,
            trigger,
            completion,
            reset,
            state: ChoreState::Inactive,
            state_entered_at: None,
            due_since: None,
            last_completed: None,
            forced: false,
            history: Vec::new(),
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> ChoreState {
        self.state
    }

    #[must_use]
    pub fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.state_entered_at
    }

    #[must_use]
    pub fn due_since(&self) -> Option<DateTime<Utc>> {
        self.due_since
    }

    #[must_use]
    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        self.last_completed
    }

    #[must_use]
    pub fn forced(&self) -> bool {
        self.forced
    }

    #[must_use]
    pub fn trigger(&self) -> &TriggerStage {
        &self.trigger
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionStage {
        &self.completion
    }

    #[must_use]
    pub fn reset_policy(&self) -> &ResetPolicy {
        &self.reset
    }

    #[must_use]
    pub fn completion_history(&self) -> &[CompletionRecord] {
        &self.history
    }

    /// Display label of the current state.
    #[must_use]
    pub fn state_label(&self) -> &str {
        self.state_labels
            .get(&self.state)
            .map_or(self.state.default_label(), String::as_str)
    }

    /// Completions at or after `since`.
    #[must_use]
    pub fn completion_count_since(&self, since: DateTime<Utc>) -> usize {
        self.history
            .iter()
            .filter(|r| r.completed_at >= since)
            .count()
    }

    #[must_use]
    pub fn last_completed_by(&self) -> Option<CompletedBy> {
        self.history.last().map(|r| r.completed_by)
    }

    /// Next scheduled due time, for daily and weekly triggers.
    #[must_use]
    pub fn next_due(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.trigger.next_trigger(now)
    }

    /// Earliest instant at which the chore should be announced.
    ///
    /// Only defined while `due` or `started`. With both settings present the
    /// later of the two wins.
    #[must_use]
    pub fn notify_after(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        if !self.state.is_due_like() {
            return None;
        }
        let due_since = self.due_since?.with_timezone(now.offset());

        let after_minutes = self
            .notify_after_minutes
            .map(|m| due_since + TimeDelta::minutes(i64::from(m)));
        let at_time = self.notify_at.map(|time| {
            let candidate = time.same_day_as(due_since);
            if candidate < due_since {
                candidate + TimeDelta::days(1)
            } else {
                candidate
            }
        });
        after_minutes.max(at_time)
    }

    /// Entities the host must report changes for.
    #[must_use]
    pub fn watched_entities(&self) -> Vec<&str> {
        let mut entities = self.trigger.watched_entities();
        for entity in self.completion.watched_entities() {
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        }
        entities
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Move to `new`. Returns the previous state if it changed.
    fn set_state(&mut self, new: ChoreState, forced: bool, now: DateTime<Utc>) -> Option<ChoreState> {
        if new == self.state {
            return None;
        }
        let previous = self.state;
        self.state = new;
        self.state_entered_at = Some(now);
        self.forced = forced;

        match new {
            ChoreState::Due => self.due_since = Some(now),
            ChoreState::Started => {}
            ChoreState::Completed => {
                self.due_since = None;
                self.last_completed = Some(now);
                self.record_completion(forced, now);
            }
            ChoreState::Inactive | ChoreState::Pending => self.due_since = None,
        }
        Some(previous)
    }

    fn record_completion(&mut self, forced: bool, now: DateTime<Utc>) {
        let completed_by = if forced {
            CompletedBy::Forced
        } else if self.completion.detector_type() == DetectorType::Manual {
            CompletedBy::Manual
        } else {
            CompletedBy::Sensor
        };
        self.history.push(CompletionRecord {
            completed_at: now,
            completed_by,
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    fn transition(&self, previous: Option<ChoreState>) -> Option<Transition> {
        previous.map(|previous| Transition {
            previous,
            current: self.state,
            forced: self.forced,
        })
    }

    /// Poll both stages, then fire at most one transition.
    ///
    /// Returns the previous state if a transition fired.
    pub fn evaluate(&mut self, ctx: &Context<'_>) -> Option<ChoreState> {
        let now = ctx.utc();
        let trigger = self.trigger.evaluate(ctx);
        let completion = self.completion.evaluate(ctx);

        match self.state {
            ChoreState::Inactive | ChoreState::Pending if trigger == SubState::Done => {
                self.completion.enable(ctx);
                self.set_state(ChoreState::Due, false, now)
            }
            ChoreState::Inactive if trigger == SubState::Active => {
                self.set_state(ChoreState::Pending, false, now)
            }
            ChoreState::Pending if trigger == SubState::Idle => {
                self.set_state(ChoreState::Inactive, false, now)
            }
            ChoreState::Due | ChoreState::Started if completion == SubState::Done => {
                self.set_state(ChoreState::Completed, false, now)
            }
            ChoreState::Due if completion == SubState::Active => {
                self.set_state(ChoreState::Started, false, now)
            }
            ChoreState::Completed => {
                let completed_at = self.state_entered_at.unwrap_or(now);
                if !self.reset.should_reset(completed_at, ctx.now) {
                    return None;
                }
                self.trigger.reset(now);
                self.completion.reset(now);
                self.set_state(ChoreState::Inactive, false, now)
            }
            _ => None,
        }
    }

    /// Route an external transition to both stages, re-evaluating after each
    /// stage that asks for it.
    pub fn handle_change(&mut self, change: &StateChange, ctx: &Context<'_>) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if self.trigger.handle_change(change, ctx) {
            let previous = self.evaluate(ctx);
            transitions.extend(self.transition(previous));
        }
        if self.completion.handle_change(change, ctx) {
            let previous = self.evaluate(ctx);
            transitions.extend(self.transition(previous));
        }
        transitions
    }

    /// Like [`Chore::evaluate`], reported as a [`Transition`].
    pub fn poll(&mut self, ctx: &Context<'_>) -> Option<Transition> {
        let previous = self.evaluate(ctx);
        self.transition(previous)
    }

    // =========================================================================
    // FORCE ACTIONS
    // =========================================================================

    /// Make the chore due from any state. A no-op when already due, so
    /// completion progress is kept.
    pub fn force_due(&mut self, ctx: &Context<'_>) -> Option<Transition> {
        if self.state == ChoreState::Due {
            return None;
        }
        let now = ctx.utc();
        self.trigger.set_state(SubState::Done, now);
        self.completion.reset(now);
        self.completion.enable(ctx);
        let previous = self.set_state(ChoreState::Due, true, now);
        self.transition(previous)
    }

    /// Make the chore inactive from any state.
    pub fn force_inactive(&mut self, ctx: &Context<'_>) -> Option<Transition> {
        if self.state == ChoreState::Inactive {
            return None;
        }
        let now = ctx.utc();
        self.trigger.reset(now);
        self.completion.reset(now);
        let previous = self.set_state(ChoreState::Inactive, true, now);
        self.transition(previous)
    }

    /// Mark the chore completed from any state.
    pub fn force_complete(&mut self, ctx: &Context<'_>) -> Option<Transition> {
        if self.state == ChoreState::Completed {
            return None;
        }
        let now = ctx.utc();
        self.completion.set_state(SubState::Done, now);
        self.completion.disable();
        let previous = self.set_state(ChoreState::Completed, true, now);
        self.transition(previous)
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// Earliest instant at which a poll may change this chore.
    #[must_use]
    pub fn next_deadline(&self, ctx: &Context<'_>) -> Option<DateTime<Utc>> {
        let reset_at = if self.state == ChoreState::Completed {
            let completed_at = self.state_entered_at.unwrap_or_else(|| ctx.utc());
            match self.reset.next_reset_at(completed_at, ctx.now) {
                Some(at) => Some(at.with_timezone(&Utc)),
                None => Some(ctx.utc()),
            }
        } else {
            None
        };
        [
            self.trigger.next_deadline(ctx),
            self.completion.next_deadline(ctx),
            reset_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> ChoreSnapshot {
        ChoreSnapshot {
            chore_state: self.state,
            state_entered_at: self.state_entered_at,
            due_since: self.due_since,
            last_completed: self.last_completed,
            forced: self.forced,
            trigger: self.trigger.snapshot(),
            completion: self.completion.snapshot(),
            completion_history: self.history.clone(),
        }
    }

    /// Restore persisted state. `due_since` is dropped outside `due`/`started`
    /// and back-filled from the state entry time inside them.
    pub fn restore(&mut self, snap: &ChoreSnapshot) {
        self.state = snap.chore_state;
        self.state_entered_at = snap.state_entered_at;
        self.due_since = if snap.chore_state.is_due_like() {
            snap.due_since.or(snap.state_entered_at)
        } else {
            None
        };
        self.last_completed = snap.last_completed;
        self.forced = snap.forced;
        self.trigger.restore(&snap.trigger);
        self.completion.restore(&snap.completion);

        let skip = snap.completion_history.len().saturating_sub(HISTORY_LIMIT);
        self.history = snap.completion_history[skip..].to_vec();
    }

    // =========================================================================
    // PRESENTATION
    // =========================================================================

    #[must_use]
    pub fn status(&self, ctx: &Context<'_>) -> ChoreStatus {
        let notify_after = self.notify_after(ctx.now);
        let should_notify =
            self.state.is_due_like() && notify_after.is_none_or(|at| ctx.now >= at);
        ChoreStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            state: self.state,
            state_label: self.state_label().to_string(),
            state_entered_at: self.state_entered_at,
            due_since: self.due_since,
            last_completed: self.last_completed,
            last_completed_by: self.last_completed_by(),
            forced: self.forced,
            next_due: self.next_due(ctx.now),
            notify_after,
            should_notify,
            trigger_type: self.trigger.detector_type().to_string(),
            trigger_state: self.trigger.state(),
            completion_type: self.completion.detector_type().to_string(),
            completion_state: self.completion.state(),
            steps_done: self.completion.steps_done(),
            steps_total: self.completion.steps_total(),
            reset_type: self.reset.as_str().to_string(),
            completion_count: self.history.len(),
            description: self.description.clone(),
            context: self.context.clone(),
        }
    }

    /// Full internal picture: status, stage attributes and raw snapshot.
    #[must_use]
    pub fn diagnostics(&self, ctx: &Context<'_>) -> serde_json::Value {
        let completed_at = (self.state == ChoreState::Completed)
            .then_some(self.state_entered_at)
            .flatten();
        serde_json::json!({
            "status": self.status(ctx),
            "trigger": self.trigger.attributes(ctx),
            "completion": self.completion.attributes(ctx),
            "reset": self.reset.attributes(completed_at, ctx.now),
            "notify_at": self.notify_at.map(|t| t.to_string()),
            "notify_after_minutes": self.notify_after_minutes,
            "watched_entities": self.watched_entities(),
            "snapshot": self.snapshot(),
        })
    }
}
