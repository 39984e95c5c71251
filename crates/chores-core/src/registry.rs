//! # Registry
//!
//! The registry is the only entry point a host needs: it owns every chore and
//! the cache of external entity readings, and turns host input (entity
//! updates, poll ticks, force commands) into [`ChoreEvent`]s.
//!
//! Nothing here is global. A host creates one registry, feeds it, persists
//! [`Registry::snapshot`] on its own schedule, and publishes the returned
//! events however it likes.

use crate::chore::{Chore, ChoreStatus, Transition};
use crate::config::ChoreConfig;
use crate::formats::{ChoreSnapshot, StoreSnapshot};
use crate::types::{ChoreError, ChoreState, Context, EntityStates, StateChange};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// EVENTS
// =============================================================================

/// Event emitted on entry into a chore state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "chores.chore_pending")]
    Pending,
    #[serde(rename = "chores.chore_due")]
    Due,
    #[serde(rename = "chores.chore_started")]
    Started,
    #[serde(rename = "chores.chore_completed")]
    Completed,
    /// Back to `inactive`.
    #[serde(rename = "chores.chore_reset")]
    Reset,
}

impl EventKind {
    #[must_use]
    pub fn for_state(state: ChoreState) -> Self {
        match state {
            ChoreState::Inactive => EventKind::Reset,
            ChoreState::Pending => EventKind::Pending,
            ChoreState::Due => EventKind::Due,
            ChoreState::Started => EventKind::Started,
            ChoreState::Completed => EventKind::Completed,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pending => "chores.chore_pending",
            EventKind::Due => "chores.chore_due",
            EventKind::Started => "chores.chore_started",
            EventKind::Completed => "chores.chore_completed",
            EventKind::Reset => "chores.chore_reset",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chore state transition, as published to the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreEvent {
    pub event: EventKind,
    pub chore_id: String,
    pub chore_name: String,
    pub previous_state: ChoreState,
    pub new_state: ChoreState,
    pub forced: bool,
}

impl ChoreEvent {
    fn new(chore: &Chore, transition: Transition) -> Self {
        Self {
            event: EventKind::for_state(transition.current),
            chore_id: chore.id().to_string(),
            chore_name: chore.name().to_string(),
            previous_state: transition.previous,
            new_state: transition.current,
            forced: transition.forced,
        }
    }
}

// =============================================================================
// LOAD REPORT
// =============================================================================

/// A chore definition or snapshot that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    /// Chore id, or `#<index>` when the definition had none.
    pub chore_id: String,
    pub error: ChoreError,
}

/// Outcome of [`Registry::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Chores registered, in configuration order.
    pub loaded: Vec<String>,
    /// Chores that failed construction and were left out.
    pub skipped: Vec<LoadIssue>,
    /// Chores whose persisted snapshot was corrupt; they start fresh.
    pub discarded_snapshots: Vec<LoadIssue>,
    /// Chores with a persisted snapshot that was applied.
    pub restored: usize,
}

impl LoadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.discarded_snapshots.is_empty()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Registry {
    chores: BTreeMap<String, Chore>,
    states: EntityStates,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from raw chore definitions and a persisted store.
    ///
    /// Never fails as a whole: bad definitions are skipped and corrupt
    /// snapshots discarded, both listed in the report.
    pub fn load<I>(configs: I, store: &StoreSnapshot) -> (Self, LoadReport)
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        let mut registry = Self::new();
        let mut report = LoadReport::default();

        for (index, raw) in configs.into_iter().enumerate() {
            let label = ChoreConfig::id_of(&raw).map_or_else(|| format!("#{index}"), str::to_string);
            let chore = ChoreConfig::from_value(raw).and_then(|config| Chore::from_config(&config));
            let chore = match chore {
                Ok(chore) => chore,
                Err(error) => {
                    report.skipped.push(LoadIssue {
                        chore_id: label,
                        error,
                    });
                    continue;
                }
            };

            let snapshot = match store.get(chore.id()) {
                Some(Ok(snapshot)) => Some(snapshot),
                Some(Err(error)) => {
                    report.discarded_snapshots.push(LoadIssue {
                        chore_id: chore.id().to_string(),
                        error,
                    });
                    None
                }
                None => None,
            };

            let id = chore.id().to_string();
            match registry.register(chore, snapshot.as_ref()) {
                Ok(()) => {
                    report.restored += usize::from(snapshot.is_some());
                    report.loaded.push(id);
                }
                Err(error) => report.skipped.push(LoadIssue { chore_id: id, error }),
            }
        }
        (registry, report)
    }

    /// Add a chore, restoring it from `snapshot` if given. Ids must be unique.
    pub fn register(
        &mut self,
        mut chore: Chore,
        snapshot: Option<&ChoreSnapshot>,
    ) -> Result<(), ChoreError> {
        if self.chores.contains_key(chore.id()) {
            return Err(ChoreError::DuplicateChore(chore.id().to_string()));
        }
        if let Some(snapshot) = snapshot {
            chore.restore(snapshot);
        }
        self.chores.insert(chore.id().to_string(), chore);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, chore_id: &str) -> Option<&Chore> {
        self.chores.get(chore_id)
    }

    pub fn chores(&self) -> impl Iterator<Item = &Chore> {
        self.chores.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chores.is_empty()
    }

    #[must_use]
    pub fn entity_states(&self) -> &EntityStates {
        &self.states
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    fn dispatch(&mut self, change: &StateChange, now: DateTime<FixedOffset>) -> Vec<ChoreEvent> {
        let ctx = Context::new(now, &self.states);
        let mut events = Vec::new();
        for chore in self.chores.values_mut() {
            for transition in chore.handle_change(change, &ctx) {
                events.push(ChoreEvent::new(chore, transition));
            }
        }
        events
    }

    /// Fire deadlines that passed since the last poll on chores watching
    /// `entity_id`, evaluated at the deadline itself and against the readings
    /// from before the incoming change.
    fn catch_up(&mut self, entity_id: &str, now: DateTime<FixedOffset>) -> Vec<ChoreEvent> {
        let mut events = Vec::new();
        for chore in self.chores.values_mut() {
            let ctx = Context::new(now, &self.states);
            let watches = chore.watched_entities().contains(&entity_id);
            let Some(deadline) = chore.next_deadline(&ctx).filter(|d| *d <= ctx.utc()) else {
                continue;
            };
            if !watches {
                continue;
            }
            let ctx = Context::new(deadline.with_timezone(now.offset()), &self.states);
            events.extend(
                chore
                    .poll(&ctx)
                    .map(|transition| ChoreEvent::new(chore, transition)),
            );
        }
        events
    }

    /// Record a new entity reading and deliver the transition to every chore.
    ///
    /// Expired debounce and cooldown windows on the affected chores fire
    /// first, so a change arriving between polls never lands on stale state.
    pub fn update_entity(
        &mut self,
        entity_id: &str,
        value: &str,
        now: DateTime<FixedOffset>,
    ) -> Vec<ChoreEvent> {
        let mut events = self.catch_up(entity_id, now);
        let change = self.states.set(entity_id, value);
        events.extend(self.dispatch(&change, now));
        events
    }

    /// Forget an entity (it was removed at the source).
    pub fn remove_entity(&mut self, entity_id: &str, now: DateTime<FixedOffset>) -> Vec<ChoreEvent> {
        let mut events = self.catch_up(entity_id, now);
        let change = self.states.remove(entity_id);
        events.extend(self.dispatch(&change, now));
        events
    }

    /// Evaluate every chore once.
    pub fn poll(&mut self, now: DateTime<FixedOffset>) -> Vec<ChoreEvent> {
        let ctx = Context::new(now, &self.states);
        self.chores
            .values_mut()
            .filter_map(|chore| {
                chore
                    .poll(&ctx)
                    .map(|transition| ChoreEvent::new(chore, transition))
            })
            .collect()
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    fn force<F>(
        &mut self,
        chore_id: &str,
        now: DateTime<FixedOffset>,
        action: F,
    ) -> Result<Option<ChoreEvent>, ChoreError>
    where
        F: FnOnce(&mut Chore, &Context<'_>) -> Option<Transition>,
    {
        let ctx = Context::new(now, &self.states);
        let chore = self
            .chores
            .get_mut(chore_id)
            .ok_or_else(|| ChoreError::ChoreNotFound(chore_id.to_string()))?;
        Ok(action(chore, &ctx).map(|transition| ChoreEvent::new(chore, transition)))
    }

    /// `Ok(None)` when the chore was already due.
    pub fn force_due(
        &mut self,
        chore_id: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<ChoreEvent>, ChoreError> {
        self.force(chore_id, now, Chore::force_due)
    }

    pub fn force_inactive(
        &mut self,
        chore_id: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<ChoreEvent>, ChoreError> {
        self.force(chore_id, now, Chore::force_inactive)
    }

    pub fn force_complete(
        &mut self,
        chore_id: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<ChoreEvent>, ChoreError> {
        self.force(chore_id, now, Chore::force_complete)
    }

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Persistable state of every chore.
    pub fn snapshot(&self) -> Result<StoreSnapshot, ChoreError> {
        let mut store = StoreSnapshot::new();
        for chore in self.chores.values() {
            store.insert(chore.id(), &chore.snapshot())?;
        }
        Ok(store)
    }

    /// Earliest instant at which a poll may change any chore.
    #[must_use]
    pub fn next_deadline(&self, now: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
        let ctx = Context::new(now, &self.states);
        self.chores
            .values()
            .filter_map(|chore| chore.next_deadline(&ctx))
            .min()
    }

    #[must_use]
    pub fn statuses(&self, now: DateTime<FixedOffset>) -> Vec<ChoreStatus> {
        let ctx = Context::new(now, &self.states);
        self.chores.values().map(|chore| chore.status(&ctx)).collect()
    }

    pub fn status(
        &self,
        chore_id: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<ChoreStatus, ChoreError> {
        let ctx = Context::new(now, &self.states);
        self.chores
            .get(chore_id)
            .map(|chore| chore.status(&ctx))
            .ok_or_else(|| ChoreError::ChoreNotFound(chore_id.to_string()))
    }

    /// Diagnostics for every chore, keyed by id.
    #[must_use]
    pub fn diagnostics(&self, now: DateTime<FixedOffset>) -> serde_json::Value {
        let ctx = Context::new(now, &self.states);
        let chores: serde_json::Map<String, serde_json::Value> = self
            .chores
            .iter()
            .map(|(id, chore)| (id.clone(), chore.diagnostics(&ctx)))
            .collect();
        serde_json::json!({
            "chore_count": self.chores.len(),
            "entity_count": self.states.len(),
            "chores": chores,
        })
    }
}
