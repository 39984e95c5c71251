//! # Poll Loop
//!
//! Drives the registry over time: a fixed-interval tick plus an early
//! wake-up at the registry's next deadline (debounce, cooldown, schedule
//! edges, resets). Every tick writes the snapshot back to the state file.

use crate::api::{self, AppState};
use crate::config::HostConfig;
use crate::store::StateStore;
use chores_core::{ChoreError, ChoreEvent, LoadReport, Registry};
use chrono::{DateTime, FixedOffset, Local};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Shortest sleep before a deadline wake-up.
const MIN_WAKE: Duration = Duration::from_secs(1);

/// The local wall-clock time, with its current UTC offset.
#[must_use]
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

// =============================================================================
// LOGGING
// =============================================================================

/// Log chore transitions on the `chores::events` target.
pub fn log_events<'a>(events: impl IntoIterator<Item = &'a ChoreEvent>) {
    for event in events {
        tracing::info!(
            target: "chores::events",
            chore_id = %event.chore_id,
            event = event.event.as_str(),
            previous_state = event.previous_state.as_str(),
            new_state = event.new_state.as_str(),
            forced = event.forced,
            "{}", event.chore_name
        );
    }
}

pub fn log_load_report(report: &LoadReport) {
    for issue in &report.skipped {
        tracing::warn!(chore_id = %issue.chore_id, "Chore skipped: {}", issue.error);
    }
    for issue in &report.discarded_snapshots {
        tracing::warn!(chore_id = %issue.chore_id, "Persisted state discarded: {}", issue.error);
    }
    tracing::info!(
        loaded = report.loaded.len(),
        restored = report.restored,
        skipped = report.skipped.len(),
        "Chores loaded"
    );
}

/// Build the registry from configuration and the state file.
pub fn load_registry(config: &HostConfig, store: &StateStore) -> (Registry, LoadReport) {
    let snapshot = store.load();
    let (registry, report) = Registry::load(config.chores.iter().cloned(), &snapshot);
    log_load_report(&report);
    (registry, report)
}

// =============================================================================
// TICK
// =============================================================================

/// Evaluate every chore once and write the snapshot back.
pub async fn tick(state: &AppState, store: &StateStore) -> Vec<ChoreEvent> {
    let now = state.now();
    let mut registry = state.registry.write().await;
    let events = registry.poll(now);
    log_events(&events);

    if let Err(e) = persist(&registry, store) {
        tracing::error!("Failed to save state: {}", e);
    }
    events
}

fn persist(registry: &Registry, store: &StateStore) -> Result<(), ChoreError> {
    store.save(&registry.snapshot()?)
}

/// Time until the registry's next deadline, if any.
async fn next_wake(state: &AppState) -> Option<Duration> {
    let now = state.now();
    let deadline = state.registry.read().await.next_deadline(now)?;
    let remaining = (deadline - now.to_utc()).to_std().unwrap_or(Duration::ZERO);
    Some(remaining.max(MIN_WAKE))
}

async fn sleep_or_wait(wake: Option<Duration>) {
    match wake {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}

/// Tick until `shutdown` flips to `true`.
pub async fn poll_loop(
    state: AppState,
    store: StateStore,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let wake = next_wake(&state).await;
        tokio::select! {
            _ = ticker.tick() => {}
            () = sleep_or_wait(wake) => {
                tracing::debug!("Deadline wake-up");
            }
            () = state.rescheduled() => {
                tracing::trace!("Input received, recomputing wake-up");
                continue;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
        tick(&state, &store).await;
    }

    // Final write so nothing since the last tick is lost.
    let registry = state.registry.read().await;
    if let Err(e) = persist(&registry, &store) {
        tracing::error!("Failed to save state on shutdown: {}", e);
    }
    tracing::info!("Poll loop stopped");
}

// =============================================================================
// RUN
// =============================================================================

async fn shutdown_signal(tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    let _ = tx.send(true);
}

/// Run the poll loop and the HTTP server until Ctrl+C.
pub async fn run(config: HostConfig, store: StateStore, listen: &str) -> Result<(), ChoreError> {
    let (registry, _) = load_registry(&config, &store);
    let state = AppState::new(registry);

    let (tx, rx) = watch::channel(false);
    let poller = tokio::spawn(poll_loop(
        state.clone(),
        store,
        config.poll_interval(),
        rx,
    ));

    let served = api::serve(listen, state, shutdown_signal(tx)).await;
    if served.is_err() {
        poller.abort();
    }
    if let Err(e) = poller.await
        && !e.is_cancelled()
    {
        tracing::error!("Poll loop failed: {}", e);
    }
    served
}
