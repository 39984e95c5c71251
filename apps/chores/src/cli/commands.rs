//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::ForceAction;
use crate::config::HostConfig;
use crate::runner::{self, local_now, log_events};
use crate::store::StateStore;
use chores_core::{ChoreError, ChoreStatus, Registry};
use std::path::Path;

fn print_json(value: &impl serde::Serialize) -> Result<(), ChoreError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ChoreError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_status_line(status: &ChoreStatus) {
    println!(
        "{:<24} {:<10} {}",
        status.id, status.state_label, status.name
    );
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Start the poll loop and the HTTP server.
pub async fn cmd_run(
    config_path: &Path,
    state_path: &Path,
    listen: Option<String>,
) -> Result<(), ChoreError> {
    let config = HostConfig::load(config_path)?;
    let listen = listen.unwrap_or_else(|| config.listen.clone());

    println!("Chores Engine Starting...");
    println!();
    println!("Configuration:");
    println!("  Config:        {}", config_path.display());
    println!("  State file:    {}", state_path.display());
    println!("  Listen:        {}", listen);
    println!("  Poll interval: {}s", config.poll_interval_secs);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    runner::run(config, StateStore::new(state_path), &listen).await
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate every chore definition without touching the state file.
pub fn cmd_check(config_path: &Path, json_mode: bool) -> Result<(), ChoreError> {
    let config = HostConfig::load(config_path)?;
    let (_, report) = Registry::load(config.chores, &chores_core::StoreSnapshot::new());

    if json_mode {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|issue| serde_json::json!({"id": issue.chore_id, "error": issue.error.to_string()}))
            .collect();
        print_json(&serde_json::json!({
            "valid": report.skipped.is_empty(),
            "loaded": report.loaded,
            "skipped": skipped,
        }))?;
    } else {
        for id in &report.loaded {
            println!("  ok    {}", id);
        }
        for issue in &report.skipped {
            println!("  FAIL  {}: {}", issue.chore_id, issue.error);
        }
    }

    if report.skipped.is_empty() {
        Ok(())
    } else {
        Err(ChoreError::Config(format!(
            "{} chore(s) failed to load",
            report.skipped.len()
        )))
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show chore states as persisted in the state file.
pub fn cmd_status(
    config_path: &Path,
    state_path: &Path,
    json_mode: bool,
    id: Option<&str>,
) -> Result<(), ChoreError> {
    let config = HostConfig::load(config_path)?;
    let (registry, _) = runner::load_registry(&config, &StateStore::new(state_path));
    let now = local_now();

    let statuses = match id {
        Some(id) => vec![registry.status(id, now)?],
        None => registry.statuses(now),
    };

    if json_mode {
        return print_json(&statuses);
    }

    println!("Chores");
    println!("======");
    for status in &statuses {
        print_status_line(status);
    }
    Ok(())
}

// =============================================================================
// FORCE COMMAND
// =============================================================================

/// Apply a force command to the persisted state.
pub fn cmd_force(
    config_path: &Path,
    state_path: &Path,
    json_mode: bool,
    id: &str,
    action: ForceAction,
) -> Result<(), ChoreError> {
    let config = HostConfig::load(config_path)?;
    let store = StateStore::new(state_path);
    let (mut registry, _) = runner::load_registry(&config, &store);
    let now = local_now();

    let event = match action {
        ForceAction::Due => registry.force_due(id, now),
        ForceAction::Inactive => registry.force_inactive(id, now),
        ForceAction::Complete => registry.force_complete(id, now),
    }?;
    log_events(event.iter());
    store.save(&registry.snapshot()?)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "changed": event.is_some(),
            "event": event,
        }));
    }

    match &event {
        Some(event) => println!(
            "{}: {} -> {}",
            id,
            event.previous_state.as_str(),
            event.new_state.as_str()
        ),
        None => println!("{}: unchanged", id),
    }
    Ok(())
}
