//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ApiError, ChoreListResponse, EntityUpdateRequest, EntityUpdateResponse, ForceResponse,
        HealthResponse,
    },
};
use crate::runner::log_events;
use axum::{
    Json,
    extract::{Path, State},
};
use chores_core::{ChoreError, ChoreEvent, ChoreStatus, Registry};
use chrono::{DateTime, FixedOffset};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.registry.read().await;
    Json(HealthResponse::new(registry.len()))
}

// =============================================================================
// CHORE HANDLERS
// =============================================================================

/// Status of every chore.
pub async fn list_chores_handler(State(state): State<AppState>) -> Json<ChoreListResponse> {
    let now = state.now();
    let registry = state.registry.read().await;
    Json(ChoreListResponse {
        chores: registry.statuses(now),
    })
}

/// Status of one chore.
pub async fn get_chore_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChoreStatus>, ApiError> {
    let now = state.now();
    let registry = state.registry.read().await;
    Ok(Json(registry.status(&id, now)?))
}

// =============================================================================
// FORCE HANDLERS
// =============================================================================

type ForceAction = fn(
    &mut Registry,
    &str,
    DateTime<FixedOffset>,
) -> Result<Option<ChoreEvent>, ChoreError>;

async fn force(
    state: &AppState,
    id: &str,
    action: ForceAction,
) -> Result<Json<ForceResponse>, ApiError> {
    let now = state.now();
    let mut registry = state.registry.write().await;
    match action(&mut *registry, id, now) {
        Ok(event) => {
            log_events(event.iter());
            state.reschedule();
            Ok(Json(ForceResponse::from(event)))
        }
        Err(e) => {
            tracing::warn!(chore_id = %id, "Force command rejected: {}", e);
            Err(e.into())
        }
    }
}

pub async fn force_due_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ForceResponse>, ApiError> {
    force(&state, &id, Registry::force_due).await
}

pub async fn force_inactive_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ForceResponse>, ApiError> {
    force(&state, &id, Registry::force_inactive).await
}

pub async fn force_complete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ForceResponse>, ApiError> {
    force(&state, &id, Registry::force_complete).await
}

// =============================================================================
// ENTITY HANDLER
// =============================================================================

/// Record an entity reading and return the events it produced.
pub async fn entity_handler(
    State(state): State<AppState>,
    Json(request): Json<EntityUpdateRequest>,
) -> Result<Json<EntityUpdateResponse>, ApiError> {
    request.validate()?;

    let now = state.now();
    let mut registry = state.registry.write().await;
    let events = match request.state.as_deref() {
        Some(value) => registry.update_entity(&request.entity_id, value, now),
        None => registry.remove_entity(&request.entity_id, now),
    };
    log_events(events.iter());
    state.reschedule();

    Ok(Json(EntityUpdateResponse { events }))
}

// =============================================================================
// DIAGNOSTICS HANDLER
// =============================================================================

pub async fn diagnostics_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let now = state.now();
    let registry = state.registry.read().await;
    Json(registry.diagnostics(now))
}
