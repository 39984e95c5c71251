//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chores_core::{ChoreError, ChoreEvent, ChoreStatus};
use serde::{Deserialize, Serialize};

/// Maximum length of an entity id.
pub const MAX_ENTITY_ID_LENGTH: usize = 255;

/// Maximum length of an entity state value.
pub const MAX_STATE_LENGTH: usize = 255;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chore_count: usize,
}

impl HealthResponse {
    #[must_use]
    pub fn new(chore_count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chore_count,
        }
    }
}

// =============================================================================
// CHORES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoreListResponse {
    pub chores: Vec<ChoreStatus>,
}

/// Result of a force command. `changed` is false when the chore was already
/// in the requested state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceResponse {
    pub changed: bool,
    pub event: Option<ChoreEvent>,
}

impl From<Option<ChoreEvent>> for ForceResponse {
    fn from(event: Option<ChoreEvent>) -> Self {
        Self {
            changed: event.is_some(),
            event,
        }
    }
}

// =============================================================================
// ENTITY UPDATES
// =============================================================================

/// A new reading for an entity. `state: null` means the entity is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityUpdateRequest {
    pub entity_id: String,
    pub state: Option<String>,
}

impl EntityUpdateRequest {
    /// Reject empty or oversized fields before they reach the engine.
    pub fn validate(&self) -> Result<(), ChoreError> {
        if self.entity_id.trim().is_empty() {
            return Err(ChoreError::config("entity_id must not be empty"));
        }
        if self.entity_id.len() > MAX_ENTITY_ID_LENGTH {
            return Err(ChoreError::Config(format!(
                "entity_id length {} exceeds maximum {} bytes",
                self.entity_id.len(),
                MAX_ENTITY_ID_LENGTH
            )));
        }
        if let Some(state) = &self.state
            && state.len() > MAX_STATE_LENGTH
        {
            return Err(ChoreError::Config(format!(
                "state length {} exceeds maximum {} bytes",
                state.len(),
                MAX_STATE_LENGTH
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityUpdateResponse {
    pub events: Vec<ChoreEvent>,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A `ChoreError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ChoreError);

impl From<ChoreError> for ApiError {
    fn from(error: ChoreError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChoreError::ChoreNotFound(_) => StatusCode::NOT_FOUND,
            ChoreError::Config(_) | ChoreError::DuplicateChore(_) => StatusCode::BAD_REQUEST,
            ChoreError::SerializationError(_) | ChoreError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
