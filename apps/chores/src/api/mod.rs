//! # Chores HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /chores` - Status of every chore
//! - `GET /chores/{id}` - Status of one chore
//! - `POST /chores/{id}/force_due` - Make a chore due
//! - `POST /chores/{id}/force_inactive` - Make a chore inactive
//! - `POST /chores/{id}/force_complete` - Mark a chore completed
//! - `POST /entities` - Report a new entity state
//! - `GET /diagnostics` - Full engine diagnostics
//!
//! ## Configuration (Environment Variables)
//!
//! - `CHORES_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `chores::api::*`)
pub use handlers::{
    diagnostics_handler, entity_handler, force_complete_handler, force_due_handler,
    force_inactive_handler, get_chore_handler, health_handler, list_chores_handler,
};
pub use types::{
    ApiError, ChoreListResponse, EntityUpdateRequest, EntityUpdateResponse, ErrorResponse,
    ForceResponse, HealthResponse, MAX_ENTITY_ID_LENGTH, MAX_STATE_LENGTH,
};

use crate::runner::local_now;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use chores_core::{ChoreError, Registry};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Source of the current wall-clock time.
pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// Shared state: the registry behind a lock, the clock handlers use, and a
/// signal telling the poll loop its next deadline may have moved.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    clock: Clock,
    rescheduled: Arc<Notify>,
}

impl AppState {
    /// State reading the local system clock.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self::with_clock(registry, local_now)
    }

    #[must_use]
    pub fn with_clock<F>(registry: Registry, clock: F) -> Self
    where
        F: Fn() -> DateTime<FixedOffset> + Send + Sync + 'static,
    {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            clock: Arc::new(clock),
            rescheduled: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        (self.clock)()
    }

    /// Ask the poll loop to recompute its wake-up after out-of-band input.
    pub fn reschedule(&self) {
        self.rescheduled.notify_one();
    }

    /// Resolves after the next [`AppState::reschedule`].
    pub async fn rescheduled(&self) {
        self.rescheduled.notified().await;
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `CHORES_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CHORES_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (CHORES_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in CHORES_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::debug!("CORS: No CHORES_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Localhost-only CORS.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/chores", get(handlers::list_chores_handler))
        .route("/chores/{id}", get(handlers::get_chore_handler))
        .route("/chores/{id}/force_due", post(handlers::force_due_handler))
        .route(
            "/chores/{id}/force_inactive",
            post(handlers::force_inactive_handler),
        )
        .route(
            "/chores/{id}/force_complete",
            post(handlers::force_complete_handler),
        )
        .route("/entities", post(handlers::entity_handler))
        .route("/diagnostics", get(handlers::diagnostics_handler))
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> Result<(), ChoreError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChoreError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Chores HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ChoreError::IoError(format!("Server error: {}", e)))
}
