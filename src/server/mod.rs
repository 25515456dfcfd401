//! HTTP API for Sentra.
//!
//! ```text
//! POST /query   {user_query, user_id, session_id} -> agent response
//! POST /login   {username, password}              -> tokens
//! POST /users   {user_id}                         -> customer listing
//! GET  /health
//! ```
//!
//! The server runs until the [`CancellationToken`] passed to [`serve`] is
//! cancelled.

mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::IdentityProvider;
use crate::error::{Result, SentraError};
use crate::llm::AgentService;

/// Default deadline for one `/query` request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Router state injected into every handler.
///
/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(agent: Arc<AgentService>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            agent,
            identity,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Builds the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(api::query))
        .route("/login", post(api::login))
        .route("/users", post(api::users))
        .route("/health", get(api::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the API until `shutdown` is cancelled.
pub async fn serve(addr: &str, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SentraError::config(format!("Failed to bind {addr}: {e}")))?;

    info!(%addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SentraError::internal(format!("HTTP server error: {e}")))?;

    info!("HTTP API shut down");
    Ok(())
}
