//! Axum handlers for the API routes.
//!
//! Each handler receives [`AppState`] via [`axum::extract::State`] and
//! returns an axum [`Response`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::AppState;
use crate::catalog::{BANKING_CATALOG, DEFAULT_SCOPE_COLUMN};
use crate::error::{AuthFailure, SentraError};
use crate::llm::{AgentRequest, AgentResponse, AthenaQueryInput};

/// Customer listing behind `/users`.
pub(super) const USERS_SQL: &str =
    "SELECT CIF_NO,CUSTOMER_NAME,MOBILE_PHONE,EMAIL_ADDRESS FROM dm_customer_master";

// Request types

#[derive(Debug, Deserialize)]
pub(super) struct QueryRequest {
    #[serde(default)]
    user_query: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UsersRequest {
    #[serde(default)]
    user_id: Option<String>,
}

// Helpers

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing(code: &str, field: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        json_error(code, format!("{field} is required")),
    )
        .into_response()
}

// Handlers

/// POST /query
pub(super) async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Response {
    let Some(user_id) = present(req.user_id) else {
        return missing("missing_actor_id", "user_id");
    };
    let Some(session_id) = present(req.session_id) else {
        return missing("missing_session_id", "session_id");
    };
    let Some(user_query) = present(req.user_query) else {
        return missing("missing_user_query", "user_query");
    };

    let request = AgentRequest {
        user_query,
        user_id,
        session_id,
    };

    match tokio::time::timeout(state.request_timeout, state.agent.ask(&request)).await {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(e)) => {
            error!(
                user_id = %request.user_id,
                session_id = %request.session_id,
                category = e.category(),
                error = %e,
                "Agent request failed"
            );
            let response = AgentResponse::text(format!(
                "Something went wrong while executing the query. Check the logs for more details. Error: {e}"
            ));
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(_) => {
            warn!(
                user_id = %request.user_id,
                session_id = %request.session_id,
                timeout_secs = state.request_timeout.as_secs(),
                "Agent request timed out"
            );
            (
                StatusCode::GATEWAY_TIMEOUT,
                json_error("timeout", "The request took too long to complete"),
            )
                .into_response()
        }
    }
}

/// POST /login
pub(super) async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    let (Some(username), Some(password)) = (present(req.username), present(req.password)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username and password are required" })),
        )
            .into_response();
    };

    match state.identity.login(&username, &password).await {
        Ok(tokens) => {
            info!(%username, "Login succeeded");
            (StatusCode::OK, Json(tokens)).into_response()
        }
        Err(e) => {
            let (status, message) = match e.auth_failure() {
                Some(AuthFailure::NotAuthorized) => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid username or password".to_string(),
                ),
                Some(AuthFailure::NotConfirmed) => {
                    (StatusCode::FORBIDDEN, "User is not confirmed".to_string())
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            };
            warn!(%username, status = status.as_u16(), error = %e, "Login failed");
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// POST /users
///
/// Lists the customers the caller may see. Rows whose customer number does
/// not carry the `CIF` prefix are dropped.
pub(super) async fn users(State(state): State<AppState>, Json(req): Json<UsersRequest>) -> Response {
    let Some(user_id) = present(req.user_id) else {
        return missing("missing_actor_id", "user_id");
    };

    let input = AthenaQueryInput {
        sql: USERS_SQL.to_string(),
        database: BANKING_CATALOG.to_string(),
    };

    let outcome = match state.agent.run_query(&input, &user_id).await {
        Ok(outcome) => outcome,
        Err(e @ SentraError::Policy(_)) => {
            warn!(%user_id, error = %e, "Customer listing denied");
            return (StatusCode::FORBIDDEN, json_error("access_denied", e)).into_response();
        }
        Err(e) => {
            error!(%user_id, error = %e, "Customer listing failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response();
        }
    };

    let execution_id = outcome.handle().as_str().to_string();
    match outcome.rows() {
        Some(rows) => {
            let rows: Vec<_> = rows
                .iter()
                .filter(|row| {
                    row.get(DEFAULT_SCOPE_COLUMN)
                        .and_then(Value::as_str)
                        .is_some_and(|cif| cif.starts_with("CIF"))
                })
                .cloned()
                .collect();
            info!(%user_id, query_id = %execution_id, rows = rows.len(), "Listed customers");
            Json(json!({ "status": "ok", "execution_id": execution_id, "rows": rows })).into_response()
        }
        None => Json(json!({
            "status": "error",
            "execution_id": execution_id,
            "state": outcome.state_name(),
        }))
        .into_response(),
    }
}

/// GET /health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "catalogs": state.agent.catalogs().names(),
    }))
    .into_response()
}
