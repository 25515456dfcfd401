//! HTTP API integration tests.

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use sentra_agent::llm::MockLlmClient;
use sentra_agent::query::{ExecutionState, ExecutionStatus, MockQueryService};
use serde_json::json;

use super::{harness, harness_with, post, send};

fn customer_llm() -> MockLlmClient {
    MockLlmClient::new().with_query(
        "customers",
        "sentra_db",
        "SELECT CIF_NO, CUSTOMER_NAME FROM DM_CUSTOMER_MASTER",
    )
}

#[tokio::test]
async fn test_query_requires_user_id() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(
        &h.router,
        "/query",
        json!({"user_query": "hello", "session_id": "s1"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "missing_actor_id", "message": "user_id is required"})
    );
}

#[tokio::test]
async fn test_query_requires_session_id() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(
        &h.router,
        "/query",
        json!({"user_query": "hello", "user_id": "vishal.saxena", "session_id": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_session_id");
    assert_eq!(body["message"], "session_id is required");
}

#[tokio::test]
async fn test_query_returns_agent_response() {
    let h = harness(customer_llm()).await;

    let (status, body) = post(
        &h.router,
        "/query",
        json!({
            "user_query": "list customers",
            "user_id": "vishal.saxena",
            "session_id": "s1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "text");
    assert_eq!(body["customer_specific"], "False");
    assert_eq!(body["explanation"], "Found 4 matching records.");
    assert_eq!(
        body["query_executed"],
        "SELECT CIF_NO, CUSTOMER_NAME FROM DM_CUSTOMER_MASTER"
    );

    let submitted = h.queries.submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0]
        .sql
        .contains("CIF_NO BETWEEN 'CIF200000' AND 'CIF200025'"));
    assert_eq!(h.store.event_count(), 2);
}

#[tokio::test]
async fn test_query_agent_failure_is_text_response() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(
        &h.router,
        "/query",
        json!({"user_query": "hello", "user_id": "!nobody", "session_id": "s1"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "text");
    assert!(body["explanation"]
        .as_str()
        .unwrap()
        .starts_with("Something went wrong while executing the query."));
}

#[tokio::test]
async fn test_query_timeout_is_gateway_timeout() {
    let queries =
        MockQueryService::new().with_states(vec![ExecutionStatus::new(ExecutionState::Running)]);
    let h = harness_with(customer_llm(), queries, Duration::from_millis(100)).await;

    let (status, body) = post(
        &h.router,
        "/query",
        json!({
            "user_query": "list customers",
            "user_id": "kamaljeet.singh",
            "session_id": "s1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "timeout");

    // The abandoned statement is stopped in the background.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.queries.stopped().len(), 1);
}

#[tokio::test]
async fn test_login_success_returns_tokens() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(
        &h.router,
        "/login",
        json!({"username": "vishal.saxena", "password": "correct-horse"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body["id_token"].as_str().unwrap().contains("vishal.saxena"));
}

#[tokio::test]
async fn test_login_status_codes() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(&h.router, "/login", json!({"username": "vishal.saxena"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Username and password are required"}));

    let (status, body) = post(
        &h.router,
        "/login",
        json!({"username": "vishal.saxena", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid username or password"}));

    let (status, body) = post(
        &h.router,
        "/login",
        json!({"username": "new.joiner", "password": "welcome1"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "User is not confirmed"}));
}

#[tokio::test]
async fn test_users_drops_non_cif_rows() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(&h.router, "/users", json!({"user_id": "kamaljeet.singh"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["execution_id"], "mock-query-1");
    let cifs: Vec<&str> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["CIF_NO"].as_str().unwrap())
        .collect();
    assert_eq!(cifs, vec!["CIF200001", "CIF200018", "CIF200042"]);

    // Unrestricted persona runs the listing unchanged
    assert_eq!(
        h.queries.submitted()[0].sql,
        "SELECT CIF_NO,CUSTOMER_NAME,MOBILE_PHONE,EMAIL_ADDRESS FROM dm_customer_master"
    );
}

#[tokio::test]
async fn test_users_applies_scope() {
    let h = harness(MockLlmClient::new()).await;

    let (status, _) = post(&h.router, "/users", json!({"user_id": "harsh.kumar"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(h.queries.submitted()[0]
        .sql
        .contains("BETWEEN 'CIF200026' AND 'CIF200099'"));
}

#[tokio::test]
async fn test_users_unknown_persona_is_forbidden() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = post(&h.router, "/users", json!({"user_id": "stranger"})).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
    assert!(h.queries.submitted().is_empty());
}

#[tokio::test]
async fn test_users_failed_statement_reports_state() {
    let queries = MockQueryService::new().with_states(vec![ExecutionStatus::with_reason(
        ExecutionState::Failed,
        "TABLE_NOT_FOUND",
    )]);
    let h = harness_with(MockLlmClient::new(), queries, Duration::from_secs(30)).await;

    let (status, body) = post(&h.router, "/users", json!({"user_id": "kamaljeet.singh"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "error", "execution_id": "mock-query-1", "state": "FAILED"})
    );
}

#[tokio::test]
async fn test_users_requires_user_id() {
    let h = harness(MockLlmClient::new()).await;
    let (status, body) = post(&h.router, "/users", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_actor_id");
}

#[tokio::test]
async fn test_health() {
    let h = harness(MockLlmClient::new()).await;

    let (status, body) = send(&h.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "catalogs": ["sentra_db", "insurance_db"]})
    );
}
