//! Integration tests for Sentra.
//!
//! Drives the HTTP router and the agent with mock backends.

pub mod agent_test;
pub mod api_test;
pub mod schema_sync_test;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sentra_agent::auth::MockIdentityProvider;
use sentra_agent::catalog::{default_catalogs, CatalogRegistry, MockSchemaCatalog};
use sentra_agent::llm::{AgentService, MockLlmClient};
use sentra_agent::memory::{InMemoryMemoryStore, MemoryHook};
use sentra_agent::query::{MockQueryService, QueryExecutor};
use sentra_agent::safety::AccessPolicy;
use sentra_agent::server::{build_router, AppState};
use tower::ServiceExt;

/// Router plus handles on the mocks behind it.
pub struct Harness {
    pub router: Router,
    pub llm: MockLlmClient,
    pub queries: Arc<MockQueryService>,
    pub store: Arc<InMemoryMemoryStore>,
}

/// Builds the agent over the sample schemas and the default personas.
pub async fn agent(
    llm: &MockLlmClient,
    queries: &Arc<MockQueryService>,
    store: &Arc<InMemoryMemoryStore>,
) -> AgentService {
    let mut registry = CatalogRegistry::new(default_catalogs());
    registry.load_schemas(&MockSchemaCatalog::sample()).await;

    AgentService::new(
        Arc::new(llm.clone()),
        QueryExecutor::new(queries.clone()).with_poll_interval(Duration::from_millis(10)),
        Arc::new(registry),
        Arc::new(AccessPolicy::default()),
        MemoryHook::new(store.clone()),
    )
}

pub async fn harness(llm: MockLlmClient) -> Harness {
    harness_with(llm, MockQueryService::new(), Duration::from_secs(30)).await
}

pub async fn harness_with(
    llm: MockLlmClient,
    queries: MockQueryService,
    request_timeout: Duration,
) -> Harness {
    let queries = Arc::new(queries);
    let store = Arc::new(InMemoryMemoryStore::new());
    let agent = agent(&llm, &queries, &store).await;

    let identity = MockIdentityProvider::new()
        .with_user("vishal.saxena", "correct-horse")
        .with_unconfirmed_user("new.joiner", "welcome1");

    let state = AppState::new(Arc::new(agent), Arc::new(identity))
        .with_request_timeout(request_timeout);

    Harness {
        router: build_router(state),
        llm,
        queries,
        store,
    }
}

/// Sends a request and returns the status with the JSON body (or `Null`).
pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, "POST", uri, Some(body)).await
}
