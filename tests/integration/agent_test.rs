//! Agent pipeline integration tests.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sentra_agent::llm::{AgentRequest, ChartType, MockLlmClient, Role};
use sentra_agent::memory::{ActorId, InMemoryMemoryStore, MemoryStore};
use sentra_agent::query::{MockQueryService, ResultPage};

use super::agent;

fn request(query: &str, user_id: &str, session_id: &str) -> AgentRequest {
    AgentRequest {
        user_query: query.to_string(),
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
    }
}

#[tokio::test]
async fn test_insurance_queries_are_not_scoped() {
    let llm = MockLlmClient::new().with_query(
        "premium",
        "insurance_db",
        "SELECT zone, SUM(gwp) AS premium FROM insurance_data GROUP BY zone",
    );
    let page = ResultPage::from_strings(
        &["zone", "premium"],
        &[&["North", "1200000"], &["South", "800000"]],
    );
    let queries = Arc::new(MockQueryService::new().with_page(page));
    let store = Arc::new(InMemoryMemoryStore::new());
    let service = agent(&llm, &queries, &store).await;

    let response = service
        .ask(&request("premium by zone", "vishal.saxena", "s1"))
        .await
        .unwrap();

    let submitted = queries.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].catalog, "insurance_db");
    assert_eq!(
        submitted[0].sql,
        "SELECT zone, SUM(gwp) AS premium FROM insurance_data GROUP BY zone"
    );
    assert_eq!(response.kind, ChartType::Text);
    assert_eq!(response.data[0]["zone"], "North");
    assert_eq!(response.data[1]["premium"], "800000");
}

#[tokio::test]
async fn test_model_sees_tools_prompt_and_results() {
    let llm = MockLlmClient::new().with_query(
        "customers",
        "sentra_db",
        "SELECT CIF_NO FROM DM_CUSTOMER_MASTER",
    );
    let queries = Arc::new(MockQueryService::new());
    let store = Arc::new(InMemoryMemoryStore::new());
    let service = agent(&llm, &queries, &store).await;

    service
        .ask(&request("list customers", "harsh.kumar", "s1"))
        .await
        .unwrap();

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);

    let first = &requests[0];
    assert_eq!(first[0].role, Role::System);
    assert!(first[0].content.contains("Table: DM_CUSTOMER_MASTER"));
    assert!(first[0].content.contains("CIF200026 and CIF200099"));
    assert_eq!(
        first[1].content,
        "User Request: list customers, user_id: harsh.kumar"
    );

    let second = &requests[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[2].tool_calls.len(), 1);
    assert_eq!(second[3].role, Role::Tool);
    assert_eq!(second[3].tool_call_id.as_deref(), Some("mock_tool_call_1"));
    assert!(second[3].content.starts_with('['));
}

#[tokio::test]
async fn test_sessions_are_isolated_per_actor() {
    let llm = MockLlmClient::new();
    let queries = Arc::new(MockQueryService::new());
    let store = Arc::new(InMemoryMemoryStore::new());
    let service = agent(&llm, &queries, &store).await;

    service
        .ask(&request("hello", "vishal.saxena", "s1"))
        .await
        .unwrap();
    service
        .ask(&request("hello again", "harsh.kumar", "s1"))
        .await
        .unwrap();

    let vishal = ActorId::sanitize("vishal.saxena").unwrap();
    let turns = store.last_k_turns(&vishal, "s1", 5).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(
        turns[0][0].text,
        "User Request: hello, user_id: vishal.saxena"
    );

    let harsh_prompt = &llm.requests()[1][0].content;
    assert!(!harsh_prompt.contains("Recent conversation:"));
}
