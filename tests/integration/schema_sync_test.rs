//! Schema sync integration tests.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sentra_agent::catalog::{MockSchemaCatalog, SchemaSync, SCHEMA_ACTOR_ID};
use sentra_agent::error::SentraError;
use sentra_agent::memory::{ActorId, EventRole, InMemoryMemoryStore, MemoryStore};

#[tokio::test]
async fn test_sync_writes_one_schema_event() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let sync = SchemaSync::new(Arc::new(MockSchemaCatalog::sample()), store.clone());

    let report = sync.run("insurance_db", "insurance_data").await.unwrap();

    assert_eq!(report.session_id, "insurance_schema_session");
    assert_eq!(report.event_count, 1);
    assert_eq!(report.backup_events_count, 0);

    let actor = ActorId::parse(SCHEMA_ACTOR_ID).unwrap();
    let events = store
        .list_events(&actor, "insurance_schema_session")
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let message = &events[0].messages[0];
    assert_eq!(message.role, EventRole::Other);
    assert!(message.text.starts_with("INSURANCE_DATA Table Columns\n"));
    assert!(message
        .text
        .ends_with(&format!("Total: {} columns", report.columns)));
}

#[tokio::test]
async fn test_resync_replaces_previous_schema() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let sync = SchemaSync::new(Arc::new(MockSchemaCatalog::sample()), store.clone());

    sync.run("insurance_db", "insurance_data").await.unwrap();
    let report = sync.run("insurance_db", "insurance_data").await.unwrap();

    assert_eq!(report.backup_events_count, 1);
    assert_eq!(report.event_count, 1);
    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn test_unknown_table_leaves_memory_untouched() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let sync = SchemaSync::new(Arc::new(MockSchemaCatalog::sample()), store.clone());
    sync.run("insurance_db", "insurance_data").await.unwrap();

    let result = sync.run("insurance_db", "no_such_table").await;

    match result {
        Err(SentraError::Catalog(_)) => {}
        other => panic!("Expected catalog error, got {:?}", other),
    }
    assert_eq!(store.event_count(), 1);
}
