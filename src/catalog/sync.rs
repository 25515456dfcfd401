//! Schema loader.
//!
//! Replaces the schema event of a catalog table in memory with a freshly
//! fetched column listing. Existing events are backed up first and written
//! back if any later step fails.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::SchemaCatalog;
use crate::error::{Result, SentraError};
use crate::memory::{ActorId, EventRole, MemoryEvent, MemoryMessage, MemoryStore};

/// Actor that owns schema events.
pub const SCHEMA_ACTOR_ID: &str = "schema_loader";

/// Result of a successful schema sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub actor_id: String,
    pub session_id: String,
    pub database: String,
    pub table: String,
    pub columns: usize,
    pub event_count: usize,
    pub backup_events_count: usize,
}

/// Loads table schemas from a [`SchemaCatalog`] into a [`MemoryStore`].
pub struct SchemaSync {
    catalog: Arc<dyn SchemaCatalog>,
    store: Arc<dyn MemoryStore>,
}

impl SchemaSync {
    pub fn new(catalog: Arc<dyn SchemaCatalog>, store: Arc<dyn MemoryStore>) -> Self {
        Self { catalog, store }
    }

    /// Session holding the schema event of a database: `insurance_db` maps
    /// to `insurance_schema_session`.
    pub fn session_for(database: &str) -> String {
        let base = database.strip_suffix("_db").unwrap_or(database);
        format!("{base}_schema_session")
    }

    /// Fetches the schema and replaces the stored schema event.
    ///
    /// Memory is only touched after the schema has been fetched and
    /// validated.
    pub async fn run(&self, database: &str, table: &str) -> Result<SyncReport> {
        let schema = self.catalog.table_schema(database, table).await?;
        if schema.columns.is_empty() {
            return Err(SentraError::catalog(format!(
                "Schema fetch returned 0 columns for {database}.{table}"
            )));
        }
        info!(catalog = database, table, columns = schema.column_count(), "Fetched schema");

        let actor = ActorId::parse(SCHEMA_ACTOR_ID)?;
        let session = Self::session_for(database);

        let backup = self.store.list_events(&actor, &session).await?;
        info!(session_id = %session, events = backup.len(), "Backed up existing events");

        match self.replace(&actor, &session, &schema.format_for_memory(), &backup).await {
            Ok(event_count) => Ok(SyncReport {
                actor_id: actor.to_string(),
                session_id: session,
                database: database.to_string(),
                table: table.to_string(),
                columns: schema.column_count(),
                event_count,
                backup_events_count: backup.len(),
            }),
            Err(e) => {
                error!(session_id = %session, error = %e, "Schema sync failed, restoring backup");
                let Restored { restored, stale } = self.restore(&actor, &session, &backup).await;
                let stale = match stale {
                    0 => String::new(),
                    n => format!(", {n} leftover events could not be deleted"),
                };
                Err(SentraError::memory(format!(
                    "Schema sync failed: {e} (restored {restored} of {} backup events{stale})",
                    backup.len()
                )))
            }
        }
    }

    async fn replace(
        &self,
        actor: &ActorId,
        session: &str,
        schema_text: &str,
        existing: &[MemoryEvent],
    ) -> Result<usize> {
        for event in existing {
            if let Err(e) = self.store.delete_event(actor, session, &event.event_id).await {
                warn!(event_id = %event.event_id, error = %e, "Failed to delete event");
            }
        }
        self.verify_count(actor, session, 0).await?;

        self.store
            .create_event(actor, session, &MemoryMessage::new(EventRole::Other, schema_text))
            .await?;
        self.verify_count(actor, session, 1).await?;
        Ok(1)
    }

    async fn verify_count(&self, actor: &ActorId, session: &str, expected: usize) -> Result<()> {
        let actual = self.store.list_events(actor, session).await?.len();
        if actual != expected {
            return Err(SentraError::memory(format!(
                "Event count is {actual}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Writes backed-up messages back.
    async fn restore(&self, actor: &ActorId, session: &str, backup: &[MemoryEvent]) -> Restored {
        let mut stale = 0;

        // Drop whatever the failed attempt left behind first.
        match self.store.list_events(actor, session).await {
            Ok(current) => {
                let leftovers = current
                    .iter()
                    .filter(|c| !backup.iter().any(|b| b.event_id == c.event_id));
                for event in leftovers {
                    if let Err(e) = self.store.delete_event(actor, session, &event.event_id).await {
                        warn!(event_id = %event.event_id, error = %e, "Failed to delete leftover event");
                        stale += 1;
                    }
                }
            }
            Err(e) => warn!(session_id = session, error = %e, "Could not list events to clean up"),
        }

        let remaining: Vec<String> = match self.store.list_events(actor, session).await {
            Ok(events) => events.into_iter().map(|e| e.event_id).collect(),
            Err(e) => {
                warn!(session_id = session, error = %e, "Could not list events before restoring");
                Vec::new()
            }
        };

        let mut restored = 0;
        for event in backup {
            if remaining.contains(&event.event_id) {
                restored += 1;
                continue;
            }
            let mut written = false;
            for message in event.messages.iter().filter(|m| !m.text.is_empty()) {
                match self.store.create_event(actor, session, message).await {
                    Ok(_) => written = true,
                    Err(e) => error!(event_id = %event.event_id, error = %e, "Failed to restore event"),
                }
            }
            if written {
                restored += 1;
            }
        }
        info!(restored, stale, total = backup.len(), "Restored backup events");
        Restored { restored, stale }
    }
}

/// Outcome of putting a session back after a failed sync.
struct Restored {
    restored: usize,
    /// Events from the failed attempt that could not be deleted.
    stale: usize,
}
