//! Memory hook for the agent.
//!
//! Loads recent turns into the system prompt before a request and records
//! each message after it. Memory failures never fail the request.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::{ActorId, EventRole, MemoryMessage, MemoryStore, Turn, DEFAULT_HISTORY_TURNS};

/// Connects the agent to a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryHook {
    store: Arc<dyn MemoryStore>,
    history_turns: usize,
}

impl MemoryHook {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Returns the recent conversation as a prompt suffix.
    ///
    /// Empty when there is no history or the store could not be read.
    pub async fn load_context(&self, actor: &ActorId, session_id: &str) -> String {
        match self
            .store
            .last_k_turns(actor, session_id, self.history_turns)
            .await
        {
            Ok(turns) => {
                info!(
                    actor_id = %actor,
                    session_id,
                    turns = turns.len(),
                    "Loaded conversation history"
                );
                format_context(&turns)
            }
            Err(e) => {
                error!(actor_id = %actor, session_id, error = %e, "Memory load error");
                String::new()
            }
        }
    }

    /// Stores one message. Empty text is skipped.
    pub async fn record(&self, actor: &ActorId, session_id: &str, role: EventRole, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let message = MemoryMessage::new(role, text);
        match self.store.create_event(actor, session_id, &message).await {
            Ok(event_id) => {
                debug!(actor_id = %actor, session_id, event_id = %event_id, role = %role, "Saved message")
            }
            Err(e) => error!(actor_id = %actor, session_id, error = %e, "Memory save error"),
        }
    }
}

/// Renders turns as `\n\nRecent conversation:\n<ROLE>: <text>` lines.
pub fn format_context(turns: &[Turn]) -> String {
    let lines: Vec<String> = turns
        .iter()
        .flatten()
        .map(|m| format!("{}: {}", m.role, m.text))
        .collect();

    if lines.is_empty() {
        return String::new();
    }
    format!("\n\nRecent conversation:\n{}", lines.join("\n"))
}
