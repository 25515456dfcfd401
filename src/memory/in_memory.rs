//! In-process memory store.
//!
//! Keeps events in a map for tests and `--mock` runs. Nothing survives the
//! process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::{ActorId, MemoryEvent, MemoryMessage, MemoryStore, SessionInfo};
use crate::error::{Result, SentraError};

type SessionKey = (String, String);

/// Memory store backed by a process-local map.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    sessions: Mutex<HashMap<SessionKey, Vec<MemoryEvent>>>,
    next_id: AtomicU64,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of events stored across all sessions.
    pub fn event_count(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionKey, Vec<MemoryEvent>>>> {
        self.sessions
            .lock()
            .map_err(|_| SentraError::internal("memory store lock poisoned"))
    }
}

fn key(actor: &ActorId, session_id: &str) -> SessionKey {
    (actor.as_str().to_string(), session_id.to_string())
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn create_event(
        &self,
        actor: &ActorId,
        session_id: &str,
        message: &MemoryMessage,
    ) -> Result<String> {
        if session_id.is_empty() {
            return Err(SentraError::memory("session id is required"));
        }

        // Ids double as a strictly increasing clock so ordering is stable.
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let event = MemoryEvent {
            event_id: format!("event-{seq:08}"),
            timestamp: UNIX_EPOCH + Duration::from_millis(seq),
            messages: vec![message.clone()],
        };
        let event_id = event.event_id.clone();

        self.lock()?
            .entry(key(actor, session_id))
            .or_default()
            .push(event);
        Ok(event_id)
    }

    async fn list_events(&self, actor: &ActorId, session_id: &str) -> Result<Vec<MemoryEvent>> {
        let mut events = self
            .lock()?
            .get(&key(actor, session_id))
            .cloned()
            .unwrap_or_default();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn delete_event(&self, actor: &ActorId, session_id: &str, event_id: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let events = sessions
            .get_mut(&key(actor, session_id))
            .ok_or_else(|| SentraError::memory(format!("event {event_id} not found")))?;

        let before = events.len();
        events.retain(|e| e.event_id != event_id);
        if events.len() == before {
            return Err(SentraError::memory(format!("event {event_id} not found")));
        }
        Ok(())
    }

    async fn list_sessions(&self, actor: &ActorId) -> Result<Vec<SessionInfo>> {
        let sessions = self.lock()?;
        let mut found: Vec<SessionInfo> = sessions
            .iter()
            .filter(|((a, _), events)| a == actor.as_str() && !events.is_empty())
            .map(|((_, session_id), events)| SessionInfo {
                session_id: session_id.clone(),
                created_at: events.iter().map(|e| e.timestamp).min(),
            })
            .collect();
        found.sort_by_key(|s| s.created_at.unwrap_or(SystemTime::UNIX_EPOCH));
        Ok(found)
    }
}
