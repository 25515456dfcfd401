//! Conversational memory for Sentra.
//!
//! Short-term memory is an append-only event log keyed by actor and session.
//! Each event carries role/text messages; a turn starts at a USER message.

mod agentcore;
mod hook;
mod in_memory;

pub use agentcore::{resolve_memory_id, AgentCoreMemoryStore};
pub use hook::MemoryHook;
pub use in_memory::InMemoryMemoryStore;

use std::fmt;
use std::sync::OnceLock;
use std::time::SystemTime;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentraError};

/// Default number of turns loaded into the prompt.
pub const DEFAULT_HISTORY_TURNS: usize = 5;

/// Role of a message stored in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventRole {
    User,
    Assistant,
    Tool,
    Other,
}

impl EventRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::Tool => "TOOL",
            Self::Other => "OTHER",
        }
    }

    /// Parses a role name; unknown names map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Self::User,
            "ASSISTANT" => Self::Assistant,
            "TOOL" => Self::Tool,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role/text pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: EventRole,
    pub text: String,
}

impl MemoryMessage {
    pub fn new(role: EventRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(EventRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(EventRole::Assistant, text)
    }
}

/// An event read back from the memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEvent {
    pub event_id: String,
    pub timestamp: SystemTime,
    pub messages: Vec<MemoryMessage>,
}

/// Messages of one conversation turn, oldest first.
pub type Turn = Vec<MemoryMessage>;

/// A session known to the memory store for an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: Option<SystemTime>,
}

static ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn id_pattern() -> &'static Regex {
    ID_PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-_/]*$").unwrap())
}

/// Actor identifier used to isolate one user's memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId(String);

impl ActorId {
    /// Validates an actor id as the memory service accepts it.
    pub fn parse(raw: &str) -> Result<Self> {
        if id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(SentraError::memory(format!(
                "invalid actor id '{raw}': must match [a-zA-Z0-9][a-zA-Z0-9-_/]*"
            )))
        }
    }

    /// Derives an actor id from a user id.
    ///
    /// `.` becomes `_`, `@` becomes `_at_` and spaces become `_`. Anything
    /// still outside the allowed pattern is rejected.
    pub fn sanitize(user_id: &str) -> Result<Self> {
        let cleaned = user_id
            .replace('.', "_")
            .replace('@', "_at_")
            .replace(' ', "_");
        Self::parse(&cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Groups events into turns and keeps the last `k`, in chronological order.
///
/// `events` must be sorted oldest first. Messages before the first USER
/// message form their own leading turn.
pub fn group_last_turns(events: &[MemoryEvent], k: usize) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut current: Turn = Vec::new();

    for message in events.iter().flat_map(|e| e.messages.iter()) {
        if message.role == EventRole::User && !current.is_empty() {
            turns.push(std::mem::take(&mut current));
        }
        current.push(message.clone());
    }
    if !current.is_empty() {
        turns.push(current);
    }

    let skip = turns.len().saturating_sub(k);
    turns.split_off(skip)
}

/// Trait defining the interface for short-term memory stores.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Appends one role/text pair and returns the new event id.
    async fn create_event(
        &self,
        actor: &ActorId,
        session_id: &str,
        message: &MemoryMessage,
    ) -> Result<String>;

    /// Lists every event of a session, oldest first.
    async fn list_events(&self, actor: &ActorId, session_id: &str) -> Result<Vec<MemoryEvent>>;

    /// Deletes one event.
    async fn delete_event(&self, actor: &ActorId, session_id: &str, event_id: &str) -> Result<()>;

    /// Lists the sessions recorded for an actor.
    async fn list_sessions(&self, actor: &ActorId) -> Result<Vec<SessionInfo>>;

    /// Reads the last `k` turns of a session, oldest first.
    async fn last_k_turns(&self, actor: &ActorId, session_id: &str, k: usize) -> Result<Vec<Turn>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let events = self.list_events(actor, session_id).await?;
        Ok(group_last_turns(&events, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, UNIX_EPOCH};

    fn event(n: u64, role: EventRole, text: &str) -> MemoryEvent {
        MemoryEvent {
            event_id: format!("e{n}"),
            timestamp: UNIX_EPOCH + Duration::from_secs(n),
            messages: vec![MemoryMessage::new(role, text)],
        }
    }

    #[test]
    fn test_sanitize_email() {
        let actor = ActorId::sanitize("kamaljeet.singh@bank.com").unwrap();
        assert_eq!(actor.as_str(), "kamaljeet_singh_at_bank_com");
    }

    #[test]
    fn test_sanitize_spaces() {
        let actor = ActorId::sanitize("vishal saxena").unwrap();
        assert_eq!(actor.as_str(), "vishal_saxena");
    }

    #[test]
    fn test_sanitize_rejects_leading_symbol() {
        assert!(ActorId::sanitize("_hidden").is_err());
        assert!(ActorId::sanitize("").is_err());
    }

    #[test]
    fn test_sanitize_rejects_other_characters() {
        let err = ActorId::sanitize("harsh#kumar").unwrap_err();
        assert_eq!(err.category(), "Memory Error");
    }

    #[test]
    fn test_parse_allows_slash_and_dash() {
        assert!(ActorId::parse("team/ops-1").is_ok());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(EventRole::parse("assistant"), EventRole::Assistant);
        assert_eq!(EventRole::parse("SYSTEM"), EventRole::Other);
    }

    #[test]
    fn test_group_last_turns_keeps_latest_in_order() {
        let events = vec![
            event(1, EventRole::User, "q1"),
            event(2, EventRole::Assistant, "a1"),
            event(3, EventRole::User, "q2"),
            event(4, EventRole::Assistant, "a2"),
            event(5, EventRole::User, "q3"),
            event(6, EventRole::Assistant, "a3"),
        ];

        let turns = group_last_turns(&events, 2);

        assert_eq!(
            turns,
            vec![
                vec![MemoryMessage::user("q2"), MemoryMessage::assistant("a2")],
                vec![MemoryMessage::user("q3"), MemoryMessage::assistant("a3")],
            ]
        );
    }

    #[test]
    fn test_group_last_turns_leading_partial_turn() {
        let events = vec![
            event(1, EventRole::Assistant, "welcome"),
            event(2, EventRole::User, "q1"),
        ];

        let turns = group_last_turns(&events, 5);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0][0].text, "welcome");
    }

    #[test]
    fn test_group_last_turns_empty() {
        assert!(group_last_turns(&[], 5).is_empty());
    }
}
