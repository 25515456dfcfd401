//! AgentCore memory store.
//!
//! Short-term memory events live in a managed AgentCore memory resource. The
//! data plane reads and writes events; the control plane finds the memory
//! id by name and creates the memory on first use.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use aws_sdk_bedrockagentcore::error::DisplayErrorContext;
use aws_sdk_bedrockagentcore::primitives::DateTime;
use aws_sdk_bedrockagentcore::types::{Content, Conversational, Event, PayloadType, Role};
use aws_sdk_bedrockagentcore::Client;
use aws_sdk_bedrockagentcorecontrol::types::MemoryStatus;
use aws_sdk_bedrockagentcorecontrol::Client as ControlClient;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ActorId, EventRole, MemoryEvent, MemoryMessage, MemoryStore, SessionInfo};
use crate::error::{Result, SentraError};

const PAGE_SIZE: i32 = 100;

/// Memory store backed by AgentCore short-term memory.
pub struct AgentCoreMemoryStore {
    client: Client,
    memory_id: String,
}

impl AgentCoreMemoryStore {
    pub fn new(client: Client, memory_id: impl Into<String>) -> Self {
        Self {
            client,
            memory_id: memory_id.into(),
        }
    }

    pub fn memory_id(&self) -> &str {
        &self.memory_id
    }
}

/// Days before short-term events expire in a newly created memory.
pub const EVENT_EXPIRY_DAYS: i32 = 7;

const CREATE_POLL_INTERVAL: Duration = Duration::from_secs(10);
const CREATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Finds the id of the first memory whose id starts with `name`, creating
/// the memory when none matches and `create_if_missing` is set.
///
/// Memory ids are the memory name followed by a generated suffix.
pub async fn resolve_memory_id(
    control: &ControlClient,
    name: &str,
    create_if_missing: bool,
) -> Result<String> {
    if let Some(id) = find_memory_id(control, name).await? {
        info!(memory_id = %id, "Resolved memory");
        return Ok(id);
    }
    if !create_if_missing {
        return Err(SentraError::memory(format!(
            "No memory found with name '{name}'"
        )));
    }
    create_memory(control, name).await
}

async fn find_memory_id(control: &ControlClient, name: &str) -> Result<Option<String>> {
    let mut next_token: Option<String> = None;

    loop {
        let response = control
            .list_memories()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| control_error("list memories", e))?;

        if let Some(id) = response
            .memories()
            .iter()
            .filter_map(|m| m.id())
            .find(|id| id.starts_with(name))
        {
            return Ok(Some(id.to_string()));
        }

        match response.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => return Ok(None),
        }
    }
}

/// Creates a memory without extraction strategies and waits for it to
/// become active.
async fn create_memory(control: &ControlClient, name: &str) -> Result<String> {
    info!(memory_name = name, expiry_days = EVENT_EXPIRY_DAYS, "Creating memory");
    let response = control
        .create_memory()
        .name(name)
        .description("Short-term memory for Sentra agent")
        .event_expiry_duration(EVENT_EXPIRY_DAYS)
        .send()
        .await
        .map_err(|e| control_error("create memory", e))?;

    let memory = response
        .memory()
        .ok_or_else(|| SentraError::memory("Create memory returned no memory"))?;
    let id = memory.id().to_string();
    if creation_finished(&id, memory.status(), memory.failure_reason())? {
        return Ok(id);
    }

    let started = Instant::now();
    while started.elapsed() < CREATE_TIMEOUT {
        tokio::time::sleep(CREATE_POLL_INTERVAL).await;

        let response = control
            .get_memory()
            .memory_id(&id)
            .send()
            .await
            .map_err(|e| control_error("get memory", e))?;
        let Some(memory) = response.memory() else {
            continue;
        };
        debug!(memory_id = %id, status = memory.status().as_str(), "Polled memory");
        if creation_finished(&id, memory.status(), memory.failure_reason())? {
            return Ok(id);
        }
    }

    Err(SentraError::memory(format!(
        "Memory {id} did not become active within {}s",
        CREATE_TIMEOUT.as_secs()
    )))
}

/// `Ok(true)` once the memory is active, `Ok(false)` while it is still
/// being created.
fn creation_finished(id: &str, status: &MemoryStatus, reason: Option<&str>) -> Result<bool> {
    match status {
        MemoryStatus::Active => {
            info!(memory_id = id, "Memory is active");
            Ok(true)
        }
        MemoryStatus::Creating => Ok(false),
        other => Err(SentraError::memory(format!(
            "Memory {id} is {}{}",
            other.as_str(),
            reason.map(|r| format!(": {r}")).unwrap_or_default()
        ))),
    }
}

fn control_error(action: &str, e: impl std::error::Error) -> SentraError {
    SentraError::memory(format!(
        "Failed to {action}: {}",
        aws_sdk_bedrockagentcorecontrol::error::DisplayErrorContext(&e)
    ))
}

fn to_sdk_role(role: EventRole) -> Role {
    match role {
        EventRole::User => Role::User,
        EventRole::Assistant => Role::Assistant,
        EventRole::Tool => Role::Tool,
        EventRole::Other => Role::Other,
    }
}

fn to_memory_event(event: &Event) -> MemoryEvent {
    let messages = event
        .payload()
        .iter()
        .filter_map(|payload| match payload {
            PayloadType::Conversational(conv) => {
                let text = conv.content().and_then(|c| c.as_text().ok())?;
                Some(MemoryMessage::new(
                    EventRole::parse(conv.role().as_str()),
                    text.clone(),
                ))
            }
            _ => None,
        })
        .collect();

    MemoryEvent {
        event_id: event.event_id().to_string(),
        timestamp: SystemTime::try_from(*event.event_timestamp()).unwrap_or(UNIX_EPOCH),
        messages,
    }
}

fn memory_error(action: &str, e: impl std::error::Error) -> SentraError {
    SentraError::memory(format!("Failed to {action}: {}", DisplayErrorContext(&e)))
}

#[async_trait]
impl MemoryStore for AgentCoreMemoryStore {
    async fn create_event(
        &self,
        actor: &ActorId,
        session_id: &str,
        message: &MemoryMessage,
    ) -> Result<String> {
        let conversational = Conversational::builder()
            .content(Content::Text(message.text.clone()))
            .role(to_sdk_role(message.role))
            .build()
            .map_err(|e| SentraError::memory(format!("Invalid memory payload: {e}")))?;

        let response = self
            .client
            .create_event()
            .memory_id(&self.memory_id)
            .actor_id(actor.as_str())
            .session_id(session_id)
            .event_timestamp(DateTime::from(SystemTime::now()))
            .payload(PayloadType::Conversational(conversational))
            .send()
            .await
            .map_err(|e| memory_error("create event", e))?;

        let event_id = response
            .event()
            .map(|e| e.event_id().to_string())
            .unwrap_or_default();
        debug!(actor_id = %actor, session_id, event_id = %event_id, "Created memory event");
        Ok(event_id)
    }

    async fn list_events(&self, actor: &ActorId, session_id: &str) -> Result<Vec<MemoryEvent>> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_events()
                .memory_id(&self.memory_id)
                .actor_id(actor.as_str())
                .session_id(session_id)
                .include_payloads(true)
                .max_results(PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| memory_error("list events", e))?;

            events.extend(response.events().iter().map(to_memory_event));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    async fn delete_event(&self, actor: &ActorId, session_id: &str, event_id: &str) -> Result<()> {
        self.client
            .delete_event()
            .memory_id(&self.memory_id)
            .actor_id(actor.as_str())
            .session_id(session_id)
            .event_id(event_id)
            .send()
            .await
            .map_err(|e| memory_error("delete event", e))?;
        Ok(())
    }

    async fn list_sessions(&self, actor: &ActorId) -> Result<Vec<SessionInfo>> {
        let mut sessions = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_sessions()
                .memory_id(&self.memory_id)
                .actor_id(actor.as_str())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| memory_error("list sessions", e))?;

            sessions.extend(response.session_summaries().iter().map(|s| SessionInfo {
                session_id: s.session_id().to_string(),
                created_at: SystemTime::try_from(*s.created_at()).ok(),
            }));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping() {
        assert_eq!(to_sdk_role(EventRole::User), Role::User);
        assert_eq!(to_sdk_role(EventRole::Other), Role::Other);
        assert_eq!(EventRole::parse(Role::Assistant.as_str()), EventRole::Assistant);
    }

    #[test]
    fn test_creation_finished() {
        assert!(creation_finished("m-1", &MemoryStatus::Active, None).unwrap());
        assert!(!creation_finished("m-1", &MemoryStatus::Creating, None).unwrap());

        let err = creation_finished("m-1", &MemoryStatus::Failed, Some("quota exceeded")).unwrap_err();
        assert_eq!(err.to_string(), "Memory error: Memory m-1 is FAILED: quota exceeded");

        let err = creation_finished("m-1", &MemoryStatus::Deleting, None).unwrap_err();
        assert_eq!(err.to_string(), "Memory error: Memory m-1 is DELETING");
    }
}
