//! Agent service for answering questions over the registered catalogs.
//!
//! One request runs this pipeline:
//! - load recent turns from memory and build the system prompt
//! - let the model call `athena_query` until it produces a final answer
//! - check and scope every statement before it reaches the poller
//! - parse the answer into an [`AgentResponse`] and record both sides in memory

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRegistry;
use crate::error::Result;
use crate::memory::{ActorId, EventRole, MemoryHook};
use crate::query::{QueryExecutor, QueryOutcome};
use crate::safety::{ensure_read_only, scope_sql, AccessPolicy};

use super::{
    build_messages, build_system_prompt, get_tool_definitions, parse_agent_response,
    user_message, AgentResponse, AthenaQueryInput, LlmClient, Message, ToolCall, ToolResult,
    ATHENA_QUERY_TOOL,
};

/// Default number of tool rounds before the agent gives up.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

const ROUNDS_EXHAUSTED: &str = "I could not complete this request within the allowed number of \
                                query steps. Please try a more specific question.";

/// A question from one user in one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub user_query: String,
    pub user_id: String,
    pub session_id: String,
}

/// Answers questions with the model, the query tool and conversation memory.
pub struct AgentService {
    llm: Arc<dyn LlmClient>,
    executor: QueryExecutor,
    catalogs: Arc<CatalogRegistry>,
    policy: Arc<AccessPolicy>,
    memory: MemoryHook,
    max_tool_rounds: usize,
}

impl AgentService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: QueryExecutor,
        catalogs: Arc<CatalogRegistry>,
        policy: Arc<AccessPolicy>,
        memory: MemoryHook,
    ) -> Self {
        Self {
            llm,
            executor,
            catalogs,
            policy,
            memory,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Sets how many rounds of tool calls one request may use.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn catalogs(&self) -> &CatalogRegistry {
        &self.catalogs
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Answers one question.
    ///
    /// Query failures are handed back to the model as tool output. Only
    /// model and actor id errors fail the request.
    pub async fn ask(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let start = Instant::now();
        let actor = ActorId::sanitize(&request.user_id)?;
        let session_id = request.session_id.as_str();

        let context = self.memory.load_context(&actor, session_id).await;
        let system_prompt =
            build_system_prompt(&self.catalogs, &self.policy, &request.user_id, &context);
        let mut messages = build_messages(system_prompt, &request.user_query, &request.user_id);
        self.memory
            .record(
                &actor,
                session_id,
                EventRole::User,
                &user_message(&request.user_query, &request.user_id),
            )
            .await;

        let tools = get_tool_definitions(&self.catalogs);
        let mut tool_calls_made = 0usize;
        let mut answer = None;

        for round in 0..=self.max_tool_rounds {
            let llm_start = Instant::now();
            let response = self.llm.complete_with_tools(&messages, &tools).await?;
            tracing::debug!(
                actor_id = %actor,
                session_id,
                round,
                llm_duration_ms = llm_start.elapsed().as_millis() as u64,
                tool_calls = response.tool_calls.len(),
                "Received LLM response"
            );

            if !response.has_tool_calls() {
                answer = Some(response.content);
                break;
            }
            if round == self.max_tool_rounds {
                break;
            }

            messages.push(Message::assistant_tool_calls(&response));
            for call in &response.tool_calls {
                let content = self.execute_tool(call, &request.user_id).await;
                tool_calls_made += 1;
                messages.push(Message::tool_result(ToolResult {
                    tool_call_id: call.id.clone(),
                    content,
                }));
            }
        }

        let (raw, response) = match answer {
            Some(raw) => {
                let response = parse_agent_response(&raw);
                (raw, response)
            }
            None => {
                tracing::warn!(
                    actor_id = %actor,
                    session_id,
                    max_tool_rounds = self.max_tool_rounds,
                    "Tool rounds exhausted"
                );
                (ROUNDS_EXHAUSTED.to_string(), AgentResponse::text(ROUNDS_EXHAUSTED))
            }
        };

        self.memory
            .record(&actor, session_id, EventRole::Assistant, &raw)
            .await;

        tracing::info!(
            actor_id = %actor,
            session_id,
            response_type = ?response.kind,
            tool_calls = tool_calls_made,
            duration_ms = start.elapsed().as_millis() as u64,
            "Agent request complete"
        );

        Ok(response)
    }

    /// Runs one tool call and renders its output for the model.
    async fn execute_tool(&self, call: &ToolCall, user_id: &str) -> String {
        if call.name != ATHENA_QUERY_TOOL {
            tracing::warn!(tool = %call.name, "Unknown tool requested");
            return format!("Unknown tool: {}", call.name);
        }

        let input: AthenaQueryInput = match serde_json::from_str(&call.arguments) {
            Ok(input) => input,
            Err(e) => return format!("Invalid athena_query arguments: {}", e),
        };

        match self.run_query(&input, user_id).await {
            Ok(outcome) => outcome.to_tool_content(),
            Err(e) => {
                tracing::warn!(catalog = %input.database, error = %e, "Tool query rejected or failed");
                format!("Error executing Athena query: {}", e)
            }
        }
    }

    /// Checks, scopes and runs one statement.
    pub async fn run_query(&self, input: &AthenaQueryInput, user_id: &str) -> Result<QueryOutcome> {
        let catalog = self.catalogs.require(&input.database)?;
        ensure_read_only(&input.sql)?;
        let scope = self.policy.scope_for(user_id);
        let sql = scope_sql(&input.sql, &self.catalogs, catalog, &scope)?;
        self.executor.run(&sql, &catalog.name).await
    }
}
