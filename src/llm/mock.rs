//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns. A scripted
//! question first requests an `athena_query` call, then answers with the
//! rows the tool returned.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::parser::AgentResponse;
use crate::llm::tools::{AthenaQueryInput, ToolDefinition, ATHENA_QUERY_TOOL};
use crate::llm::types::{LlmResponse, Message, Role, ToolCall};
use crate::llm::LlmClient;

/// A question pattern answered by running one query.
#[derive(Debug, Clone)]
struct ScriptedQuery {
    pattern: String,
    input: AthenaQueryInput,
}

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Used for unit testing and `--mock` runs without making real API calls.
/// Clones share the request log.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Questions that trigger a tool call.
    queries: Vec<ScriptedQuery>,
    /// Keep requesting the tool even after results arrive.
    repeat_tool_calls: bool,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers customer and premium questions from the sample data.
    pub fn demo() -> Self {
        Self::new()
            .with_query(
                "customer",
                "sentra_db",
                "SELECT CIF_NO, CUSTOMER_NAME FROM DM_CUSTOMER_MASTER",
            )
            .with_query(
                "premium",
                "insurance_db",
                "SELECT zone, SUM(gwp) AS premium FROM insurance_data GROUP BY zone",
            )
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// When the input contains `pattern`, requests `sql` against `database`.
    pub fn with_query(
        mut self,
        pattern: impl Into<String>,
        database: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        self.queries.push(ScriptedQuery {
            pattern: pattern.into(),
            input: AthenaQueryInput {
                sql: sql.into(),
                database: database.into(),
            },
        });
        self
    }

    /// Requests the scripted query on every round.
    pub fn with_repeated_tool_calls(mut self) -> Self {
        self.repeat_tool_calls = true;
        self
    }

    /// Returns the message lists received so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn log_request(&self, messages: &[Message]) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
    }

    fn find_query(&self, input: &str) -> Option<&ScriptedQuery> {
        let input_lower = input.to_lowercase();
        self.queries
            .iter()
            .find(|q| input_lower.contains(&q.pattern.to_lowercase()))
    }

    /// Generates a mock text answer based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        to_json(&AgentResponse::text(
            "I can help with questions about banking customers and insurance policies.",
        ))
    }

    /// Summarizes the last tool result as a final answer.
    fn answer_from_result(query: &ScriptedQuery, content: &str) -> String {
        let mut response = match serde_json::from_str::<Value>(content) {
            Ok(Value::Array(rows)) => {
                let mut response =
                    AgentResponse::text(format!("Found {} matching records.", rows.len()));
                response.data = Value::Array(rows);
                response
            }
            _ => AgentResponse::text("I was unable to retrieve the data for this request."),
        };
        response.query_executed = query.input.sql.clone();
        to_json(&response)
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

fn to_json(response: &AgentResponse) -> String {
    serde_json::to_string(response).unwrap_or_default()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        self.log_request(messages);

        let input = Self::extract_user_input(messages);
        let last_tool_result = messages.iter().rev().find(|m| m.role == Role::Tool);
        let rounds = messages.iter().filter(|m| !m.tool_calls.is_empty()).count();

        if let Some(query) = self.find_query(&input) {
            let offers_tool = tools.iter().any(|t| t.name == ATHENA_QUERY_TOOL);
            if offers_tool && (last_tool_result.is_none() || self.repeat_tool_calls) {
                let arguments = serde_json::to_string(&query.input).unwrap_or_default();
                return Ok(LlmResponse::with_tool_calls(
                    String::new(),
                    vec![ToolCall::new(
                        format!("mock_tool_call_{}", rounds + 1),
                        ATHENA_QUERY_TOOL,
                        arguments,
                    )],
                ));
            }

            if let Some(result) = last_tool_result {
                return Ok(LlmResponse::text(Self::answer_from_result(
                    query,
                    &result.content,
                )));
            }
        }

        Ok(LlmResponse::text(self.mock_response(&input)))
    }
}
