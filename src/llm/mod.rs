//! LLM integration for Sentra.
//!
//! Provides the model client trait, its implementations, and the agent
//! service that turns a question into a rendered answer.

pub mod anthropic;
pub mod bedrock;
pub mod factory;
pub mod mock;
pub mod parser;
pub mod prompt;
pub mod service;
pub mod tools;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use bedrock::{BedrockClient, BedrockConfig};
pub use factory::create_client;
pub use mock::MockLlmClient;
pub use parser::{parse_agent_response, AgentResponse, ChartType};
pub use prompt::{build_messages, build_system_prompt, user_message};
pub use service::{AgentRequest, AgentService, DEFAULT_MAX_TOOL_ROUNDS};
pub use tools::{get_tool_definitions, AthenaQueryInput, ToolDefinition, ATHENA_QUERY_TOOL};
pub use types::{LlmResponse, Message, Role, ToolCall, ToolResult};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A chat model that can request `athena_query` calls.
///
/// `messages` carries the system prompt first, then the conversation so far,
/// including earlier tool calls and their results.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;
}

/// Which model backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Claude through the Messages API.
    #[default]
    Anthropic,
    /// Claude through the Bedrock Converse API, using AWS credentials.
    Bedrock,
    /// Scripted answers, no network.
    Mock,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Mock => "mock",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names_match_config_values() {
        for provider in [LlmProvider::Anthropic, LlmProvider::Bedrock, LlmProvider::Mock] {
            let value = serde_json::to_value(provider).unwrap();
            assert_eq!(value, provider.to_string());
        }
        assert_eq!(LlmProvider::default(), LlmProvider::Anthropic);
    }

    #[tokio::test]
    async fn test_mock_client_is_object_safe() {
        let client: Box<dyn LlmClient> = Box::new(MockLlmClient::new());
        let messages = vec![Message::user("User Request: hello, user_id: u")];
        let response = client.complete_with_tools(&messages, &[]).await.unwrap();
        assert!(!response.has_tool_calls());
        assert!(response.content.contains("\"type\""));
    }
}
