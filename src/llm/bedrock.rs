//! Claude through the Bedrock Converse API.
//!
//! Uses the shared AWS configuration, so no API key is involved. Tool calls
//! are `toolUse` blocks in assistant turns; their results go back as
//! `toolResult` blocks inside a user turn.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration,
    Message as BedrockMessage, SystemContentBlock, Tool, ToolConfiguration, ToolInputSchema,
    ToolResultBlock, ToolResultContentBlock, ToolSpecification, ToolUseBlock,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::{Document, Number};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SentraError};
use crate::llm::tools::ToolDefinition;
use crate::llm::types::{LlmResponse, Message, Role, ToolCall};
use crate::llm::LlmClient;

/// Cross-region inference profile used when no model is configured.
pub const DEFAULT_MODEL_ID: &str = "apac.anthropic.claude-sonnet-4-20250514-v1:0";

const DEFAULT_MAX_TOKENS: i32 = 4096;

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub model_id: String,
    pub max_tokens: i32,
}

impl BedrockConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Bedrock runtime LLM client.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    config: BedrockConfig,
    client: Client,
}

impl BedrockClient {
    pub fn new(sdk: &SdkConfig, config: BedrockConfig) -> Self {
        Self {
            config,
            client: Client::new(sdk),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    /// Splits out the system prompt and converts the rest to Converse turns.
    ///
    /// Consecutive tool results are merged into one user turn.
    fn convert_messages(
        messages: &[Message],
    ) -> Result<(Vec<SystemContentBlock>, Vec<BedrockMessage>)> {
        let mut system = Vec::new();
        let mut turns: Vec<(ConversationRole, Vec<ContentBlock>)> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system.push(SystemContentBlock::Text(msg.content.clone())),
                Role::User => turns.push((
                    ConversationRole::User,
                    vec![ContentBlock::Text(msg.content.clone())],
                )),
                Role::Assistant => {
                    let mut blocks = Vec::with_capacity(msg.tool_calls.len() + 1);
                    // Blank text blocks are rejected.
                    if !msg.content.is_empty() || msg.tool_calls.is_empty() {
                        blocks.push(ContentBlock::Text(msg.content.clone()));
                    }
                    for call in &msg.tool_calls {
                        let input = serde_json::from_str(&call.arguments)
                            .unwrap_or_else(|_| Value::Object(Default::default()));
                        let block = ToolUseBlock::builder()
                            .tool_use_id(&call.id)
                            .name(&call.name)
                            .input(to_document(&input))
                            .build()
                            .map_err(|e| build_error("tool use block", e))?;
                        blocks.push(ContentBlock::ToolUse(block));
                    }
                    turns.push((ConversationRole::Assistant, blocks));
                }
                Role::Tool => {
                    let block = ToolResultBlock::builder()
                        .tool_use_id(msg.tool_call_id.clone().unwrap_or_default())
                        .content(ToolResultContentBlock::Text(msg.content.clone()))
                        .build()
                        .map_err(|e| build_error("tool result block", e))?;
                    let block = ContentBlock::ToolResult(block);
                    match turns.last_mut() {
                        Some((ConversationRole::User, blocks))
                            if blocks.iter().all(ContentBlock::is_tool_result) =>
                        {
                            blocks.push(block)
                        }
                        _ => turns.push((ConversationRole::User, vec![block])),
                    }
                }
            }
        }

        let converted = turns
            .into_iter()
            .map(|(role, blocks)| {
                BedrockMessage::builder()
                    .role(role)
                    .set_content(Some(blocks))
                    .build()
                    .map_err(|e| build_error("message", e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((system, converted))
    }

    fn tool_config(tools: &[ToolDefinition]) -> Result<Option<ToolConfiguration>> {
        if tools.is_empty() {
            return Ok(None);
        }
        let specs = tools
            .iter()
            .map(|t| {
                ToolSpecification::builder()
                    .name(&t.name)
                    .description(&t.description)
                    .input_schema(ToolInputSchema::Json(to_document(&t.parameters)))
                    .build()
                    .map(Tool::ToolSpec)
                    .map_err(|e| build_error("tool specification", e))
            })
            .collect::<Result<Vec<_>>>()?;

        ToolConfiguration::builder()
            .set_tools(Some(specs))
            .build()
            .map(Some)
            .map_err(|e| build_error("tool configuration", e))
    }

    async fn send(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let (system, converted) = Self::convert_messages(messages)?;

        let response = self
            .client
            .converse()
            .model_id(&self.config.model_id)
            .set_system(Some(system))
            .set_messages(Some(converted))
            .set_tool_config(Self::tool_config(tools)?)
            .inference_config(
                InferenceConfiguration::builder()
                    .max_tokens(self.config.max_tokens)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                let throttled = e
                    .as_service_error()
                    .is_some_and(|s| s.is_throttling_exception());
                if throttled {
                    SentraError::llm("Bedrock rate limit reached; retry the question shortly.")
                } else {
                    SentraError::llm(format!("Bedrock request failed: {}", DisplayErrorContext(&e)))
                }
            })?;

        debug!(stop_reason = response.stop_reason().as_str(), "Bedrock turn finished");

        match response.output() {
            Some(ConverseOutput::Message(message)) => Ok(into_llm_response(message.content())),
            _ => Err(SentraError::llm("Bedrock returned no message")),
        }
    }
}

fn into_llm_response(blocks: &[ContentBlock]) -> LlmResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text(t) => text.push_str(t),
            ContentBlock::ToolUse(call) => tool_calls.push(ToolCall::new(
                call.tool_use_id(),
                call.name(),
                from_document(call.input()).to_string(),
            )),
            _ => {}
        }
    }

    LlmResponse::with_tool_calls(text, tool_calls)
}

fn build_error(what: &str, e: impl std::fmt::Display) -> SentraError {
    SentraError::llm(format!("Invalid Bedrock {what}: {e}"))
}

fn to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => Document::Number(match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Number::PosInt(u),
            (None, Some(i)) => Number::NegInt(i),
            _ => Number::Float(n.as_f64().unwrap_or_default()),
        }),
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn from_document(doc: &Document) -> Value {
    match doc {
        Document::Null => Value::Null,
        Document::Bool(b) => Value::Bool(*b),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(s) => Value::String(s.clone()),
        Document::Array(items) => Value::Array(items.iter().map(from_document).collect()),
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_document(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl LlmClient for BedrockClient {
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let response = self.send(messages, tools).await?;
        if response.content.is_empty() && !response.has_tool_calls() {
            return Err(SentraError::llm("No response from Bedrock"));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalogs, CatalogRegistry};
    use crate::llm::get_tool_definitions;
    use crate::llm::types::ToolResult;
    use serde_json::json;

    #[test]
    fn test_config_new() {
        let config = BedrockConfig::new(DEFAULT_MODEL_ID).with_max_tokens(1024);
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_convert_messages_splits_system_prompt() {
        let messages = vec![
            Message::system("You are an analyst."),
            Message::user("How many policies?"),
            Message::assistant("42"),
        ];

        let (system, converted) = BedrockClient::convert_messages(&messages).unwrap();

        assert_eq!(system, vec![SystemContentBlock::Text("You are an analyst.".into())]);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role(), &ConversationRole::User);
        assert_eq!(converted[1].role(), &ConversationRole::Assistant);
        assert_eq!(converted[1].content()[0].as_text().unwrap(), "42");
    }

    #[test]
    fn test_convert_tool_round_messages() {
        let response = LlmResponse::with_tool_calls(
            "",
            vec![
                ToolCall::new("t1", "athena_query", r#"{"sql":"SELECT 1","database":"insurance_db"}"#),
                ToolCall::new("t2", "athena_query", "not json"),
            ],
        );
        let messages = vec![
            Message::user("q"),
            Message::assistant_tool_calls(&response),
            Message::tool_result(ToolResult {
                tool_call_id: "t1".to_string(),
                content: "[]".to_string(),
            }),
            Message::tool_result(ToolResult {
                tool_call_id: "t2".to_string(),
                content: "Athena query failed: FAILED".to_string(),
            }),
        ];

        let (_, converted) = BedrockClient::convert_messages(&messages).unwrap();

        assert_eq!(converted.len(), 3);

        let calls = converted[1].content();
        assert_eq!(calls.len(), 2);
        let first = calls[0].as_tool_use().unwrap();
        assert_eq!(first.tool_use_id(), "t1");
        assert_eq!(
            from_document(first.input()),
            json!({"sql": "SELECT 1", "database": "insurance_db"})
        );
        assert_eq!(from_document(calls[1].as_tool_use().unwrap().input()), json!({}));

        assert_eq!(converted[2].role(), &ConversationRole::User);
        let results: Vec<&str> = converted[2]
            .content()
            .iter()
            .map(|b| b.as_tool_result().unwrap().tool_use_id())
            .collect();
        assert_eq!(results, vec!["t1", "t2"]);
    }

    #[test]
    fn test_tool_config_carries_schema() {
        assert!(BedrockClient::tool_config(&[]).unwrap().is_none());

        let tools = get_tool_definitions(&CatalogRegistry::new(default_catalogs()));
        let config = BedrockClient::tool_config(&tools).unwrap().unwrap();
        let Tool::ToolSpec(spec) = &config.tools()[0] else {
            panic!("Expected tool spec");
        };
        assert_eq!(spec.name(), "athena_query");
        let Some(ToolInputSchema::Json(schema)) = spec.input_schema() else {
            panic!("Expected JSON schema");
        };
        assert_eq!(from_document(schema)["required"], json!(["sql", "database"]));
    }

    #[test]
    fn test_into_llm_response_collects_tool_calls() {
        let call = ToolUseBlock::builder()
            .tool_use_id("tooluse_1")
            .name("athena_query")
            .input(to_document(&json!({"sql": "SELECT 1", "database": "sentra_db", "limit": -5})))
            .build()
            .unwrap();
        let blocks = vec![
            ContentBlock::Text("Let me check.".into()),
            ContentBlock::ToolUse(call),
        ];

        let response = into_llm_response(&blocks);

        assert_eq!(response.content, "Let me check.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "tooluse_1");
        let args: Value = serde_json::from_str(&response.tool_calls[0].arguments).unwrap();
        assert_eq!(args["database"], "sentra_db");
        assert_eq!(args["limit"], -5);
    }
}
