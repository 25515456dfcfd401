//! Response parsing for LLM outputs.
//!
//! The agent answers with a JSON object describing how to render the
//! result. The whole answer may be that object, or it may be wrapped in a
//! ```json fenced block. Anything else becomes a plain text response.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// How the frontend should render a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Text,
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartType {
    /// Returns true for the plot types, which carry a list of data points.
    pub fn is_chart(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Final answer of the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(rename = "type")]
    pub kind: ChartType,

    /// `""`, a single value, a customer record or a list of chart points.
    #[serde(default = "empty_data")]
    pub data: Value,

    pub explanation: String,

    /// Serialized as `"True"` / `"False"`.
    #[serde(
        default,
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    pub customer_specific: bool,

    #[serde(default)]
    pub query_executed: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nudge: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
}

fn empty_data() -> Value {
    Value::String(String::new())
}

impl AgentResponse {
    /// A text-only response.
    pub fn text(explanation: impl Into<String>) -> Self {
        Self {
            kind: ChartType::Text,
            data: empty_data(),
            explanation: explanation.into(),
            customer_specific: false,
            query_executed: String::new(),
            nudge: None,
            cta: None,
        }
    }

    fn validate(self) -> Option<Self> {
        if self.kind.is_chart() && !self.data.is_array() {
            return None;
        }
        Some(self)
    }
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *flag { "True" } else { "False" })
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct FlagVisitor;

    impl Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or \"True\"/\"False\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

/// Parses the final answer of the agent.
///
/// Accepts the whole answer as JSON or the first ```json block. Answers
/// that fail to parse or validate become [`AgentResponse::text`].
pub fn parse_agent_response(raw: &str) -> AgentResponse {
    let trimmed = raw.trim();

    if let Some(response) = parse_json(trimmed) {
        return response;
    }

    if let Some(block) = extract_code_block(trimmed, "json") {
        if let Some(response) = parse_json(block.trim()) {
            return response;
        }
    }

    if trimmed.starts_with('{') || trimmed.contains("```json") {
        warn!(response_len = trimmed.len(), "Agent answer is not a valid response object");
    }
    AgentResponse::text(trimmed)
}

fn parse_json(text: &str) -> Option<AgentResponse> {
    serde_json::from_str::<AgentResponse>(text)
        .ok()
        .and_then(AgentResponse::validate)
}

/// Extracts the content of the first markdown code block with the given language.
fn extract_code_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let start_pattern = format!("```{}", lang);
    let start_idx = text.find(&start_pattern)?;

    let after_fence = start_idx + start_pattern.len();
    let content_start = text[after_fence..].find('\n').map(|i| after_fence + i + 1)?;

    // Text between the language tag and the newline means a different language.
    if !text[after_fence..content_start].trim().is_empty() {
        return None;
    }

    let end_idx = text[content_start..].find("```")?;
    Some(&text[content_start..content_start + end_idx])
}
