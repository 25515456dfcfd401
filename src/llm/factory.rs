//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use aws_config::SdkConfig;

use crate::error::{Result, SentraError};
use crate::llm::{
    anthropic, bedrock, AnthropicClient, AnthropicConfig, BedrockClient, BedrockConfig, LlmClient,
    LlmProvider, MockLlmClient,
};

/// Creates an LLM client for the given provider.
///
/// The Anthropic key is resolved from `api_key`, then `ANTHROPIC_API_KEY`.
/// The model falls back to `ANTHROPIC_MODEL` (or `BEDROCK_MODEL_ID`), then
/// the built-in default. Bedrock needs the shared AWS configuration in `sdk`.
pub fn create_client(
    provider: LlmProvider,
    api_key: Option<String>,
    model: Option<String>,
    sdk: Option<&SdkConfig>,
) -> Result<Arc<dyn LlmClient>> {
    match provider {
        LlmProvider::Anthropic => {
            let key = api_key
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    SentraError::config(
                        "No API key configured. Set ANTHROPIC_API_KEY or use --mock.",
                    )
                })?;
            let model = model
                .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
                .unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string());
            tracing::info!(provider = %provider, model = %model, "Created LLM client");
            Ok(Arc::new(AnthropicClient::new(AnthropicConfig::new(
                key, model,
            ))?))
        }
        LlmProvider::Bedrock => {
            let sdk = sdk.ok_or_else(|| {
                SentraError::config("The bedrock provider needs AWS configuration; use --mock offline.")
            })?;
            let model = model
                .or_else(|| std::env::var("BEDROCK_MODEL_ID").ok())
                .unwrap_or_else(|| bedrock::DEFAULT_MODEL_ID.to_string());
            tracing::info!(provider = %provider, model = %model, "Created LLM client");
            Ok(Arc::new(BedrockClient::new(sdk, BedrockConfig::new(model))))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::demo())),
    }
}
