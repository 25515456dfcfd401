//! Application wiring.
//!
//! Builds the query, memory, schema, identity and LLM backends from the
//! configuration. With `mock` set every backend is in-process and no AWS
//! credentials are needed.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::{info, warn};

use crate::auth::{CognitoIdentityProvider, IdentityProvider, MockIdentityProvider};
use crate::catalog::{CatalogRegistry, GlueSchemaCatalog, MockSchemaCatalog, SchemaCatalog};
use crate::config::{Config, MemoryBackend};
use crate::error::{Result, SentraError};
use crate::llm::{create_client, AgentService, LlmClient, LlmProvider};
use crate::memory::{
    resolve_memory_id, AgentCoreMemoryStore, InMemoryMemoryStore, MemoryHook, MemoryStore,
};
use crate::query::{AthenaConfig, AthenaQueryService, MockQueryService, QueryExecutor, QueryService};
use crate::server::AppState;

/// Password of the demo users in mock mode.
pub const MOCK_PASSWORD: &str = "sentra-demo";

/// Configuration plus the shared AWS settings.
pub struct AppContext {
    config: Config,
    mock: bool,
    sdk: Option<SdkConfig>,
}

impl AppContext {
    /// Loads AWS settings for the configured region, unless `mock` is set.
    pub async fn load(config: Config, mock: bool) -> Self {
        let sdk = if mock {
            None
        } else {
            let sdk = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.aws.region.clone()))
                .load()
                .await;
            Some(sdk)
        };

        info!(mock, region = %config.aws.region, "Loaded application context");
        Self { config, mock, sdk }
    }

    /// A context with in-process backends only.
    pub fn mock(config: Config) -> Self {
        Self {
            config,
            mock: true,
            sdk: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    fn sdk(&self) -> Result<&SdkConfig> {
        self.sdk
            .as_ref()
            .ok_or_else(|| SentraError::internal("AWS configuration was not loaded"))
    }

    pub fn query_service(&self) -> Result<Arc<dyn QueryService>> {
        if self.mock {
            return Ok(Arc::new(MockQueryService::new()));
        }
        let athena = AthenaConfig::new(self.config.require_output_location()?)
            .with_workgroup(&self.config.athena.workgroup);
        let client = aws_sdk_athena::Client::new(self.sdk()?);
        Ok(Arc::new(AthenaQueryService::new(client, athena)))
    }

    pub fn executor(&self) -> Result<QueryExecutor> {
        Ok(QueryExecutor::new(self.query_service()?)
            .with_poll_interval(self.config.athena.poll_interval())
            .with_timeout(self.config.athena.timeout()))
    }

    pub fn schema_catalog(&self) -> Result<Arc<dyn SchemaCatalog>> {
        if self.mock {
            return Ok(Arc::new(MockSchemaCatalog::sample()));
        }
        let client = aws_sdk_glue::Client::new(self.sdk()?);
        Ok(Arc::new(GlueSchemaCatalog::new(client)))
    }

    /// Opens the configured memory store, resolving (or creating) the memory by name if needed.
    pub async fn memory_store(&self) -> Result<Arc<dyn MemoryStore>> {
        if self.mock || self.config.memory.backend == MemoryBackend::InMemory {
            return Ok(Arc::new(InMemoryMemoryStore::new()));
        }

        let sdk = self.sdk()?;
        let memory_id = match &self.config.memory.memory_id {
            Some(id) => id.clone(),
            None => {
                let control = aws_sdk_bedrockagentcorecontrol::Client::new(sdk);
                let memory = &self.config.memory;
                resolve_memory_id(&control, &memory.memory_name, memory.create_if_missing).await?
            }
        };
        info!(memory_id = %memory_id, "Using AgentCore memory");

        let client = aws_sdk_bedrockagentcore::Client::new(sdk);
        Ok(Arc::new(AgentCoreMemoryStore::new(client, memory_id)))
    }

    pub fn identity(&self) -> Result<Arc<dyn IdentityProvider>> {
        if self.mock {
            let provider = self
                .config
                .access
                .personas
                .iter()
                .fold(MockIdentityProvider::new(), |p, persona| {
                    p.with_user(&persona.user_id, MOCK_PASSWORD)
                });
            return Ok(Arc::new(provider));
        }

        let auth = &self.config.auth;
        let (Some(client_id), Some(client_secret)) = (&auth.client_id, &auth.client_secret) else {
            return Err(SentraError::config(
                "No user pool client configured. Set COGNITO_CLIENT_ID and COGNITO_CLIENT_SECRET.",
            ));
        };
        let client = aws_sdk_cognitoidentityprovider::Client::new(self.sdk()?);
        Ok(Arc::new(CognitoIdentityProvider::new(
            client,
            client_id,
            client_secret,
        )))
    }

    pub fn llm(&self) -> Result<Arc<dyn LlmClient>> {
        let provider = if self.mock {
            LlmProvider::Mock
        } else {
            self.config.llm.provider
        };
        create_client(provider, None, self.config.llm.model.clone(), self.sdk.as_ref())
    }

    /// Builds the catalog registry and loads table schemas.
    pub async fn catalogs(&self) -> Result<CatalogRegistry> {
        let mut registry = CatalogRegistry::new(self.config.catalogs.clone());
        let source = self.schema_catalog()?;
        registry.load_schemas(source.as_ref()).await;
        if registry.iter().all(|c| c.schemas.is_empty()) {
            warn!("No table schemas loaded; the model will see catalog descriptions only");
        }
        Ok(registry)
    }

    /// Builds the agent with every backend it needs.
    pub async fn agent(&self) -> Result<AgentService> {
        let memory = MemoryHook::new(self.memory_store().await?)
            .with_history_turns(self.config.memory.history_turns);

        Ok(AgentService::new(
            self.llm()?,
            self.executor()?,
            Arc::new(self.catalogs().await?),
            Arc::new(self.config.access.clone()),
            memory,
        )
        .with_max_tool_rounds(self.config.llm.max_tool_rounds))
    }

    /// Builds the HTTP router state.
    pub async fn app_state(&self) -> Result<AppState> {
        Ok(
            AppState::new(Arc::new(self.agent().await?), self.identity()?)
                .with_request_timeout(self.config.server.request_timeout()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_context_builds_every_backend() {
        let ctx = AppContext::mock(Config::default());

        assert!(ctx.is_mock());
        assert!(ctx.executor().is_ok());
        assert!(ctx.memory_store().await.is_ok());
        assert!(ctx.llm().is_ok());
        let catalogs = ctx.catalogs().await.unwrap();
        assert!(catalogs.iter().any(|c| !c.schemas.is_empty()));
        assert!(ctx.app_state().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_identity_knows_personas() {
        let ctx = AppContext::mock(Config::default());
        let identity = ctx.identity().unwrap();

        let tokens = identity.login("vishal.saxena", MOCK_PASSWORD).await.unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert!(identity.login("vishal.saxena", "wrong").await.is_err());
    }

    #[test]
    fn test_real_context_without_sdk_reports_error() {
        let ctx = AppContext {
            config: Config::default(),
            mock: false,
            sdk: None,
        };
        assert!(ctx.schema_catalog().is_err());
        // Output location is checked before the SDK settings
        match ctx.query_service() {
            Err(SentraError::Config(msg)) => assert!(msg.contains("output location")),
            _ => panic!("Expected config error"),
        }
    }
}
