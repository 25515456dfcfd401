//! Configuration management for Sentra.
//!
//! Handles loading configuration from TOML files and environment variables.
//! A missing file yields the defaults; environment variables fill values
//! the file leaves unset.

use crate::catalog::{default_catalogs, Catalog};
use crate::error::{Result, SentraError};
use crate::llm::{LlmProvider, DEFAULT_MAX_TOOL_ROUNDS};
use crate::safety::AccessPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Main configuration structure for Sentra.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub athena: AthenaSettings,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    /// Databases the agent may query.
    pub catalogs: Vec<Catalog>,
    /// Personas and their record scopes.
    pub access: AccessPolicy,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws: AwsConfig::default(),
            athena: AthenaSettings::default(),
            llm: LlmConfig::default(),
            memory: MemoryConfig::default(),
            auth: AuthConfig::default(),
            server: ServerConfig::default(),
            catalogs: default_catalogs(),
            access: AccessPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// AWS settings shared by every service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "ap-south-1".to_string(),
        }
    }
}

/// Athena statement execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AthenaSettings {
    pub workgroup: String,
    /// S3 location for query results (`s3://bucket/prefix/`).
    pub output_location: Option<String>,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for AthenaSettings {
    fn default() -> Self {
        Self {
            workgroup: crate::query::DEFAULT_WORKGROUP.to_string(),
            output_location: None,
            poll_interval_ms: 1000,
            timeout_secs: 300,
        }
    }
}

impl AthenaSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider: "anthropic", "bedrock" or "mock".
    pub provider: LlmProvider,

    /// Model name; the provider default is used when unset.
    pub model: Option<String>,

    /// Rounds of tool calls allowed per request.
    pub max_tool_rounds: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// Where conversation memory is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryBackend {
    #[default]
    #[serde(rename = "agentcore")]
    AgentCore,
    InMemory,
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: MemoryBackend,
    /// Memory resource id. Resolved from `memory_name` when unset.
    pub memory_id: Option<String>,
    /// Name prefix used to look up the memory resource.
    pub memory_name: String,
    /// Create the memory resource when no id matches `memory_name`.
    pub create_if_missing: bool,
    /// Turns of history loaded into the prompt.
    pub history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            memory_id: None,
            memory_name: "Sentra_Agent_Memory_V1".to_string(),
            create_if_missing: true,
            history_turns: crate::memory::DEFAULT_HISTORY_TURNS,
        }
    }
}

/// User pool app client credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 180,
        }
    }
}

impl ServerConfig {
    /// Returns the `host:port` address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file; stderr is used when unset.
    pub file: Option<PathBuf>,
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sentra")
            .join("config.toml")
    }

    /// Loads `.env`, the config file and environment overrides, then validates.
    pub fn load(path: &Path) -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SentraError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            SentraError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills unset values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Fills unset values from `lookup`.
    ///
    /// `AWS_REGION` always wins over the file; the other variables only
    /// fill gaps.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = get("AWS_REGION") {
            self.aws.region = region;
        }
        if self.athena.output_location.is_none() {
            self.athena.output_location = get("ATHENA_OUTPUT_LOCATION");
        }
        if self.auth.client_id.is_none() {
            self.auth.client_id = get("COGNITO_CLIENT_ID");
        }
        if self.auth.client_secret.is_none() {
            self.auth.client_secret = get("COGNITO_CLIENT_SECRET");
        }
        if self.memory.memory_id.is_none() {
            self.memory.memory_id = get("SENTRA_MEMORY_ID");
        }
    }

    /// Checks values that would only fail later at request time.
    pub fn validate(&self) -> Result<()> {
        if let Some(location) = &self.athena.output_location {
            let url = Url::parse(location).map_err(|e| {
                SentraError::config(format!("Invalid athena.output_location '{location}': {e}"))
            })?;
            if url.scheme() != "s3" {
                return Err(SentraError::config(format!(
                    "Invalid scheme '{}' in athena.output_location. Expected 's3'",
                    url.scheme()
                )));
            }
        }

        if self.athena.poll_interval_ms == 0 {
            return Err(SentraError::config(
                "athena.poll_interval_ms must be greater than 0",
            ));
        }

        if self.catalogs.is_empty() {
            return Err(SentraError::config("At least one catalog must be configured"));
        }
        let mut seen = HashSet::new();
        for catalog in &self.catalogs {
            if !seen.insert(catalog.name.as_str()) {
                return Err(SentraError::config(format!(
                    "Catalog '{}' is configured more than once",
                    catalog.name
                )));
            }
        }

        Ok(())
    }

    /// Returns the Athena output location or a configuration error.
    pub fn require_output_location(&self) -> Result<&str> {
        self.athena.output_location.as_deref().ok_or_else(|| {
            SentraError::config(
                "No Athena output location configured. Set athena.output_location or ATHENA_OUTPUT_LOCATION.",
            )
        })
    }
}
