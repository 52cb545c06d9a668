//! Configuration types for AgentBox
//!
//! Policy documents are separate from this file: they describe what an agent
//! may do, while this configuration describes how the process runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AgentBoxError, Result};

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentBoxConfig {
    /// Model provider configuration
    pub llm: LLMProviderConfig,

    /// Runtime loop configuration
    pub runtime: RuntimeSettings,

    /// Built-in tool configuration
    pub tools: ToolsConfig,

    /// Audit log configuration
    pub audit: AuditConfig,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProvider,

    /// Model name
    pub model: String,

    /// API key (prefer provider env vars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Upper bound on a single model call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
}

/// Runtime loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Iteration ceiling per run
    pub max_iterations: usize,

    /// Characters of a tool result kept in audit previews
    pub result_preview_chars: usize,

    /// Optional system prompt prepended to every run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            result_preview_chars: 200,
            system_prompt: None,
        }
    }
}

/// Built-in tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Timeout for `web_request`
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL file to append events to; no file sink when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl AgentBoxConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `agentbox.toml` in the working directory
    /// 3. The file named by `AGENTBOX_CONFIG_PATH`
    /// 4. `AGENTBOX_`-prefixed environment variables, with `__` separating
    ///    sections (e.g. `AGENTBOX_RUNTIME__MAX_ITERATIONS=5`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(AgentBoxConfig::default()))
            .merge(Toml::file("agentbox.toml"));

        if let Ok(path) = std::env::var("AGENTBOX_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: AgentBoxConfig = figment
            .merge(Env::prefixed("AGENTBOX_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                AgentBoxError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.is_file() {
            return Err(AgentBoxError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: AgentBoxConfig = Figment::from(Serialized::defaults(AgentBoxConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                AgentBoxError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.runtime.max_iterations == 0 {
            return Err(AgentBoxError::Configuration(
                "runtime.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.llm.request_timeout.is_zero() {
            return Err(AgentBoxError::Configuration(
                "llm.request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AgentBoxError::Configuration(
                "llm.model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
