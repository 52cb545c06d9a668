//! Policy document model and loading
//!
//! A policy file has two top-level sections:
//!
//! ```yaml
//! tools:
//!   web_request:
//!     allow_domains: ["example.org"]
//!     allow_methods: ["GET"]
//!   read_file:
//!     allow_paths: ["/data/**"]
//! limits:
//!   max_tool_calls: 20
//!   max_runtime_seconds: 120
//! ```
//!
//! Rule parameters under `tools` are kept opaque here; they are interpreted
//! by the rule evaluator registered for each tool when the engine is built.

use figment::{
    Figment,
    providers::{Format, Json, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AgentBoxError, Result};

/// Global budget limits for a run
///
/// `None` means unbounded. A limit that is not written in the policy is
/// never treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLimits {
    /// Maximum number of executed (allowed) tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u64>,

    /// Maximum wall-clock runtime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runtime_seconds: Option<f64>,
}

impl BudgetLimits {
    /// No limits at all
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_tool_calls(mut self, max: u64) -> Self {
        self.max_tool_calls = Some(max);
        self
    }

    pub fn with_max_runtime_seconds(mut self, seconds: f64) -> Self {
        self.max_runtime_seconds = Some(seconds);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.max_runtime_seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(AgentBoxError::InvalidPolicy(format!(
                    "limits.max_runtime_seconds must be a non-negative number, got {}",
                    seconds
                )));
            }
        }
        Ok(())
    }
}

/// Serialization format of a policy file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Yaml,
    Json,
    Toml,
}

impl PolicyFormat {
    /// Pick a format from the file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => PolicyFormat::Json,
            Some("toml") => PolicyFormat::Toml,
            _ => PolicyFormat::Yaml,
        }
    }
}

/// Parsed authorization policy
///
/// Immutable once loaded; share it across runs behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Tool name to tool-specific rule parameters
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools: BTreeMap<String, Value>,

    /// Global budget limits
    #[serde(default, deserialize_with = "null_as_default")]
    pub limits: BudgetLimits,
}

/// A section written with no body (`tools:`) reads the same as an absent one
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PolicyDocument {
    /// Create an empty policy (denies every tool, no limits)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rule parameters for a tool
    pub fn with_tool(mut self, name: impl Into<String>, rules: Value) -> Self {
        self.tools.insert(name.into(), rules);
        self
    }

    /// Replace the budget limits
    pub fn with_limits(mut self, limits: BudgetLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a policy from a file.
    ///
    /// The format is chosen from the extension (`.json`, `.toml`, anything
    /// else is read as YAML).
    ///
    /// # Errors
    ///
    /// Returns `PolicyNotFound` if the file does not exist and
    /// `InvalidPolicy` if it cannot be parsed or its limits are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AgentBoxError::PolicyNotFound(path.to_path_buf()));
        }

        let figment = match PolicyFormat::from_path(path) {
            PolicyFormat::Yaml => Figment::from(Yaml::file(path)),
            PolicyFormat::Json => Figment::from(Json::file(path)),
            PolicyFormat::Toml => Figment::from(Toml::file(path)),
        };

        let document = Self::extract(figment)?;
        tracing::debug!(
            path = %path.display(),
            tools = document.tools.len(),
            "Loaded policy document"
        );
        Ok(document)
    }

    /// Parse a policy from an in-memory string
    pub fn parse(source: &str, format: PolicyFormat) -> Result<Self> {
        let figment = match format {
            PolicyFormat::Yaml => Figment::from(Yaml::string(source)),
            PolicyFormat::Json => Figment::from(Json::string(source)),
            PolicyFormat::Toml => Figment::from(Toml::string(source)),
        };
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let document: PolicyDocument = figment
            .extract()
            .map_err(|e| AgentBoxError::InvalidPolicy(e.to_string()))?;
        document.limits.validate()?;
        Ok(document)
    }

    /// Whether the policy mentions this tool at all
    pub fn contains_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Rule parameters for a tool, if present
    pub fn tool_rules(&self, name: &str) -> Option<&Value> {
        self.tools.get(name)
    }
}
