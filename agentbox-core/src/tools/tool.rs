//! Tool trait and metadata definitions
//!
//! Tools are the only way an agent touches the outside world. The runtime
//! consults the policy engine before `execute` is ever called.

use super::error::{ToolError, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tool metadata for model-facing discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier, also the policy key)
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// Tool version
    pub version: Option<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: None,
        }
    }

    /// Set version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema for input parameters
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Create an empty schema (tool takes no parameters)
    pub fn empty() -> Self {
        Self {
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

/// Function definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Core tool trait
///
/// Implement this to expose a capability to the agent. Failures are returned
/// as [`ToolError`] and reported back to the model; they never end the run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool name (convenience method)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Get tool description (convenience method)
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Get the JSON schema for this tool's parameters
    fn schema(&self) -> ToolSchema;

    /// Definition sent to the model with every request
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().parameters,
        }
    }

    /// Validate input arguments before execution
    ///
    /// Default implementation performs no validation.
    fn validate(&self, _args: &Value) -> Result<(), Vec<ValidationError>> {
        Ok(())
    }

    /// Execute the tool with given arguments
    ///
    /// Called only after the policy allowed the invocation and `validate`
    /// passed.
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Type alias for shared tools
pub type BoxedTool = Arc<dyn Tool>;
