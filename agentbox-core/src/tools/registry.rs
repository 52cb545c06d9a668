//! Tool registry: registration, lookup and model-facing definitions
//!
//! ```rust,ignore
//! use agentbox_core::tools::{ToolRegistry, ReadFileTool};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(ReadFileTool::new()))?;
//!
//! let tool = registry.get("read_file").unwrap();
//! ```

use super::error::ToolError;
use super::tool::{Tool, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Tool with this name already exists
    DuplicateTool(String),
    /// Tool not found
    NotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool(name) => {
                write!(f, "Tool '{}' is already registered", name)
            }
            RegistryError::NotFound(name) => {
                write!(f, "Tool '{}' not found", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Registry of tools available to a runtime
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// Returns an error if a tool with the same name is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register multiple tools at once
    ///
    /// Fails on the first duplicated name.
    pub fn register_all(
        &mut self,
        tools: impl IntoIterator<Item = Arc<dyn Tool>>,
    ) -> Result<(), RegistryError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Unregister a tool by name
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of every registered tool, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Run a tool's own argument validation
    pub fn validate_args(&self, tool_name: &str, args: &serde_json::Value) -> Result<(), ToolError> {
        let tool = self
            .get(tool_name)
            .ok_or_else(|| ToolError::not_found(RegistryError::NotFound(tool_name.to_string()).to_string()))?;
        tool.validate(args).map_err(ToolError::validation)
    }
}
