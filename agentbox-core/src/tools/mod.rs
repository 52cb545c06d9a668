//! Tool layer for agent capabilities
//!
//! Key pieces:
//! - [`Tool`]: metadata, parameter schema and async execution
//! - [`ToolRegistry`]: name-keyed lookup with duplicate detection
//! - [`ToolError`]: structured failures that are reported to the model
//!   instead of aborting the run
//! - Built-in tools: [`ReadFileTool`] and [`WebRequestTool`]
//!
//! # Example
//!
//! ```rust,no_run
//! use agentbox_core::tools::{ToolRegistry, builtin_tools};
//! use std::time::Duration;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register_all(builtin_tools(Duration::from_secs(10))).unwrap();
//! ```

mod error;
mod read_file;
mod registry;
mod tool;
mod web_request;

pub use error::{ToolError, ToolErrorKind, ValidationError};
pub use read_file::{READ_FILE_TOOL, ReadFileTool};
pub use registry::{RegistryError, ToolRegistry};
pub use tool::{BoxedTool, Tool, ToolDefinition, ToolMetadata, ToolSchema};
pub use web_request::{DEFAULT_HTTP_TIMEOUT, WEB_REQUEST_TOOL, WebRequestTool};

use std::sync::Arc;
use std::time::Duration;

/// The built-in `read_file` and `web_request` tools
pub fn builtin_tools(http_timeout: Duration) -> Vec<BoxedTool> {
    vec![
        Arc::new(ReadFileTool::new()),
        Arc::new(WebRequestTool::with_timeout(http_timeout)),
    ]
}
