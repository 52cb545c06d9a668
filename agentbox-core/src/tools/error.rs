//! Tool error taxonomy
//!
//! Tool failures never abort a run; the runtime folds them into the
//! conversation as `{"error": "..."}` results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Structured tool error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind
    pub kind: ToolErrorKind,

    /// Human-readable error message
    pub message: String,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Add context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Create a validation error from field errors
    pub fn validation(errors: Vec<ValidationError>) -> Self {
        Self {
            kind: ToolErrorKind::Validation,
            message: errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            context: serde_json::to_value(&errors).ok(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("Request timed out after {} seconds", duration.as_secs_f64()),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PermissionDenied, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Transient, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments are missing or have the wrong shape
    Validation,

    /// Execution exceeded its local timeout
    Timeout,

    /// Network or service error
    Transient,

    /// Resource not found
    NotFound,

    /// Permission denied by the operating system or remote service
    PermissionDenied,

    /// Remote side returned something unusable
    InvalidResponse,

    /// Internal tool error
    Internal,
}

/// Validation error for a specific field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field path (e.g., "url")
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
