//! Error types for AgentBox operations

use std::path::PathBuf;

use crate::runtime::BudgetViolation;

/// Result type for AgentBox operations
pub type Result<T> = std::result::Result<T, AgentBoxError>;

/// Error types for the AgentBox engine and runtime
#[derive(Debug, thiserror::Error)]
pub enum AgentBoxError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Policy file does not exist
    #[error("Policy file not found: {}", .0.display())]
    PolicyNotFound(PathBuf),

    /// Policy file exists but could not be parsed or validated
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A run-level budget was exhausted
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(BudgetViolation),

    /// The run hit its iteration ceiling without a final answer
    #[error("Max iterations ({max_iterations}) reached without completion")]
    MaxIterationsReached { max_iterations: usize },

    /// The run was cancelled between iterations
    #[error("Run cancelled")]
    Cancelled,

    /// Model provider transport or API failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl AgentBoxError {
    /// Whether this error ends a run as a terminal condition rather than a failure
    pub fn is_terminal_condition(&self) -> bool {
        matches!(
            self,
            AgentBoxError::BudgetExceeded(_)
                | AgentBoxError::MaxIterationsReached { .. }
                | AgentBoxError::Cancelled
        )
    }

    /// Stable name used in audit records
    pub fn kind_name(&self) -> &'static str {
        match self {
            AgentBoxError::Configuration(_) => "configuration",
            AgentBoxError::PolicyNotFound(_) => "policy_not_found",
            AgentBoxError::InvalidPolicy(_) => "invalid_policy",
            AgentBoxError::BudgetExceeded(_) => "budget_exceeded",
            AgentBoxError::MaxIterationsReached { .. } => "max_iterations_reached",
            AgentBoxError::Cancelled => "cancelled",
            AgentBoxError::Provider(_) => "provider",
            AgentBoxError::Io(_) => "io",
            AgentBoxError::Serialization(_) => "serialization",
            AgentBoxError::Other(_) => "other",
        }
    }
}

impl From<String> for AgentBoxError {
    fn from(s: String) -> Self {
        AgentBoxError::Other(s)
    }
}

impl From<&str> for AgentBoxError {
    fn from(s: &str) -> Self {
        AgentBoxError::Other(s.to_string())
    }
}
