use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AgentBoxError, Result};
use crate::llm::Message;

/// Result of a run that completed with a final answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    /// Final assistant text, empty if the model returned none
    pub content: String,
    /// Full transcript including tool calls and results
    pub conversation: Vec<Message>,
    /// Model turns requested
    pub iterations: usize,
    /// Executed tool calls
    pub tool_calls: u64,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    BudgetExceeded,
    MaxIterationsReached,
    Cancelled,
    Failed,
}

impl RunOutcome {
    pub fn from_result(result: &Result<RunOutput>) -> Self {
        match result {
            Ok(_) => RunOutcome::Completed,
            Err(e) => Self::from_error(e),
        }
    }

    pub fn from_error(error: &AgentBoxError) -> Self {
        match error {
            AgentBoxError::BudgetExceeded(_) => RunOutcome::BudgetExceeded,
            AgentBoxError::MaxIterationsReached { .. } => RunOutcome::MaxIterationsReached,
            AgentBoxError::Cancelled => RunOutcome::Cancelled,
            _ => RunOutcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::BudgetExceeded => "budget_exceeded",
            RunOutcome::MaxIterationsReached => "max_iterations_reached",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed => "failed",
        };
        f.write_str(name)
    }
}
