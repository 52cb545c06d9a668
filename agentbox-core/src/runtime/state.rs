use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::llm::Message;
use crate::policy::BudgetLimits;

/// Which budget a run exhausted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "budget", rename_all = "snake_case")]
pub enum BudgetViolation {
    /// Wall-clock time exceeded `max_runtime_seconds`
    Runtime {
        elapsed_seconds: f64,
        limit_seconds: f64,
    },
    /// Executed tool calls reached `max_tool_calls`
    ToolCalls { count: u64, limit: u64 },
}

impl std::fmt::Display for BudgetViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetViolation::Runtime {
                elapsed_seconds,
                limit_seconds,
            } => write!(
                f,
                "Runtime limit exceeded: {:.1}s > {}s",
                elapsed_seconds, limit_seconds
            ),
            BudgetViolation::ToolCalls { count, limit } => {
                write!(f, "Tool call limit exceeded: {} >= {}", count, limit)
            }
        }
    }
}

/// Mutable state of one run, owned by that run only
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub conversation: Vec<Message>,
    /// Executed (allowed) tool calls, successful or not
    pub tool_call_count: u64,
    /// Model turns requested so far
    pub iterations: usize,
    started_at: Instant,
}

impl RunState {
    pub fn new(conversation: Vec<Message>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            conversation,
            tool_call_count: 0,
            iterations: 0,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check time first, then the call count
    pub fn check_budget(&self, limits: &BudgetLimits) -> Result<(), BudgetViolation> {
        if let Some(limit_seconds) = limits.max_runtime_seconds {
            let elapsed_seconds = self.elapsed().as_secs_f64();
            if elapsed_seconds > limit_seconds {
                return Err(BudgetViolation::Runtime {
                    elapsed_seconds,
                    limit_seconds,
                });
            }
        }

        if let Some(limit) = limits.max_tool_calls {
            if self.tool_call_count >= limit {
                return Err(BudgetViolation::ToolCalls {
                    count: self.tool_call_count,
                    limit,
                });
            }
        }

        Ok(())
    }
}
