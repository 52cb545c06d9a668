use serde::{Deserialize, Serialize};

/// Outcome of evaluating one tool invocation against the policy
///
/// The reason is always populated, for allows as well as denies, so that
/// audit consumers can explain every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the invocation may execute
    pub allowed: bool,

    /// Human-readable explanation
    pub reason: String,
}

impl PolicyDecision {
    /// Create an allow decision
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    /// Create a deny decision
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

impl std::fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.allowed { "allow" } else { "deny" };
        write!(f, "{}: {}", verdict, self.reason)
    }
}
