//! Default-deny authorization policy for tool invocations
//!
//! - [`PolicyDocument`]: parsed policy file (per-tool rules and budget limits)
//! - [`PolicyEngine`]: pure decision function over a document
//! - [`RuleEvaluator`]: pluggable rule kinds keyed by tool name
//!
//! # Example
//!
//! ```rust,no_run
//! use agentbox_core::policy::{PolicyDocument, PolicyEngine};
//!
//! # fn main() -> agentbox_core::error::Result<()> {
//! let engine = PolicyEngine::new(PolicyDocument::load("policy.yaml")?)?;
//! let decision = engine.validate(
//!     "web_request",
//!     &serde_json::json!({"url": "https://example.org"}),
//! );
//! println!("{}", decision);
//! # Ok(())
//! # }
//! ```

mod decision;
mod document;
mod engine;
mod network;
mod path;

pub use decision::PolicyDecision;
pub use document::{BudgetLimits, PolicyDocument, PolicyFormat};
pub use engine::{EvaluatorRegistry, PolicyEngine, RuleEvaluator, ToolRule};
pub use network::{NetworkRequestEvaluator, NetworkRequestRule, NetworkRequestRules};
pub use path::{FilePathEvaluator, FilePathRule, FilePathRules, normalize_path};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AgentBoxError, Result};

/// Deserialize a tool's rule block; `null` yields the empty rule set
pub(crate) fn parse_rules<T>(tool_name: &str, rules: &Value) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if rules.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(rules.clone())
        .map_err(|e| AgentBoxError::InvalidPolicy(format!("tools.{}: {}", tool_name, e)))
}
