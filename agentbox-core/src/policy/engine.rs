//! Policy engine: default-deny authorization of tool invocations
//!
//! The engine holds one compiled rule per tool named in the policy. Rule kinds
//! are pluggable through [`RuleEvaluator`]; the built-in registry maps
//! `web_request` to the network-request rule and `read_file` to the file-path
//! rule.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::decision::PolicyDecision;
use super::document::{BudgetLimits, PolicyDocument};
use super::network::NetworkRequestEvaluator;
use super::path::FilePathEvaluator;
use crate::error::Result;

/// A rule kind that can be attached to a tool name
///
/// `compile` runs once when the engine is built and must reject malformed
/// parameters with `AgentBoxError::InvalidPolicy`.
pub trait RuleEvaluator: Send + Sync {
    /// Short name of the rule kind, used in logs
    fn kind(&self) -> &'static str;

    /// Parse and validate the rule parameters for `tool_name`
    fn compile(&self, tool_name: &str, rules: &Value) -> Result<Box<dyn ToolRule>>;
}

/// Compiled rule for a single tool
///
/// Evaluation is pure: no I/O, no interior mutability.
pub trait ToolRule: Send + Sync + std::fmt::Debug {
    fn evaluate(&self, args: &Value) -> PolicyDecision;
}

/// Registry of rule evaluators keyed by tool name
#[derive(Clone)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn RuleEvaluator>>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("tools", &self.evaluators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EvaluatorRegistry {
    /// An empty registry; every tool in the policy would lack validation logic
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// Registry with the built-in `web_request` and `read_file` rules
    pub fn with_defaults() -> Self {
        Self::empty()
            .with_evaluator("web_request", Arc::new(NetworkRequestEvaluator))
            .with_evaluator("read_file", Arc::new(FilePathEvaluator))
    }

    /// Attach an evaluator to a tool name, replacing any previous one
    pub fn with_evaluator(
        mut self,
        tool_name: impl Into<String>,
        evaluator: Arc<dyn RuleEvaluator>,
    ) -> Self {
        self.register(tool_name, evaluator);
        self
    }

    pub fn register(&mut self, tool_name: impl Into<String>, evaluator: Arc<dyn RuleEvaluator>) {
        self.evaluators.insert(tool_name.into(), evaluator);
    }

    pub fn get(&self, tool_name: &str) -> Option<&Arc<dyn RuleEvaluator>> {
        self.evaluators.get(tool_name)
    }
}

/// Evaluates tool invocations against a [`PolicyDocument`]
///
/// Built once at startup and shared read-only (`Arc<PolicyEngine>`).
#[derive(Debug)]
pub struct PolicyEngine {
    document: PolicyDocument,
    rules: HashMap<String, Box<dyn ToolRule>>,
}

impl PolicyEngine {
    /// Build an engine with the built-in evaluators.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if any rule set fails to compile.
    pub fn new(document: PolicyDocument) -> Result<Self> {
        Self::with_registry(document, &EvaluatorRegistry::with_defaults())
    }

    /// Build an engine with a custom evaluator registry
    pub fn with_registry(document: PolicyDocument, registry: &EvaluatorRegistry) -> Result<Self> {
        let mut rules = HashMap::new();
        for (tool_name, params) in &document.tools {
            match registry.get(tool_name) {
                Some(evaluator) => {
                    let rule = evaluator.compile(tool_name, params)?;
                    tracing::debug!(tool = %tool_name, kind = evaluator.kind(), "Compiled tool rule");
                    rules.insert(tool_name.clone(), rule);
                }
                None => {
                    tracing::warn!(
                        tool = %tool_name,
                        "Tool is listed in policy but has no rule evaluator; calls will be denied"
                    );
                }
            }
        }

        Ok(Self { document, rules })
    }

    /// Load a policy file and build an engine from it
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::new(PolicyDocument::load(path)?)
    }

    /// Decide whether `tool_name` may run with `args`.
    ///
    /// Deterministic; identical inputs always produce equal decisions.
    pub fn validate(&self, tool_name: &str, args: &Value) -> PolicyDecision {
        if !self.document.contains_tool(tool_name) {
            return PolicyDecision::deny(format!(
                "Tool '{}' is not in policy (default deny)",
                tool_name
            ));
        }

        match self.rules.get(tool_name) {
            Some(rule) => rule.evaluate(args),
            None => PolicyDecision::deny(format!("No validation logic for tool '{}'", tool_name)),
        }
    }

    pub fn limits(&self) -> &BudgetLimits {
        &self.document.limits
    }

    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }
}
