//! # AgentBox - Policy-Governed Runtime for Tool-Using Agents
//!
//! AgentBox runs a model in a loop and puts a default-deny policy engine in
//! front of every tool call the model proposes:
//! - Declarative policies loaded from YAML, JSON or TOML
//! - Per-tool rules for network requests and file paths
//! - Run budgets on executed tool calls and wall-clock time
//! - An append-only JSONL audit trail of every decision and result
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentbox_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AgentBoxConfig::load()?;
//!     let provider = LLMProviderFactory::create(&config.llm)?;
//!     let policy = Arc::new(PolicyEngine::from_file("policy.yaml")?);
//!
//!     let mut tools = ToolRegistry::new();
//!     tools
//!         .register_all(builtin_tools(config.tools.http_timeout))
//!         .map_err(|e| e.to_string())?;
//!
//!     let runtime = AgentRuntime::new(provider, tools, policy)
//!         .with_settings(&config.runtime)
//!         .with_audit_sink(Arc::new(JsonlAuditSink::open("audit.jsonl")?));
//!
//!     let output = runtime.run_prompt("Fetch https://example.org").await?;
//!     println!("{}", output.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Policy format
//!
//! ```yaml
//! tools:
//!   web_request:
//!     allow_domains: ["api.example.org"]
//!     allow_methods: ["GET"]
//!   read_file:
//!     allow_paths: ["/data/**"]
//! limits:
//!   max_tool_calls: 20
//!   max_runtime_seconds: 120
//! ```
//!
//! ## Feature Flags
//!
//! - `llm-openai`: OpenAI-compatible chat completions provider

pub mod audit;
pub mod config;
pub mod error;
pub mod llm;
pub mod policy;
pub mod runtime;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audit::{
        AuditEvent, AuditEventKind, AuditSink, InMemoryAuditSink, JsonlAuditSink,
    };
    pub use crate::config::{
        AgentBoxConfig, AuditConfig, LLMProvider as LLMProviderType, LLMProviderConfig,
        RuntimeSettings, ToolsConfig,
    };
    pub use crate::error::{AgentBoxError, Result};
    pub use crate::llm::{
        LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, Message, MessageRole,
        ScriptedProvider, ScriptedTurn, ToolInvocation,
    };
    pub use crate::policy::{
        BudgetLimits, EvaluatorRegistry, PolicyDecision, PolicyDocument, PolicyEngine,
        PolicyFormat, RuleEvaluator, ToolRule,
    };
    pub use crate::runtime::{AgentRuntime, BudgetViolation, RunOutcome, RunOutput, RunState};
    pub use crate::tools::{
        BoxedTool, DEFAULT_HTTP_TIMEOUT, ReadFileTool, RegistryError, Tool, ToolDefinition,
        ToolError, ToolErrorKind, ToolMetadata, ToolRegistry, ToolSchema, ValidationError,
        WebRequestTool, builtin_tools,
    };
}
