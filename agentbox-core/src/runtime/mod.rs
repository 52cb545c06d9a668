//! Agent runtime loop
//!
//! Each iteration checks budgets, asks the model for one turn, and, for every
//! proposed tool call in order, consults the policy engine before executing.
//! Denials and tool failures are folded back into the conversation; budget
//! exhaustion, the iteration ceiling, cancellation and provider errors end
//! the run and are audited as `runtime_error`.
//!
//! ```rust,no_run
//! use agentbox_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(provider: Arc<dyn LLMProvider>) -> Result<()> {
//! let policy = Arc::new(PolicyEngine::from_file("policy.yaml")?);
//! let mut tools = ToolRegistry::new();
//! tools.register_all(builtin_tools(DEFAULT_HTTP_TIMEOUT)).map_err(|e| e.to_string())?;
//!
//! let runtime = AgentRuntime::new(provider, tools, policy).with_max_iterations(5);
//! let output = runtime.run_prompt("Summarize /data/notes.txt").await?;
//! println!("{}", output.content);
//! # Ok(())
//! # }
//! ```

mod outcome;
mod state;

pub use outcome::{RunOutcome, RunOutput};
pub use state::{BudgetViolation, RunState};

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::audit::{AuditEvent, AuditSink, DEFAULT_PREVIEW_CHARS, truncate_preview};
use crate::config::RuntimeSettings;
use crate::error::{AgentBoxError, Result};
use crate::llm::{LLMProvider, LLMRequest, Message, ToolInvocation};
use crate::policy::PolicyEngine;
use crate::tools::ToolRegistry;

/// Default iteration ceiling
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Drives model turns, policy checks and tool execution for one agent
pub struct AgentRuntime {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    policy: Arc<PolicyEngine>,
    audit: Option<Arc<dyn AuditSink>>,
    max_iterations: usize,
    preview_chars: usize,
    system_prompt: Option<String>,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("provider", &self.provider.model_info())
            .field("tools", &self.tools)
            .field("max_iterations", &self.max_iterations)
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
        policy: Arc<PolicyEngine>,
    ) -> Self {
        Self {
            provider,
            tools,
            policy,
            audit: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            system_prompt: None,
            cancellation: None,
        }
    }

    /// Apply iteration ceiling, preview length and system prompt from config
    pub fn with_settings(mut self, settings: &RuntimeSettings) -> Self {
        self.max_iterations = settings.max_iterations;
        self.preview_chars = settings.result_preview_chars;
        self.system_prompt = settings.system_prompt.clone();
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Stop the loop at the next iteration boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a single user prompt, prefixed by the configured system prompt
    pub async fn run_prompt(&self, prompt: impl Into<String>) -> Result<RunOutput> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        self.run(messages).await
    }

    /// Run the loop over an initial conversation.
    ///
    /// # Errors
    ///
    /// `BudgetExceeded`, `MaxIterationsReached`, `Cancelled`, or whatever the
    /// provider returned. Each is audited as `runtime_error` first.
    pub async fn run(&self, mut messages: Vec<Message>) -> Result<RunOutput> {
        self.run_in(&mut messages).await
    }

    /// Run the loop, appending every turn to `conversation` in place.
    ///
    /// The transcript survives terminal errors: after a budget, iteration,
    /// cancellation or provider failure, `conversation` holds everything
    /// exchanged up to that point.
    pub async fn run_in(&self, conversation: &mut Vec<Message>) -> Result<RunOutput> {
        let mut state = RunState::new(std::mem::take(conversation));
        let span = tracing::info_span!("agent_run", run_id = %state.run_id);

        let result = self.drive(&mut state).instrument(span).await;
        *conversation = std::mem::take(&mut state.conversation);

        if let Err(ref e) = result {
            tracing::warn!(
                run_id = %state.run_id,
                iterations = state.iterations,
                tool_calls = state.tool_call_count,
                error = %e,
                "Run ended without completion"
            );
            self.emit(AuditEvent::runtime_error(state.run_id, e));
        }

        result
    }

    async fn drive(&self, state: &mut RunState) -> Result<RunOutput> {
        let limits = self.policy.limits().clone();
        let definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            if self.is_cancelled() {
                return Err(AgentBoxError::Cancelled);
            }

            state
                .check_budget(&limits)
                .map_err(AgentBoxError::BudgetExceeded)?;

            state.iterations = iteration;
            tracing::debug!(
                iteration = iteration,
                tool_calls = state.tool_call_count,
                "Requesting model turn"
            );

            let request = LLMRequest::new(state.conversation.clone()).with_tools(definitions.clone());
            let response = self.provider.chat(&request).await?;

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                state.conversation.push(Message::assistant(content.clone()));
                tracing::info!(
                    iterations = state.iterations,
                    tool_calls = state.tool_call_count,
                    "Run completed"
                );
                return Ok(RunOutput {
                    run_id: state.run_id,
                    content,
                    conversation: state.conversation.clone(),
                    iterations: state.iterations,
                    tool_calls: state.tool_call_count,
                    elapsed: state.elapsed(),
                });
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                results.push(self.dispatch(state, call).await);
            }

            state.conversation.push(Message::assistant_with_tool_calls(
                response.content.unwrap_or_default(),
                response.tool_calls,
            ));
            state.conversation.extend(results);
        }

        Err(AgentBoxError::MaxIterationsReached {
            max_iterations: self.max_iterations,
        })
    }

    /// Handle one proposed call and return its tool-result message
    async fn dispatch(&self, state: &mut RunState, call: &ToolInvocation) -> Message {
        let Some(tool) = self.tools.get(&call.name) else {
            let error = format!("Tool '{}' not found", call.name);
            tracing::warn!(tool = %call.name, call_id = %call.call_id, "Model requested unknown tool");
            self.emit(AuditEvent::tool_failure(
                state.run_id,
                &call.call_id,
                &call.name,
                &error,
            ));
            return error_result(call, &error);
        };

        let decision = self.policy.validate(&call.name, &call.args);
        self.emit(AuditEvent::tool_validation(
            state.run_id,
            &call.call_id,
            &call.name,
            &call.args,
            &decision,
        ));

        if !decision.allowed {
            tracing::info!(
                tool = %call.name,
                call_id = %call.call_id,
                reason = %decision.reason,
                "Tool call denied by policy"
            );
            return error_result(call, &format!("Policy denied: {}", decision.reason));
        }

        let outcome = match self.tools.validate_args(&call.name, &call.args) {
            Ok(()) => tool.execute(call.args.clone()).await,
            Err(error) => Err(error),
        };
        state.tool_call_count += 1;

        match outcome {
            Ok(value) => {
                let content = render_result(&value);
                tracing::debug!(tool = %call.name, call_id = %call.call_id, "Tool call succeeded");
                self.emit(AuditEvent::tool_success(
                    state.run_id,
                    &call.call_id,
                    &call.name,
                    truncate_preview(&content, self.preview_chars),
                ));
                Message::tool_result(&call.call_id, &call.name, content)
            }
            Err(error) => {
                tracing::info!(
                    tool = %call.name,
                    call_id = %call.call_id,
                    kind = ?error.kind,
                    error = %error.message,
                    "Tool call failed"
                );
                self.emit(AuditEvent::tool_failure(
                    state.run_id,
                    &call.call_id,
                    &call.name,
                    &error.message,
                ));
                error_result(call, &error.message)
            }
        }
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit {
            sink.emit(event);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }
}

/// Strings pass through as-is; everything else is JSON-encoded
fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_result(call: &ToolInvocation, message: &str) -> Message {
    let content = serde_json::json!({ "error": message }).to_string();
    Message::tool_result(&call.call_id, &call.name, content)
}

#[cfg(test)]
mod tests;
