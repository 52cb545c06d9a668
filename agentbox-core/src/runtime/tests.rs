use super::*;
use crate::audit::{AuditEventKind, InMemoryAuditSink};
use crate::llm::{LLMResponse, MessageRole, ScriptedProvider, ScriptedTurn};
use crate::policy::{BudgetLimits, PolicyDocument};
use crate::tools::{Tool, ToolError, ToolMetadata, ToolSchema, ValidationError};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Stand-in tool that records executions and returns a canned result
struct RecordingTool {
    metadata: ToolMetadata,
    executions: Arc<AtomicUsize>,
    result: std::result::Result<Value, ToolError>,
    cancel_on_execute: Option<CancellationToken>,
}

impl RecordingTool {
    fn new(name: &str, result: std::result::Result<Value, ToolError>) -> Self {
        Self {
            metadata: ToolMetadata::new(name, format!("Recording {}", name)),
            executions: Arc::new(AtomicUsize::new(0)),
            result,
            cancel_on_execute: None,
        }
    }

    fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_execute = Some(token);
        self
    }

    fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.executions)
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(json!({
            "type": "object",
            "properties": { "path": { "type": "string" } }
        }))
    }

    fn validate(&self, args: &Value) -> std::result::Result<(), Vec<ValidationError>> {
        if args.get("offset").is_some() {
            return Err(vec![ValidationError::new("offset", "offset is not supported")]);
        }
        Ok(())
    }

    async fn execute(&self, _args: Value) -> std::result::Result<Value, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_execute {
            token.cancel();
        }
        self.result.clone()
    }
}

fn data_policy(limits: BudgetLimits) -> Arc<PolicyEngine> {
    let document = PolicyDocument::new()
        .with_tool("read_file", json!({"allow_paths": ["/data/**"]}))
        .with_limits(limits);
    Arc::new(PolicyEngine::new(document).unwrap())
}

fn registry_with(tool: RecordingTool) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(tool)).unwrap();
    tools
}

fn read_call(call_id: &str, path: &str) -> ToolInvocation {
    ToolInvocation::new(call_id, "read_file", json!({ "path": path }))
}

fn tool_messages(output: &RunOutput) -> Vec<&Message> {
    output
        .conversation
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .collect()
}

#[tokio::test]
async fn test_completes_without_tool_calls() {
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::text(
        "Nothing to do",
    )]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider.clone(),
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_system_prompt("Be brief")
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("hello").await.unwrap();

    assert_eq!(output.content, "Nothing to do");
    // Policy is never consulted when the model proposes no calls
    assert!(sink.events().is_empty());
    assert_eq!(output.iterations, 1);
    assert_eq!(output.tool_calls, 0);
    assert_eq!(output.conversation.len(), 3);
    assert_eq!(output.conversation[0].role, MessageRole::System);
    assert_eq!(output.conversation[2].role, MessageRole::Assistant);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_missing_content_becomes_empty_string() {
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::default()]));
    let runtime = AgentRuntime::new(
        provider,
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    );

    let output = runtime.run_prompt("hello").await.unwrap();
    assert_eq!(output.content, "");
}

#[tokio::test]
async fn test_allowed_call_executes_and_echoes_call_id() {
    let tool = RecordingTool::new("read_file", Ok(json!("file contents")));
    let executions = tool.counter();
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![read_call("call_abc", "/data/notes.txt")]),
        LLMResponse::text("done"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());

    let runtime = AgentRuntime::new(
        provider.clone(),
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("read it").await.unwrap();

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(output.tool_calls, 1);
    assert_eq!(output.iterations, 2);

    let results = tool_messages(&output);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_call_id.as_deref(), Some("call_abc"));
    assert_eq!(results[0].name.as_deref(), Some("read_file"));
    assert_eq!(results[0].content, "file contents");

    // The second model turn sees the assistant call followed by its result
    let requests = provider.requests().await;
    let second = &requests[1].messages;
    assert_eq!(second[second.len() - 2].tool_calls.len(), 1);
    assert_eq!(second[second.len() - 1].role, MessageRole::Tool);
    assert_eq!(requests[0].tools.len(), 1);

    let validations = sink.events_of_type("tool_validation");
    assert_eq!(validations.len(), 1);
    match &validations[0].kind {
        AuditEventKind::ToolValidation {
            call_id, allowed, ..
        } => {
            assert_eq!(call_id, "call_abc");
            assert!(*allowed);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(validations[0].run_id, output.run_id);
    assert_eq!(sink.events_of_type("tool_result").len(), 1);
}

#[tokio::test]
async fn test_structured_result_is_json_encoded() {
    let tool = RecordingTool::new("read_file", Ok(json!({"lines": 3})));
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![read_call("c1", "/data/a.txt")]),
        LLMResponse::text("done"),
    ]));
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    );

    let output = runtime.run_prompt("go").await.unwrap();
    assert_eq!(tool_messages(&output)[0].content, r#"{"lines":3}"#);
}

#[tokio::test]
async fn test_denied_call_never_executes() {
    let tool = RecordingTool::new("read_file", Ok(json!("secret")));
    let executions = tool.counter();
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![read_call("c1", "/etc/passwd")]),
        LLMResponse::text("I was not allowed"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());

    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("read passwd").await.unwrap();

    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(output.tool_calls, 0);

    let content: Value = serde_json::from_str(&tool_messages(&output)[0].content).unwrap();
    let error = content["error"].as_str().unwrap();
    assert!(error.starts_with("Policy denied: Path '/etc/passwd' not in allow_paths"));

    let validations = sink.events_of_type("tool_validation");
    assert_eq!(validations.len(), 1);
    assert!(matches!(
        validations[0].kind,
        AuditEventKind::ToolValidation { allowed: false, .. }
    ));
    assert!(sink.events_of_type("tool_result").is_empty());
}

#[tokio::test]
async fn test_unregistered_tool_reports_not_found() {
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![ToolInvocation::new(
            "c1",
            "launch_missiles",
            json!({}),
        )]),
        LLMResponse::text("ok"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("go").await.unwrap();

    let content: Value = serde_json::from_str(&tool_messages(&output)[0].content).unwrap();
    assert_eq!(content, json!({"error": "Tool 'launch_missiles' not found"}));
    assert!(sink.events_of_type("tool_validation").is_empty());
    assert_eq!(sink.events_of_type("tool_result").len(), 1);
}

#[tokio::test]
async fn test_zero_call_budget_fails_before_first_turn() {
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::text(
        "unreachable",
    )]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider.clone(),
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded().with_max_tool_calls(0)),
    )
    .with_audit_sink(sink.clone());

    let err = runtime.run_prompt("go").await.unwrap_err();

    assert!(matches!(
        err,
        AgentBoxError::BudgetExceeded(BudgetViolation::ToolCalls { count: 0, limit: 0 })
    ));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(sink.events_of_type("runtime_error").len(), 1);
}

#[tokio::test]
async fn test_call_budget_counts_executed_calls_only() {
    let tool = RecordingTool::new("read_file", Ok(json!("ok")));
    let executions = tool.counter();
    let provider = Arc::new(
        ScriptedProvider::from_responses([
            // Denied: does not consume budget
            LLMResponse::tool_calls(vec![read_call("d1", "/etc/shadow")]),
            // Fails argument validation but was allowed: consumes budget
            LLMResponse::tool_calls(vec![ToolInvocation::new(
                "v1",
                "read_file",
                json!({"path": "/data/x.txt", "offset": 10}),
            )]),
            LLMResponse::tool_calls(vec![read_call("a1", "/data/a.txt")]),
        ])
        .with_fallback(LLMResponse::text("unreachable")),
    );

    let runtime = AgentRuntime::new(
        provider.clone(),
        registry_with(tool),
        data_policy(BudgetLimits::unbounded().with_max_tool_calls(2)),
    );

    let err = runtime.run_prompt("go").await.unwrap_err();

    assert!(matches!(
        err,
        AgentBoxError::BudgetExceeded(BudgetViolation::ToolCalls { count: 2, limit: 2 })
    ));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_failed_validation_counts_toward_budget() {
    let tool = RecordingTool::new("read_file", Ok(json!("ok")));
    let executions = tool.counter();
    let provider = Arc::new(
        ScriptedProvider::from_responses([LLMResponse::tool_calls(vec![ToolInvocation::new(
            "v1",
            "read_file",
            json!({"path": "/data/x.txt", "offset": 10}),
        )])])
        .with_fallback(LLMResponse::text("unreachable")),
    );

    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded().with_max_tool_calls(1)),
    );

    let err = runtime.run_prompt("go").await.unwrap_err();
    assert_eq!(RunOutcome::from_error(&err), RunOutcome::BudgetExceeded);
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tool_failure_is_folded_into_conversation() {
    let tool = RecordingTool::new(
        "read_file",
        Err(ToolError::not_found("File not found: /data/gone.txt")),
    );
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![read_call("c1", "/data/gone.txt")]),
        LLMResponse::text("It is gone"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("go").await.unwrap();

    assert_eq!(output.content, "It is gone");
    assert_eq!(output.tool_calls, 1);
    let content: Value = serde_json::from_str(&tool_messages(&output)[0].content).unwrap();
    assert_eq!(content, json!({"error": "File not found: /data/gone.txt"}));

    let results = sink.events_of_type("tool_result");
    assert!(matches!(
        results[0].kind,
        AuditEventKind::ToolResult { success: false, .. }
    ));
}

#[tokio::test]
async fn test_max_iterations_reached() {
    let tool = RecordingTool::new("read_file", Ok(json!("again")));
    let provider = Arc::new(
        ScriptedProvider::new([])
            .with_fallback(LLMResponse::tool_calls(vec![read_call("loop", "/data/a.txt")])),
    );
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider.clone(),
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_max_iterations(3)
    .with_audit_sink(sink.clone());

    let err = runtime.run_prompt("go").await.unwrap_err();

    assert!(matches!(
        err,
        AgentBoxError::MaxIterationsReached { max_iterations: 3 }
    ));
    assert_eq!(provider.call_count(), 3);

    let errors = sink.events_of_type("runtime_error");
    assert_eq!(errors.len(), 1);
    match &errors[0].kind {
        AuditEventKind::RuntimeError { error_kind, .. } => {
            assert_eq!(error_kind, "max_iterations_reached")
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_runtime_budget_checked_between_turns() {
    let tool = RecordingTool::new("read_file", Ok(json!("slow")));
    let provider = Arc::new(
        ScriptedProvider::new([])
            .with_fallback(LLMResponse::tool_calls(vec![read_call("c", "/data/a.txt")]))
            .with_delay(Duration::from_millis(60)),
    );
    let runtime = AgentRuntime::new(
        provider.clone(),
        registry_with(tool),
        data_policy(BudgetLimits::unbounded().with_max_runtime_seconds(0.05)),
    );

    let err = runtime.run_prompt("go").await.unwrap_err();

    assert!(matches!(
        err,
        AgentBoxError::BudgetExceeded(BudgetViolation::Runtime { .. })
    ));
    // The in-flight turn finishes; the next iteration boundary stops the run
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::text("x")]));
    let runtime = AgentRuntime::new(
        provider.clone(),
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_cancellation(token);

    let err = runtime.run_prompt("go").await.unwrap_err();
    assert!(matches!(err, AgentBoxError::Cancelled));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_cancelled_mid_run() {
    let token = CancellationToken::new();
    let tool =
        RecordingTool::new("read_file", Ok(json!("ok"))).cancelling(token.clone());
    let provider = Arc::new(
        ScriptedProvider::new([])
            .with_fallback(LLMResponse::tool_calls(vec![read_call("c", "/data/a.txt")])),
    );
    let runtime = AgentRuntime::new(
        provider.clone(),
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_cancellation(token);

    let result = runtime.run_prompt("go").await;

    assert_eq!(RunOutcome::from_result(&result), RunOutcome::Cancelled);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_provider_failure_is_audited() {
    let provider = Arc::new(ScriptedProvider::new([ScriptedTurn::Fail(
        "connection reset".to_string(),
    )]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let err = runtime.run_prompt("go").await.unwrap_err();

    assert!(matches!(err, AgentBoxError::Provider(_)));
    assert_eq!(RunOutcome::from_error(&err), RunOutcome::Failed);
    match &sink.events_of_type("runtime_error")[0].kind {
        AuditEventKind::RuntimeError { error_kind, error } => {
            assert_eq!(error_kind, "provider");
            assert!(error.contains("connection reset"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_multiple_calls_keep_model_order() {
    let tool = RecordingTool::new("read_file", Ok(json!("ok")));
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![
            read_call("first", "/data/a.txt"),
            read_call("second", "/etc/hosts"),
            read_call("third", "/data/b.txt"),
        ]),
        LLMResponse::text("done"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("go").await.unwrap();

    let ids: Vec<_> = tool_messages(&output)
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
    assert_eq!(output.tool_calls, 2);

    let audited: Vec<_> = sink
        .events_of_type("tool_validation")
        .into_iter()
        .map(|e| match e.kind {
            AuditEventKind::ToolValidation { call_id, .. } => call_id,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(audited, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_result_preview_is_truncated() {
    let long = "x".repeat(500);
    let tool = RecordingTool::new("read_file", Ok(Value::String(long.clone())));
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![read_call("c1", "/data/big.txt")]),
        LLMResponse::text("done"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_preview_chars(16)
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("go").await.unwrap();

    // The model still sees everything
    assert_eq!(tool_messages(&output)[0].content, long);
    match &sink.events_of_type("tool_result")[0].kind {
        AuditEventKind::ToolResult { result, .. } => {
            assert_eq!(result.as_deref(), Some("x".repeat(16).as_str()))
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_settings_apply() {
    let settings = RuntimeSettings {
        max_iterations: 2,
        result_preview_chars: 50,
        system_prompt: Some("sys".to_string()),
    };
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::text("hi")]));
    let runtime = AgentRuntime::new(
        provider.clone(),
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_settings(&settings);

    assert_eq!(runtime.max_iterations(), 2);
    runtime.run_prompt("go").await.unwrap();
    let requests = provider.requests().await;
    assert_eq!(requests[0].messages[0], Message::system("sys"));
}

#[tokio::test]
async fn test_validation_failure_reported_to_model() {
    let tool = RecordingTool::new("read_file", Ok(json!("ok")));
    let executions = tool.counter();
    let provider = Arc::new(ScriptedProvider::from_responses([
        LLMResponse::tool_calls(vec![ToolInvocation::new(
            "v1",
            "read_file",
            json!({"path": "/data/x.txt", "offset": 10}),
        )]),
        LLMResponse::text("done"),
    ]));
    let sink = Arc::new(InMemoryAuditSink::new());
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_audit_sink(sink.clone());

    let output = runtime.run_prompt("go").await.unwrap();

    assert_eq!(executions.load(Ordering::SeqCst), 0);
    assert_eq!(output.tool_calls, 1);
    let content: Value = serde_json::from_str(&tool_messages(&output)[0].content).unwrap();
    assert_eq!(content, json!({"error": "offset is not supported"}));
    assert!(matches!(
        sink.events_of_type("tool_result")[0].kind,
        AuditEventKind::ToolResult { success: false, .. }
    ));
}

#[tokio::test]
async fn test_transcript_survives_terminal_error() {
    let tool = RecordingTool::new("read_file", Ok(json!("page")));
    let provider = Arc::new(
        ScriptedProvider::new([])
            .with_fallback(LLMResponse::tool_calls(vec![read_call("loop", "/data/a.txt")])),
    );
    let runtime = AgentRuntime::new(
        provider,
        registry_with(tool),
        data_policy(BudgetLimits::unbounded()),
    )
    .with_max_iterations(2);

    let mut conversation = vec![Message::user("keep going")];
    let err = runtime.run_in(&mut conversation).await.unwrap_err();

    assert!(matches!(
        err,
        AgentBoxError::MaxIterationsReached { max_iterations: 2 }
    ));
    // user + (assistant call + tool result) per iteration
    assert_eq!(conversation.len(), 5);
    assert_eq!(conversation[0], Message::user("keep going"));
    assert_eq!(conversation[4].role, MessageRole::Tool);
    assert_eq!(conversation[4].content, "page");
}

#[tokio::test]
async fn test_run_in_appends_on_success() {
    let provider = Arc::new(ScriptedProvider::from_responses([LLMResponse::text("hi")]));
    let runtime = AgentRuntime::new(
        provider,
        ToolRegistry::new(),
        data_policy(BudgetLimits::unbounded()),
    );

    let mut conversation = vec![Message::user("hello")];
    let output = runtime.run_in(&mut conversation).await.unwrap();

    assert_eq!(conversation, output.conversation);
    assert_eq!(conversation[1], Message::assistant("hi"));
}
