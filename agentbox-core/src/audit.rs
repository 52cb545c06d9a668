//! Append-only audit trail
//!
//! Every policy decision, tool outcome and terminal runtime error becomes one
//! [`AuditEvent`]. The JSONL sink writes one object per line:
//!
//! ```json
//! {"timestamp":"2025-01-01T00:00:00Z","run_id":"...","event_type":"tool_validation","call_id":"call_1","tool_name":"read_file","args":{"path":"/data/a.txt"},"allowed":true,"reason":"..."}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AgentBoxError, Result};
use crate::policy::PolicyDecision;

/// Default number of characters kept in a tool result preview
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    #[serde(flatten)]
    pub kind: AuditEventKind,
}

/// Event payload, tagged by `event_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A policy decision, allowed or denied
    ToolValidation {
        call_id: String,
        tool_name: String,
        args: Value,
        allowed: bool,
        reason: String,
    },

    /// Outcome of a tool call that reached execution (or was not registered)
    ToolResult {
        call_id: String,
        tool_name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A run ended with an error or terminal condition
    RuntimeError { error_kind: String, error: String },
}

impl AuditEventKind {
    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEventKind::ToolValidation { .. } => "tool_validation",
            AuditEventKind::ToolResult { .. } => "tool_result",
            AuditEventKind::RuntimeError { .. } => "runtime_error",
        }
    }
}

impl AuditEvent {
    pub fn new(run_id: Uuid, kind: AuditEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            kind,
        }
    }

    pub fn tool_validation(
        run_id: Uuid,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: &Value,
        decision: &PolicyDecision,
    ) -> Self {
        Self::new(
            run_id,
            AuditEventKind::ToolValidation {
                call_id: call_id.into(),
                tool_name: tool_name.into(),
                args: args.clone(),
                allowed: decision.allowed,
                reason: decision.reason.clone(),
            },
        )
    }

    /// Successful tool call; `preview` should already be truncated
    pub fn tool_success(
        run_id: Uuid,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        preview: impl Into<String>,
    ) -> Self {
        Self::new(
            run_id,
            AuditEventKind::ToolResult {
                call_id: call_id.into(),
                tool_name: tool_name.into(),
                success: true,
                result: Some(preview.into()),
                error: None,
            },
        )
    }

    pub fn tool_failure(
        run_id: Uuid,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(
            run_id,
            AuditEventKind::ToolResult {
                call_id: call_id.into(),
                tool_name: tool_name.into(),
                success: false,
                result: None,
                error: Some(error.into()),
            },
        )
    }

    pub fn runtime_error(run_id: Uuid, error: &AgentBoxError) -> Self {
        Self::new(
            run_id,
            AuditEventKind::RuntimeError {
                error_kind: error.kind_name().to_string(),
                error: error.to_string(),
            },
        )
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// Truncate to at most `max_chars` characters, never splitting a character
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Destination for audit events
///
/// Implementations must write each event atomically with respect to other
/// events. Emission is infallible from the caller's view; sinks report their
/// own I/O failures through `tracing`.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Appends events to a JSON-lines file, flushing after every line
pub struct JsonlAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl std::fmt::Debug for JsonlAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditSink")
            .field("path", &self.path)
            .finish()
    }
}

impl JsonlAuditSink {
    /// Open (or create) `path` in append mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "Opened audit log");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back from a JSONL audit file
    pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    fn write_line(writer: &mut BufWriter<File>, event: &AuditEvent) -> Result<()> {
        writeln!(writer, "{}", serde_json::to_string(event)?)?;
        writer.flush()?;
        Ok(())
    }
}

impl AuditSink for JsonlAuditSink {
    fn emit(&self, event: AuditEvent) {
        let outcome = match self.writer.lock() {
            Ok(mut writer) => Self::write_line(&mut writer, &event),
            Err(poisoned) => Self::write_line(&mut poisoned.into_inner(), &event),
        };

        if let Err(e) = outcome {
            tracing::error!(
                path = %self.path.display(),
                event_type = event.event_type(),
                error = %e,
                "Failed to write audit event"
            );
        }
    }
}

/// Keeps events in memory; useful for tests and embedding
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events whose `event_type` matches
    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
