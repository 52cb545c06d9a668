//! `read_file`: read a UTF-8 text file

use async_trait::async_trait;
use serde_json::{Value, json};
use std::io::ErrorKind;

use super::error::{ToolError, ToolErrorKind, ValidationError};
use super::tool::{Tool, ToolMetadata, ToolSchema};

pub const READ_FILE_TOOL: &str = "read_file";

/// Reads a text file and returns its contents as a string
///
/// Path authorization is the policy engine's job; this tool only reports
/// what the filesystem says.
pub struct ReadFileTool {
    metadata: ToolMetadata,
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadFileTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new(
                READ_FILE_TOOL,
                "Read the contents of a text file from the file system. \
                 Returns the file contents as a string.",
            ),
        }
    }
}

fn path_arg(args: &Value) -> Option<&str> {
    args.get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
}

#[async_trait]
impl Tool for ReadFileTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the file to read (absolute or relative)"
                }
            },
            "required": ["path"]
        }))
    }

    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        match path_arg(args) {
            Some(_) => Ok(()),
            None => Err(vec![ValidationError::new(
                "path",
                "Path must be a non-empty string",
            )]),
        }
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let path = path_arg(&args).ok_or_else(|| {
            ToolError::new(ToolErrorKind::Validation, "Path must be a non-empty string")
        })?;

        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::not_found(format!("File not found: {}", path)),
            ErrorKind::PermissionDenied => {
                ToolError::permission_denied(format!("Permission denied reading file: {}", path))
            }
            _ => ToolError::internal(format!("Failed to read file {}: {}", path, e)),
        })?;

        if !metadata.is_file() {
            return Err(ToolError::new(
                ToolErrorKind::Validation,
                format!("Path is not a file: {}", path),
            ));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => {
                ToolError::permission_denied(format!("Permission denied reading file: {}", path))
            }
            _ => ToolError::internal(format!("Failed to read file {}: {}", path, e)),
        })?;

        let content = String::from_utf8(bytes).map_err(|_| {
            ToolError::new(
                ToolErrorKind::InvalidResponse,
                format!(
                    "Failed to decode file {} as UTF-8. \
                     The file may be binary or use a different encoding.",
                    path
                ),
            )
        })?;

        tracing::debug!(path = %path, bytes = content.len(), "Read file");
        Ok(Value::String(content))
    }
}
