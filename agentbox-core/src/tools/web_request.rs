//! `web_request`: HTTP GET/POST with a local timeout

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::time::Duration;

use super::error::{ToolError, ToolErrorKind, ValidationError};
use super::tool::{Tool, ToolMetadata, ToolSchema};

pub const WEB_REQUEST_TOOL: &str = "web_request";

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const SUPPORTED_METHODS: [&str; 2] = ["GET", "POST"];

/// Makes HTTP requests and returns status, headers and body
pub struct WebRequestTool {
    metadata: ToolMetadata,
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for WebRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

impl WebRequestTool {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            metadata: ToolMetadata::new(
                WEB_REQUEST_TOOL,
                "Make HTTP requests to web URLs. Supports GET and POST methods. \
                 Returns the response status code, headers, and body content.",
            ),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn method_arg(args: &Value) -> Option<String> {
    match args.get("method") {
        None | Some(Value::Null) => Some("GET".to_string()),
        Some(Value::String(m)) => Some(m.trim().to_ascii_uppercase()),
        Some(_) => None,
    }
}

fn url_arg(args: &Value) -> Option<&str> {
    args.get("url").and_then(Value::as_str).filter(|u| !u.is_empty())
}

#[async_trait]
impl Tool for WebRequestTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The full URL to make the request to (including http:// or https://)"
                },
                "method": {
                    "type": "string",
                    "enum": SUPPORTED_METHODS,
                    "description": "HTTP method to use (GET or POST)"
                },
                "headers": {
                    "type": "object",
                    "description": "Optional HTTP headers to include in the request",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "object",
                    "description": "Optional JSON body for POST requests"
                }
            },
            "required": ["url", "method"]
        }))
    }

    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match method_arg(args) {
            Some(m) if SUPPORTED_METHODS.contains(&m.as_str()) => {}
            Some(m) => errors.push(ValidationError::new(
                "method",
                format!("Invalid HTTP method: {}. Must be GET or POST.", m),
            )),
            None => errors.push(ValidationError::new("method", "Method must be a string")),
        }

        match url_arg(args) {
            None => errors.push(ValidationError::new("url", "URL must be a non-empty string")),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(ValidationError::new(
                    "url",
                    "URL must start with http:// or https://",
                ))
            }
            Some(_) => {}
        }

        match args.get("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(headers)) if headers.values().all(Value::is_string) => {}
            Some(_) => errors.push(ValidationError::new(
                "headers",
                "Headers must be an object of string values",
            )),
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        self.validate(&args).map_err(ToolError::validation)?;

        let url = url_arg(&args).unwrap_or_default();
        let method = method_arg(&args).unwrap_or_else(|| "GET".to_string());

        let mut request = if method == "POST" {
            let builder = self.client.post(url);
            match args.get("body") {
                Some(body) if !body.is_null() => builder.json(body),
                _ => builder,
            }
        } else {
            self.client.get(url)
        };

        if let Some(headers) = args.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        tracing::debug!(url = %url, method = %method, "Sending web request");

        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::new(
                    ToolErrorKind::Timeout,
                    format!(
                        "Request to {} timed out after {} seconds",
                        url,
                        self.timeout.as_secs_f64()
                    ),
                )
            } else if e.is_connect() {
                ToolError::transient(format!("Failed to connect to {}", url))
            } else if e.is_builder() {
                ToolError::new(ToolErrorKind::Validation, format!("Invalid request: {}", e))
            } else {
                ToolError::transient(format!("Request failed: {}", e))
            }
        })?;

        let status_code = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
            })
            .collect();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::timeout(self.timeout)
            } else {
                ToolError::new(
                    ToolErrorKind::InvalidResponse,
                    format!("Failed to read response body from {}: {}", url, e),
                )
            }
        })?;

        Ok(json!({
            "status_code": status_code,
            "headers": headers,
            "body": body,
        }))
    }
}
