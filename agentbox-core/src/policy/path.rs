//! File-path rule: lexical normalization plus shell-style glob matching

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision::PolicyDecision;
use super::engine::{RuleEvaluator, ToolRule};
use super::parse_rules;
use crate::error::{AgentBoxError, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Rule parameters as written in the policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilePathRules {
    #[serde(default)]
    pub allow_paths: Vec<String>,
}

/// Evaluator for `read_file`-style tools
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePathEvaluator;

impl RuleEvaluator for FilePathEvaluator {
    fn kind(&self) -> &'static str {
        "file_path"
    }

    fn compile(&self, tool_name: &str, rules: &Value) -> Result<Box<dyn ToolRule>> {
        let rules: FilePathRules = parse_rules(tool_name, rules)?;
        Ok(Box::new(FilePathRule::new(tool_name, rules)?))
    }
}

#[derive(Debug, Clone)]
enum PathMatcher {
    Everything,
    Glob(Pattern),
}

impl PathMatcher {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            PathMatcher::Everything => true,
            PathMatcher::Glob(pattern) => pattern.matches_with(normalized, MATCH_OPTIONS),
        }
    }
}

/// Compiled path rule; first matching pattern wins
#[derive(Debug, Clone)]
pub struct FilePathRule {
    allow_paths: Vec<String>,
    matchers: Vec<PathMatcher>,
}

impl FilePathRule {
    pub fn new(tool_name: &str, rules: FilePathRules) -> Result<Self> {
        let matchers = rules
            .allow_paths
            .iter()
            .map(|raw| {
                let normalized = normalize_path(raw);
                if normalized == "**" {
                    return Ok(PathMatcher::Everything);
                }
                Pattern::new(&normalized).map(PathMatcher::Glob).map_err(|e| {
                    AgentBoxError::InvalidPolicy(format!(
                        "tools.{}: invalid glob pattern '{}': {}",
                        tool_name, raw, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            allow_paths: rules.allow_paths,
            matchers,
        })
    }
}

impl ToolRule for FilePathRule {
    fn evaluate(&self, args: &Value) -> PolicyDecision {
        let path = match args.get("path").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => path,
            _ => return PolicyDecision::deny("No path provided"),
        };

        let normalized = normalize_path(path);
        let hit = self
            .matchers
            .iter()
            .zip(&self.allow_paths)
            .find(|(matcher, _)| matcher.matches(&normalized));

        match hit {
            Some((_, pattern)) => {
                PolicyDecision::allow(format!("Allowed: path '{}' matches '{}'", path, pattern))
            }
            None => PolicyDecision::deny(format!(
                "Path '{}' not in allow_paths: {:?}",
                path, self.allow_paths
            )),
        }
    }
}

/// Lexically normalize a slash-separated path.
///
/// Collapses repeated separators and `.` segments and resolves `..` against
/// the preceding segment. `..` at the root of an absolute path is dropped;
/// leading `..` in a relative path is kept. The filesystem is never touched.
pub fn normalize_path(raw: &str) -> String {
    let absolute = raw.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
