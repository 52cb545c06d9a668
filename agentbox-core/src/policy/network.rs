//! Network-request rule: domain suffix matching plus HTTP method allow-list

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decision::PolicyDecision;
use super::engine::{RuleEvaluator, ToolRule};
use super::parse_rules;
use crate::error::Result;

const DOMAIN_WILDCARD: &str = "*";

/// Rule parameters as written in the policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkRequestRules {
    #[serde(default)]
    pub allow_domains: Vec<String>,

    #[serde(default)]
    pub allow_methods: Vec<String>,
}

/// Evaluator for `web_request`-style tools
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkRequestEvaluator;

impl RuleEvaluator for NetworkRequestEvaluator {
    fn kind(&self) -> &'static str {
        "network_request"
    }

    fn compile(&self, tool_name: &str, rules: &Value) -> Result<Box<dyn ToolRule>> {
        let rules: NetworkRequestRules = parse_rules(tool_name, rules)?;
        Ok(Box::new(NetworkRequestRule::new(rules)))
    }
}

/// Compiled network rule with normalized domains and methods
#[derive(Debug, Clone)]
pub struct NetworkRequestRule {
    allow_domains: Vec<String>,
    allow_methods: Vec<String>,
    any_domain: bool,
}

impl NetworkRequestRule {
    pub fn new(rules: NetworkRequestRules) -> Self {
        let allow_domains: Vec<String> = rules
            .allow_domains
            .iter()
            .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
            .collect();
        let any_domain = allow_domains.iter().any(|d| d == DOMAIN_WILDCARD);
        let allow_methods = rules
            .allow_methods
            .iter()
            .map(|m| m.trim().to_ascii_uppercase())
            .collect();

        Self {
            allow_domains,
            allow_methods,
            any_domain,
        }
    }

    fn domain_allowed(&self, host: &str) -> bool {
        self.any_domain
            || self.allow_domains.iter().any(|allowed| {
                host == allowed
                    || host
                        .strip_suffix(allowed.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
    }
}

impl ToolRule for NetworkRequestRule {
    fn evaluate(&self, args: &Value) -> PolicyDecision {
        let Some(raw_url) = args.get("url").and_then(Value::as_str) else {
            return PolicyDecision::deny("Malformed URL: missing 'url' argument");
        };

        let parsed = match url::Url::parse(raw_url) {
            Ok(parsed) => parsed,
            Err(e) => return PolicyDecision::deny(format!("Malformed URL '{}': {}", raw_url, e)),
        };

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.trim_end_matches('.').to_ascii_lowercase(),
            _ => return PolicyDecision::deny(format!("Malformed URL '{}': no host", raw_url)),
        };

        if !self.domain_allowed(&host) {
            return PolicyDecision::deny(format!(
                "Domain '{}' not in allow_domains: {:?}",
                host, self.allow_domains
            ));
        }

        let method = match args.get("method") {
            None | Some(Value::Null) => "GET".to_string(),
            Some(Value::String(m)) => m.trim().to_ascii_uppercase(),
            Some(other) => {
                return PolicyDecision::deny(format!(
                    "HTTP method '{}' not in allow_methods: {:?}",
                    other, self.allow_methods
                ));
            }
        };

        if !self.allow_methods.iter().any(|m| *m == method) {
            return PolicyDecision::deny(format!(
                "HTTP method '{}' not in allow_methods: {:?}",
                method, self.allow_methods
            ));
        }

        PolicyDecision::allow(format!(
            "Allowed: domain '{}' and method '{}'",
            host, method
        ))
    }
}
