//! Scripted provider for deterministic, offline runs
//!
//! Returns predetermined turns in order and records every request it saw.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo};
use crate::error::{AgentBoxError, Result};

/// One predetermined model turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Return this response
    Respond(LLMResponse),
    /// Fail with a provider error carrying this message
    Fail(String),
}

impl From<LLMResponse> for ScriptedTurn {
    fn from(response: LLMResponse) -> Self {
        ScriptedTurn::Respond(response)
    }
}

/// Provider that replays a fixed script of turns
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    fallback: Option<ScriptedTurn>,
    delay: Duration,
    call_count: AtomicUsize,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    /// Create a provider that plays `turns` in order
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            fallback: None,
            delay: Duration::ZERO,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor from plain responses
    pub fn from_responses(responses: impl IntoIterator<Item = LLMResponse>) -> Self {
        Self::new(responses.into_iter().map(ScriptedTurn::Respond))
    }

    /// Turn to repeat once the script is exhausted
    pub fn with_fallback(mut self, turn: impl Into<ScriptedTurn>) -> Self {
        self.fallback = Some(turn.into());
        self
    }

    /// Simulated latency per turn
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of times the provider has been called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let turn = self
            .turns
            .lock()
            .await
            .pop_front()
            .or_else(|| self.fallback.clone());

        match turn {
            Some(ScriptedTurn::Respond(response)) => Ok(response),
            Some(ScriptedTurn::Fail(message)) => Err(AgentBoxError::Provider(message)),
            None => Err(AgentBoxError::Provider(
                "Scripted provider has no more turns".to_string(),
            )),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "script".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_turns_in_order_then_fails() {
        let provider = ScriptedProvider::from_responses([
            LLMResponse::text("first"),
            LLMResponse::text("second"),
        ]);
        let request = LLMRequest::from_prompt("hi");

        assert_eq!(
            provider.chat(&request).await.unwrap().content.as_deref(),
            Some("first")
        );
        assert_eq!(
            provider.chat(&request).await.unwrap().content.as_deref(),
            Some("second")
        );
        assert!(matches!(
            provider.chat(&request).await,
            Err(AgentBoxError::Provider(_))
        ));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_fallback_repeats() {
        let provider = ScriptedProvider::new([]).with_fallback(LLMResponse::text("again"));
        let request = LLMRequest::from_prompt("hi");
        for _ in 0..3 {
            assert_eq!(
                provider.chat(&request).await.unwrap().content.as_deref(),
                Some("again")
            );
        }
    }
}
