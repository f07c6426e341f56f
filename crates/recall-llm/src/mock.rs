use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use recall_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, TokenUsage,
};

/// Mock LLM provider for testing
///
/// Clones share state, so a test can hand one clone to the engine and keep
/// another to script responses and inspect calls.
#[derive(Clone)]
pub struct MockLLMProvider {
    inner: Arc<RwLock<MockLLMProviderInner>>,
}

struct MockLLMProviderInner {
    name: String,
    responses: Vec<String>,
    response_index: usize,
    cycle_responses: bool,
    call_history: Vec<MockCall>,
    should_error: bool,
    failures_remaining: usize,
    error_message: String,
    latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<ChatMessage>,
    pub config: Option<LLMConfig>,
    pub timestamp: std::time::Instant,
}

impl MockLLMProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockLLMProviderInner {
                name: name.into(),
                responses: Vec::new(),
                response_index: 0,
                cycle_responses: false,
                call_history: Vec::new(),
                should_error: false,
                failures_remaining: 0,
                error_message: "Mock error".to_string(),
                latency_ms: 0,
            })),
        }
    }

    /// A provider whose every call fails, as when the model API is down.
    pub fn failing(error_message: impl Into<String>) -> Self {
        let mut mock = Self::new("failing");
        mock.set_error(error_message);
        mock
    }

    pub fn set_response(&mut self, response: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.responses = vec![response.into()];
        inner.response_index = 0;
    }

    pub fn set_responses(&mut self, responses: Vec<String>, cycle: bool) {
        let mut inner = self.inner.write();
        inner.responses = responses;
        inner.response_index = 0;
        inner.cycle_responses = cycle;
    }

    pub fn set_error(&mut self, error_message: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.should_error = true;
        inner.error_message = error_message.into();
    }

    /// Fail only the next `count` calls, then answer normally.
    pub fn fail_next(&mut self, count: usize) {
        let mut inner = self.inner.write();
        inner.failures_remaining = count;
    }

    pub fn clear_error(&mut self) {
        let mut inner = self.inner.write();
        inner.should_error = false;
        inner.failures_remaining = 0;
    }

    pub fn set_latency(&mut self, latency_ms: u64) {
        let mut inner = self.inner.write();
        inner.latency_ms = latency_ms;
    }

    pub fn call_count(&self) -> usize {
        self.inner.read().call_history.len()
    }

    pub fn call_history(&self) -> Vec<MockCall> {
        self.inner.read().call_history.clone()
    }

    pub fn last_call(&self) -> Option<MockCall> {
        self.inner.read().call_history.last().cloned()
    }

    pub fn clear_history(&mut self) {
        let mut inner = self.inner.write();
        inner.call_history.clear();
    }

    pub fn reset(&mut self) {
        let mut inner = self.inner.write();
        inner.responses.clear();
        inner.response_index = 0;
        inner.cycle_responses = false;
        inner.call_history.clear();
        inner.should_error = false;
        inner.failures_remaining = 0;
        inner.error_message = "Mock error".to_string();
        inner.latency_ms = 0;
    }

    fn get_next_response(&self) -> String {
        let mut inner = self.inner.write();

        if inner.responses.is_empty() {
            return "Mock response".to_string();
        }

        let content = inner.responses[inner.response_index].clone();
        if inner.cycle_responses {
            inner.response_index = (inner.response_index + 1) % inner.responses.len();
        } else if inner.response_index < inner.responses.len() - 1 {
            inner.response_index += 1;
        }
        content
    }

    /// Returns the error to raise for this call, if any.
    fn take_failure(&self) -> Option<String> {
        let mut inner = self.inner.write();
        if inner.should_error {
            return Some(inner.error_message.clone());
        }
        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            return Some(inner.error_message.clone());
        }
        None
    }

    fn record_call(&self, messages: &[ChatMessage], config: Option<&LLMConfig>) {
        let mut inner = self.inner.write();
        inner.call_history.push(MockCall {
            messages: messages.to_vec(),
            config: config.cloned(),
            timestamp: std::time::Instant::now(),
        });
    }

    /// Simulate latency if configured
    async fn simulate_latency(&self) {
        let latency_ms = self.inner.read().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
        }
    }

    fn estimate_tokens(messages: &[ChatMessage]) -> u32 {
        let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        (total_chars / 4) as u32
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError> {
        self.record_call(messages, config);
        self.simulate_latency().await;

        if let Some(error_message) = self.take_failure() {
            return Err(LLMError::Network(error_message));
        }

        let content = self.get_next_response();
        let prompt_tokens = Self::estimate_tokens(messages);
        let completion_tokens = (content.len() / 4) as u32;

        Ok(LLMResponse::new(content, FinishReason::Stop)
            .with_usage(TokenUsage::new(prompt_tokens, completion_tokens))
            .with_model("mock-model"))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

impl std::fmt::Debug for MockLLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MockLLMProvider")
            .field("name", &inner.name)
            .field("calls", &inner.call_history.len())
            .finish()
    }
}
