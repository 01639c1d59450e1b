//! Mock providers for deterministic testing.
//!
//! Return pre-configured completions and errors without making any HTTP calls.

use async_trait::async_trait;
use aura_core::{AuraError, Result, ToolCall};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::embedding::{EmbeddingProvider, HashEmbedding};
use crate::provider::*;

/// A mock LLM provider that replays a queue of scripted outcomes.
///
/// # Example
/// ```
/// use aura_llm::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_tool_call("search", r#"{"q": "x"}"#)
///     .with_response("Done.");
/// ```
pub struct MockProvider {
    queue: Mutex<VecDeque<Result<Completion>>>,
    /// Returned once the queue is empty.
    fallback: Mutex<Completion>,
    /// Every request received, for assertions in tests.
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    latency: Duration,
    name: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Completion::Text("(mock: no more queued responses)".into())),
            requests: Arc::new(Mutex::new(vec![])),
            latency: Duration::ZERO,
            name: name.into(),
        }
    }

    /// Queue a final text response.
    pub fn with_response(self, text: &str) -> Self {
        self.queue.lock().push_back(Ok(Completion::Text(text.into())));
        self
    }

    /// Queue a response with a single tool call; `args` is the raw JSON text.
    pub fn with_tool_call(self, name: &str, args: &str) -> Self {
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        self.with_tool_calls(vec![ToolCall::new(id, name, args)])
    }

    /// Queue a response requesting several tools at once.
    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.queue
            .lock()
            .push_back(Ok(Completion::ToolCalls { text: None, calls }));
        self
    }

    /// Queue an error.
    pub fn with_err(self, error: AuraError) -> Self {
        self.queue.lock().push_back(Err(error));
        self
    }

    /// Queue a provider error carrying `msg`.
    pub fn with_error(self, msg: &str) -> Self {
        self.with_err(AuraError::LlmProvider(msg.into()))
    }

    /// Replace the completion returned after the queue runs dry.
    /// A tool-call fallback makes the model never converge.
    pub fn with_fallback(self, completion: Completion) -> Self {
        *self.fallback.lock() = completion;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().last().cloned()
    }

    fn next_outcome(&self) -> Result<Completion> {
        match self.queue.lock().pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.fallback.lock().clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let completion = self.next_outcome()?;
        Ok(LlmResponse {
            completion,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
            finish_reason: None,
        })
    }
}

/// Embedder with fixed vectors for chosen texts. Unknown texts fall back to
/// the local hashing embedder.
pub struct MockEmbedding {
    fixed: HashMap<String, Vec<f32>>,
    fallback: HashEmbedding,
}

impl MockEmbedding {
    pub fn new(dims: usize) -> Self {
        Self {
            fixed: HashMap::new(),
            fallback: HashEmbedding::new(dims),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            match self.fixed.get(*text) {
                Some(v) => out.push(v.clone()),
                None => out.extend(self.fallback.embed(&[*text]).await?),
            }
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.fallback.dimensions()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
