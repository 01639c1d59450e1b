use async_trait::async_trait;
use aura_core::{Message, Result, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    /// Full message list, system prompt first.
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    /// A tool-free request, as used for reflection and keyword extraction.
    pub fn plain(model: impl Into<String>, messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: vec![],
            tool_choice: ToolChoice::None,
            temperature,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    Auto,
    /// Tools are never called.
    None,
}

/// What the model decided to do, decoded once at the provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Final answer for this turn.
    Text(String),
    /// The model wants tools run before it answers. `text` is any content
    /// that came along with the calls.
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl Completion {
    /// The assistant message to append to the conversation for this completion.
    pub fn to_message(&self) -> Message {
        match self {
            Completion::Text(text) => Message::assistant(text.clone()),
            Completion::ToolCalls { text, calls } => {
                Message::assistant_tool_calls(text.clone(), calls.clone())
            }
        }
    }

    /// Text content, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Completion::Text(t) => Some(t),
            Completion::ToolCalls { text, .. } => text.as_deref(),
        }
    }
}

/// A complete (non-streaming) response from an LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub completion: Completion,
    pub usage: Usage,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Trait implemented by each chat backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable name, e.g. "deepseek".
    fn name(&self) -> &str;

    /// Send a non-streaming request.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}
