//! # aura-llm
//!
//! Provider layer over OpenAI-compatible chat APIs (DeepSeek, OpenAI, local
//! gateways) and embedding backends. Responses are decoded once into a
//! [`Completion`]; failures surface as distinguishable [`aura_core::AuraError`]
//! variants so [`RetryPolicy`] can pick a backoff.

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;

pub use embedding::{EmbeddingProvider, HashEmbedding, OpenAiEmbedding};
pub use mock::{MockEmbedding, MockProvider};
pub use openai::OpenAiProvider;
pub use provider::{Completion, LlmProvider, LlmRequest, LlmResponse, ToolChoice, Usage};
pub use retry::RetryPolicy;
