use thiserror::Error;

/// Unified error type for the whole Aura engine.
#[derive(Error, Debug)]
pub enum AuraError {
    // ── LLM errors ─────────────────────────────────────────────
    #[error("llm request timed out: {0}")]
    LlmTimeout(String),

    #[error("llm connection failed: {0}")]
    LlmConnection(String),

    #[error("llm rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("llm returned status {status}: {body}")]
    LlmStatus { status: u16, body: String },

    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for {tool}: {reason}")]
    ToolArguments { tool: String, reason: String },

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("tool {tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    #[error("memory content must not be empty")]
    EmptyContent,

    #[error("record not found: {0}")]
    NotFound(String),

    // ── Session errors ─────────────────────────────────────────
    #[error("session error: {0}")]
    Session(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// How a failed LLM call should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Timeouts and dropped connections: exponential backoff.
    Transient,
    /// Provider throttling: linear backoff.
    RateLimit,
    /// Everything else fails the turn immediately.
    Fatal,
}

impl AuraError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            AuraError::LlmTimeout(_) | AuraError::LlmConnection(_) => RetryClass::Transient,
            AuraError::RateLimited { .. } => RetryClass::RateLimit,
            _ => RetryClass::Fatal,
        }
    }

    /// True for failures worth retrying at all.
    pub fn is_transient(&self) -> bool {
        self.retry_class() != RetryClass::Fatal
    }
}

pub type Result<T> = std::result::Result<T, AuraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classes() {
        assert_eq!(
            AuraError::LlmTimeout("30s".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            AuraError::LlmConnection("reset".into()).retry_class(),
            RetryClass::Transient
        );
        assert_eq!(
            AuraError::RateLimited { retry_after_secs: 5 }.retry_class(),
            RetryClass::RateLimit
        );
        assert_eq!(
            AuraError::LlmStatus {
                status: 400,
                body: "bad".into()
            }
            .retry_class(),
            RetryClass::Fatal
        );
        assert!(!AuraError::LlmProvider("?".into()).is_transient());
    }
}
