use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, maps to `aura.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    pub agent: AgentConfig,
    pub memory: MemoryConfig,
    pub learning: LearningConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat model identifier, e.g. "deepseek-chat".
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    /// System prompt injected at the start of every turn.
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Tool-calling rounds per turn before giving up.
    pub max_iterations: u32,
    /// Exchanges (user + assistant pairs) kept in conversation history.
    pub max_history: usize,
    /// Per-tool execution timeout. 0 disables it.
    pub tool_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".into(),
            base_url: "https://api.deepseek.com".into(),
            system_prompt: "You are Aura, a warm and capable desktop companion. \
                Answer briefly, use tools when they help, and speak naturally."
                .into(),
            temperature: 0.8,
            max_tokens: 4096,
            max_iterations: 15,
            max_history: 20,
            tool_timeout_secs: 120,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

/// Which embedder backs the memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local feature-hashing embedder. Works offline.
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    pub embedding: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_base_url: String,
    /// Embedding dimensions (384 for the local embedder).
    pub embedding_dims: usize,
    /// Cosine distance below which a new memory is a duplicate.
    pub dedup_threshold: f32,
    /// Cosine distance below which a new recipe solution is a duplicate.
    pub recipe_dedup_threshold: f32,
    /// Cosine distance cutoff for memory search.
    pub search_threshold: f32,
    /// Cosine distance cutoff for recipe recall.
    pub recipe_threshold: f32,
    /// Score multiplier per importance step above 1.
    pub importance_boost: f32,
    /// Weighted score below which a memory is left out of context.
    pub min_relevance: f32,
    /// Memories injected into the system prompt per turn.
    pub context_results: usize,
    /// Install the built-in recipes at startup.
    pub seed_recipes: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("memory.db"),
            embedding: EmbeddingBackend::Hash,
            embedding_model: "text-embedding-3-small".into(),
            embedding_base_url: "https://api.openai.com/v1".into(),
            embedding_dims: 384,
            dedup_threshold: 0.15,
            recipe_dedup_threshold: 0.15,
            search_threshold: 0.8,
            recipe_threshold: 0.6,
            importance_boost: 0.1,
            min_relevance: 0.5,
            context_results: 3,
            seed_recipes: true,
        }
    }
}

// ── Learning ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// A turn slower than this is a candidate for a lesson.
    pub slow_threshold_secs: f64,
    /// ...and it must also have used more tools than this.
    pub tool_count_threshold: usize,
    /// Performance samples retained.
    pub sample_capacity: usize,
    /// Model used for reflection. Falls back to `agent.model`.
    pub reflection_model: Option<String>,
    pub reflection_temperature: f32,
    pub max_concurrent_reflections: usize,
    pub memory_reflection: bool,
    pub lesson_reflection: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            slow_threshold_secs: 30.0,
            tool_count_threshold: 3,
            sample_capacity: 100,
            reflection_model: None,
            reflection_temperature: 0.1,
            max_concurrent_reflections: 2,
            memory_reflection: true,
            lesson_reflection: true,
        }
    }
}

// ── Retry ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// First backoff for timeouts and connection errors; doubles per attempt.
    pub base_delay_ms: u64,
    /// Backoff step for rate limits; grows linearly per attempt.
    pub rate_limit_step_ms: u64,
    /// HTTP request timeout for LLM calls.
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            rate_limit_step_ms: 5_000,
            request_timeout_secs: 60,
        }
    }
}

// ── Session ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file holding the user profile and last-interaction time.
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("session.json"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "json", or "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// API credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Key for the chat API.
    /// Falls back to AURA_API_KEY, then DEEPSEEK_API_KEY.
    pub api_key: Option<String>,
    /// Key for the embeddings API. Falls back to OPENAI_API_KEY.
    pub embedding_api_key: Option<String>,
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>, severity: WarningSeverity) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity,
            hint: None,
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl AuraConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Agent ───
        if self.agent.model.is_empty() {
            warnings.push(
                ConfigWarning::new("agent.model", "model is empty", WarningSeverity::Error)
                    .hint("Set to e.g. 'deepseek-chat'"),
            );
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            warnings.push(
                ConfigWarning::new(
                    "agent.temperature",
                    format!("temperature {} is out of range", self.agent.temperature),
                    WarningSeverity::Error,
                )
                .hint("Temperature must be between 0.0 and 2.0"),
            );
        }
        if self.agent.max_iterations == 0 {
            warnings.push(ConfigWarning::new(
                "agent.max_iterations",
                "max_iterations is 0, no turn can ever produce a reply",
                WarningSeverity::Error,
            ));
        }
        if self.agent.max_history == 0 {
            warnings.push(
                ConfigWarning::new(
                    "agent.max_history",
                    "history disabled, every turn starts from scratch",
                    WarningSeverity::Info,
                )
                .hint("The default keeps the last 20 exchanges"),
            );
        }
        if self.agent.tool_timeout_secs == 0 {
            warnings.push(ConfigWarning::new(
                "agent.tool_timeout_secs",
                "tool timeout disabled, a hung tool blocks the turn",
                WarningSeverity::Warning,
            ));
        }

        // ── Memory thresholds ───
        for (field, value) in [
            ("memory.dedup_threshold", self.memory.dedup_threshold),
            ("memory.recipe_dedup_threshold", self.memory.recipe_dedup_threshold),
            ("memory.search_threshold", self.memory.search_threshold),
            ("memory.recipe_threshold", self.memory.recipe_threshold),
        ] {
            if !(0.0..=2.0).contains(&value) {
                warnings.push(
                    ConfigWarning::new(
                        field,
                        format!("{value} is not a cosine distance"),
                        WarningSeverity::Error,
                    )
                    .hint("Cosine distances range from 0.0 to 2.0"),
                );
            }
        }
        if self.memory.dedup_threshold > self.memory.search_threshold {
            warnings.push(ConfigWarning::new(
                "memory.dedup_threshold",
                "dedup threshold is looser than the search threshold",
                WarningSeverity::Warning,
            ));
        }
        if self.memory.embedding_dims == 0 {
            warnings.push(ConfigWarning::new(
                "memory.embedding_dims",
                "embedding_dims is 0",
                WarningSeverity::Error,
            ));
        }

        // ── Learning ───
        if self.learning.max_concurrent_reflections == 0 {
            warnings.push(
                ConfigWarning::new(
                    "learning.max_concurrent_reflections",
                    "0 would block every reflection forever",
                    WarningSeverity::Error,
                )
                .hint("Set to 1 or more"),
            );
        }
        if self.learning.reflection_temperature > 0.5 {
            warnings.push(ConfigWarning::new(
                "learning.reflection_temperature",
                format!(
                    "reflection temperature {} is high for JSON extraction",
                    self.learning.reflection_temperature
                ),
                WarningSeverity::Warning,
            ));
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(
                ConfigWarning::new(
                    "logging.format",
                    format!("unknown log format '{}'", self.logging.format),
                    WarningSeverity::Warning,
                )
                .hint(format!("Valid values: {}", valid_formats.join(", "))),
            );
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(
                ConfigWarning::new(
                    "logging.level",
                    format!("unknown log level '{}'", self.logging.level),
                    WarningSeverity::Warning,
                )
                .hint(format!("Valid values: {}", valid_levels.join(", "))),
            );
        }

        // ── Credentials ───
        if self.services.api_key.is_none() {
            warnings.push(
                ConfigWarning::new(
                    "services.api_key",
                    "no chat API key configured",
                    WarningSeverity::Info,
                )
                .hint("Set services.api_key or AURA_API_KEY"),
            );
        }
        if self.memory.embedding == EmbeddingBackend::Openai
            && self.services.embedding_api_key.is_none()
        {
            warnings.push(ConfigWarning::new(
                "services.embedding_api_key",
                "remote embeddings selected without an API key",
                WarningSeverity::Error,
            ));
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }

    /// The model used for reflection calls.
    pub fn reflection_model(&self) -> &str {
        self.learning
            .reflection_model
            .as_deref()
            .unwrap_or(&self.agent.model)
    }
}
