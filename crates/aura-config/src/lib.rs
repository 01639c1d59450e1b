//! # aura-config
//!
//! Configuration for the Aura engine. Reads `aura.toml`, then environment
//! variables, then CLI overrides (applied by the caller), in that precedence
//! order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::AuraConfig;
pub use schema::{
    AgentConfig, ConfigWarning, EmbeddingBackend, LearningConfig, LoggingConfig, MemoryConfig,
    RetryConfig, ServicesConfig, SessionConfig, WarningSeverity,
};
