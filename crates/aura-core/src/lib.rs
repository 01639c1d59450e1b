//! # aura-core
//!
//! Shared vocabulary for the Aura companion engine: the unified error type,
//! conversation messages, tool calls, and the tool-execution seam that every
//! other crate in the workspace builds on.

pub mod error;
pub mod message;
pub mod tool;

pub use error::{AuraError, Result, RetryClass};
pub use message::{Message, Role};
pub use tool::{ToolCall, ToolExecutor, ToolSchema};
