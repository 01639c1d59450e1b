//! # aura-runtime
//!
//! The conversation engine. One call to [`Orchestrator::chat`] drives one user
//! utterance to one reply:
//!
//! ```text
//!   user input ──► recipe hint ──► [system + history + user]
//!                                        │
//!                        ┌───────────────▼───────────────┐
//!                        │  LLM ◄──► tool calls (bounded) │
//!                        └───────────────┬───────────────┘
//!                                        ▼
//!                 reply ◄── performance sample ──► system hint (next turn)
//!                   │                      └────► lesson reflection ──► recipes
//!                   └──────────────────────────► memory reflection ──► memories
//! ```
//!
//! Reflection runs on a bounded background pool and never affects the reply.

pub mod dispatch;
pub mod history;
pub mod orchestrator;
pub mod performance;
pub mod reflection;
pub mod session;
pub mod tools;

pub use dispatch::{ToolRegistry, TypedTool};
pub use history::ConversationHistory;
pub use orchestrator::{Orchestrator, OrchestratorSettings, APOLOGY_REPLY, TOO_COMPLEX_REPLY};
pub use performance::{PerformanceMonitor, PerformanceSample, SystemHint};
pub use reflection::{ReflectionPool, Reflector};
pub use session::{InMemorySessionStore, JsonSessionStore, SessionState, SessionStore};
