//! # aura-memory
//!
//! Long-term memory for the Aura companion. Two collections live side by side:
//!
//! - **Memories**: facts about the user and the world (preferences, events, tasks).
//! - **Recipes**: operational lessons, a trigger scenario paired with the approach
//!   that worked, recalled before similar tasks.
//!
//! Both are embedded, persisted in SQLite, and searched by cosine distance
//! through an in-memory index. Near-duplicates are skipped on insert, never
//! overwritten.

pub mod context;
pub mod record;
pub mod seed;
pub mod store;
pub mod vector;

pub use record::{
    AddOutcome, MemoryCategory, MemoryHit, MemoryMeta, MemoryRecord, MemoryStats, RecipeHit,
    RecipeMeta, RecipeRecord,
};
pub use seed::{SeedRecipe, default_seeds};
pub use store::{MemorySettings, MemoryStore};
