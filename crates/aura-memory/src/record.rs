use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What kind of fact a memory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Preference,
    Fact,
    Event,
    Task,
    General,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 5] = [
        MemoryCategory::Preference,
        MemoryCategory::Fact,
        MemoryCategory::Event,
        MemoryCategory::Task,
        MemoryCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Preference => "preference",
            MemoryCategory::Fact => "fact",
            MemoryCategory::Event => "event",
            MemoryCategory::Task => "task",
            MemoryCategory::General => "general",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = aura_core::AuraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| aura_core::AuraError::Memory(format!("unknown memory category '{s}'")))
    }
}

/// Clamp an importance score into 1..=5.
pub fn clamp_importance(importance: u8) -> u8 {
    importance.clamp(1, 5)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMeta {
    pub timestamp: DateTime<Utc>,
    /// 1 (trivia) to 5 (core fact).
    pub importance: u8,
    /// Who wrote it: "user", "auto_reflection", "tool", ...
    pub source: String,
}

impl MemoryMeta {
    pub fn new(importance: u8, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            importance: clamp_importance(importance),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub content: String,
    pub category: MemoryCategory,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub meta: MemoryMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeMeta {
    pub timestamp: DateTime<Utc>,
    pub importance: u8,
    pub source: String,
    /// Wall-clock time of the turn the lesson came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    /// Tool sequence of that turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_task: Option<String>,
}

impl RecipeMeta {
    pub fn new(importance: u8, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            importance: clamp_importance(importance),
            source: source.into(),
            elapsed_secs: None,
            tools: vec![],
            original_task: None,
        }
    }

    /// Attach the performance context of a learned lesson.
    pub fn learned_from(mut self, elapsed_secs: f64, tools: Vec<String>, task: impl Into<String>) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self.tools = tools;
        self.original_task = Some(task.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: Uuid,
    /// Scenario the lesson applies to. Recall matches against this.
    pub trigger: String,
    /// What to do. Uniqueness is keyed on this.
    pub solution: String,
    #[serde(skip)]
    pub trigger_embedding: Vec<f32>,
    #[serde(skip)]
    pub solution_embedding: Vec<f32>,
    pub meta: RecipeMeta,
}

/// Result of an insert that may be skipped as a near-duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(Uuid),
    /// A near-duplicate already exists; nothing was written.
    Duplicate(Uuid),
}

impl AddOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            AddOutcome::Inserted(id) | AddOutcome::Duplicate(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted(_))
    }
}

/// A memory search result. Lower distance is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHit {
    pub record: MemoryRecord,
    pub distance: f32,
}

impl MemoryHit {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeHit {
    pub record: RecipeRecord,
    pub distance: f32,
}

impl RecipeHit {
    pub fn relevance(&self) -> f32 {
        1.0 - self.distance
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub memories: usize,
    pub recipes: usize,
    pub by_category: BTreeMap<MemoryCategory, usize>,
    pub seeded_recipes: usize,
    pub learned_recipes: usize,
}
