//! Built-in memory tools the model can call directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use aura_core::{Result, ToolSchema};
use aura_memory::context::format_recipe_list;
use aura_memory::{AddOutcome, MemoryCategory, MemoryMeta, MemoryStore, RecipeMeta};

use crate::dispatch::{ToolRegistry, TypedTool};

/// Recipes returned by `recall_recipe`.
const RECALL_LIMIT: usize = 3;

pub struct SaveMemory(pub Arc<MemoryStore>);

#[derive(Debug, Deserialize)]
pub struct SaveMemoryArgs {
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub importance: Option<u8>,
}

#[async_trait]
impl TypedTool for SaveMemory {
    const NAME: &'static str = "save_memory";
    type Args = SaveMemoryArgs;

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            Self::NAME,
            "Remember something about the user for future conversations.",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The fact to remember, one sentence"},
                    "category": {"type": "string", "enum": ["preference", "fact", "event", "task", "general"]},
                    "importance": {"type": "integer", "minimum": 1, "maximum": 5}
                },
                "required": ["content"]
            }),
        )
    }

    async fn call(&self, args: SaveMemoryArgs) -> Result<String> {
        let category = args
            .category
            .as_deref()
            .and_then(|c| c.parse::<MemoryCategory>().ok())
            .unwrap_or(MemoryCategory::General);
        let meta = MemoryMeta::new(args.importance.unwrap_or(3), "user");
        Ok(match self.0.add_memory(&args.content, category, meta).await? {
            AddOutcome::Inserted(_) => format!("Remembered: {}", args.content.trim()),
            AddOutcome::Duplicate(_) => "I already remember that.".to_string(),
        })
    }
}

pub struct ForgetMemory(pub Arc<MemoryStore>);

#[derive(Debug, Deserialize)]
pub struct ForgetMemoryArgs {
    pub keyword: String,
}

#[async_trait]
impl TypedTool for ForgetMemory {
    const NAME: &'static str = "forget_memory";
    type Args = ForgetMemoryArgs;

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            Self::NAME,
            "Forget every memory containing a keyword.",
            json!({
                "type": "object",
                "properties": {"keyword": {"type": "string"}},
                "required": ["keyword"]
            }),
        )
    }

    async fn call(&self, args: ForgetMemoryArgs) -> Result<String> {
        let removed = self.0.forget_by_content(&args.keyword)?;
        Ok(if removed.is_empty() {
            format!("No memories mention \"{}\".", args.keyword)
        } else {
            format!("Forgot {} memories about \"{}\".", removed.len(), args.keyword)
        })
    }
}

pub struct RememberRecipe(pub Arc<MemoryStore>);

#[derive(Debug, Deserialize)]
pub struct RememberRecipeArgs {
    pub trigger: String,
    pub solution: String,
}

#[async_trait]
impl TypedTool for RememberRecipe {
    const NAME: &'static str = "remember_recipe";
    type Args = RememberRecipeArgs;

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            Self::NAME,
            "Save a lesson: when a situation comes up, what approach works.",
            json!({
                "type": "object",
                "properties": {
                    "trigger": {"type": "string", "description": "When this applies"},
                    "solution": {"type": "string", "description": "What to do"}
                },
                "required": ["trigger", "solution"]
            }),
        )
    }

    async fn call(&self, args: RememberRecipeArgs) -> Result<String> {
        let outcome = self
            .0
            .add_recipe(&args.trigger, &args.solution, RecipeMeta::new(4, "user"))
            .await?;
        Ok(if outcome.is_inserted() {
            "Lesson saved.".to_string()
        } else {
            "I already know that lesson.".to_string()
        })
    }
}

pub struct RecallRecipe(pub Arc<MemoryStore>);

#[derive(Debug, Deserialize)]
pub struct RecallRecipeArgs {
    pub query: String,
}

#[async_trait]
impl TypedTool for RecallRecipe {
    const NAME: &'static str = "recall_recipe";
    type Args = RecallRecipeArgs;

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            Self::NAME,
            "Look up saved lessons for a kind of task.",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, args: RecallRecipeArgs) -> Result<String> {
        let hits = self.0.recall_recipe(&args.query, RECALL_LIMIT).await?;
        Ok(format_recipe_list(&hits))
    }
}

impl ToolRegistry {
    /// Register the four memory tools against `memory`.
    pub fn with_memory_tools(mut self, memory: Arc<MemoryStore>) -> Self {
        self.register(SaveMemory(memory.clone()))
            .register(ForgetMemory(memory.clone()))
            .register(RememberRecipe(memory.clone()))
            .register(RecallRecipe(memory));
        self
    }
}
