use uuid::Uuid;

use aura_config::AuraConfig;
use aura_core::AuraError;
use aura_memory::{MemoryCategory, RecipeMeta, default_seeds};

use super::{MemoryAction, RecipeAction, open_memory};

fn parse_id(raw: &str) -> aura_core::Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|e| AuraError::NotFound(format!("{raw}: {e}")))
}

pub(super) async fn cmd_memory(config: &AuraConfig, action: MemoryAction) -> aura_core::Result<()> {
    let store = open_memory(config)?;
    match action {
        MemoryAction::List { category, json } => {
            let filter = match category.as_deref() {
                Some(c) => Some(
                    c.parse::<MemoryCategory>()
                        .map_err(|_| AuraError::Config(format!("unknown category: {c}")))?,
                ),
                None => None,
            };
            let memories: Vec<_> = store
                .list_memories()
                .into_iter()
                .filter(|m| filter.is_none_or(|f| m.category == f))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&memories)?);
            } else if memories.is_empty() {
                println!("No memories yet.");
            } else {
                for m in &memories {
                    println!(
                        "{}  [{}] ★{}  {}",
                        m.id,
                        m.category,
                        m.meta.importance,
                        m.content
                    );
                }
            }
        }
        MemoryAction::Search { query, limit } => {
            let ranked = store.relevant_memories(&query, limit).await?;
            if ranked.is_empty() {
                println!("Nothing relevant.");
            }
            for (hit, score) in ranked {
                println!(
                    "{:.2}  [{}] {}",
                    score, hit.record.category, hit.record.content
                );
            }
        }
        MemoryAction::Forget { keyword, id } => match (keyword, id) {
            (_, Some(id)) => {
                if store.delete_memory(parse_id(&id)?)? {
                    println!("Forgot {id}.");
                } else {
                    println!("No memory with id {id}.");
                }
            }
            (Some(keyword), None) => {
                let removed = store.forget_by_content(&keyword)?;
                println!("Forgot {} memories.", removed.len());
                for m in removed {
                    println!("  - {}", m.content);
                }
            }
            (None, None) => {
                return Err(AuraError::Config("give a keyword or --id".into()));
            }
        },
        MemoryAction::Stats { json } => {
            let stats = store.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Memories: {}", stats.memories);
                for (category, count) in &stats.by_category {
                    println!("  {category:<11} {count}");
                }
                println!(
                    "Recipes:  {} ({} seeded, {} learned)",
                    stats.recipes, stats.seeded_recipes, stats.learned_recipes
                );
            }
        }
    }
    Ok(())
}

pub(super) async fn cmd_recipe(config: &AuraConfig, action: RecipeAction) -> aura_core::Result<()> {
    let store = open_memory(config)?;
    match action {
        RecipeAction::List { json } => {
            let recipes = store.list_recipes();
            if json {
                println!("{}", serde_json::to_string_pretty(&recipes)?);
            } else if recipes.is_empty() {
                println!("No recipes yet.");
            } else {
                for r in &recipes {
                    println!("{}  ★{}  ({})", r.id, r.meta.importance, r.meta.source);
                    println!("    when: {}", r.trigger);
                    println!("    do:   {}", r.solution);
                }
            }
        }
        RecipeAction::Add {
            trigger,
            solution,
            importance,
        } => {
            let outcome = store
                .add_recipe(&trigger, &solution, RecipeMeta::new(importance, "user"))
                .await?;
            if outcome.is_inserted() {
                println!("Added recipe {}.", outcome.id());
            } else {
                println!("A near-identical recipe already exists: {}.", outcome.id());
            }
        }
        RecipeAction::Seed => {
            let written = store.seed_recipes(&default_seeds()).await?;
            println!("Installed {written} seed recipes.");
        }
        RecipeAction::Remove { id } => {
            if store.delete_recipe(parse_id(&id)?)? {
                println!("Removed {id}.");
            } else {
                println!("No recipe with id {id}.");
            }
        }
    }
    Ok(())
}
