use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tracing::warn;

use aura_config::AuraConfig;
use aura_memory::default_seeds;
use aura_runtime::{JsonSessionStore, Orchestrator, SessionStore, ToolRegistry};

use super::{build_provider, open_memory};

pub(super) async fn cmd_chat(config: &AuraConfig, no_learn: bool) -> aura_core::Result<()> {
    let llm = build_provider(config)?;
    let memory = open_memory(config)?;
    if config.memory.seed_recipes
        && let Err(e) = memory.seed_recipes(&default_seeds()).await
    {
        warn!(error = %e, "failed to install seed recipes");
    }

    let session = Arc::new(JsonSessionStore::new(config.session.path.clone()));
    let greeting = match session.load() {
        Ok(state) => match state.last_interaction {
            Some(at) => format!("   Last talked {}", at.format("%Y-%m-%d %H:%M UTC")),
            None => "   First conversation".to_string(),
        },
        Err(e) => {
            warn!(error = %e, "could not read session file");
            String::new()
        }
    };

    let mut config = config.clone();
    if no_learn {
        config.learning.memory_reflection = false;
        config.learning.lesson_reflection = false;
    }
    let registry = ToolRegistry::new().with_memory_tools(memory.clone());
    let schemas = registry.schemas();
    let mut orchestrator = Orchestrator::from_config(llm, memory.clone(), &config).with_session(session);

    println!("✨ Aura");
    println!("   Model: {}", config.agent.model);
    if !greeting.is_empty() {
        println!("{greeting}");
    }
    println!("   Type 'exit' or Ctrl+D to quit, '/clear' to reset the conversation, '/stats' for memory stats");
    println!();

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "exit" | "quit" | "/exit" => break,
            "/clear" => {
                orchestrator.clear_history();
                println!("\x1b[90m   conversation cleared\x1b[0m\n");
                continue;
            }
            "/stats" => {
                let stats = memory.stats();
                let turns = match orchestrator.monitor().average_elapsed_secs() {
                    Some(avg) => format!(", {} turns averaging {avg:.1}s", orchestrator.monitor().len()),
                    None => String::new(),
                };
                println!(
                    "\x1b[90m   {} memories, {} recipes ({} learned){turns}\x1b[0m\n",
                    stats.memories, stats.recipes, stats.learned_recipes
                );
                continue;
            }
            _ => {}
        }

        let reply = orchestrator
            .chat(trimmed, &config.agent.system_prompt, &schemas, &registry)
            .await;
        println!("\x1b[32maura>\x1b[0m {reply}\n");
    }

    println!("👋 Goodbye!");
    orchestrator.shutdown().await;
    Ok(())
}
