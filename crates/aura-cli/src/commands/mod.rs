use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aura_config::{AuraConfig, ConfigLoader, EmbeddingBackend};
use aura_core::AuraError;
use aura_llm::{EmbeddingProvider, HashEmbedding, LlmProvider, OpenAiEmbedding, OpenAiProvider};
use aura_memory::{MemorySettings, MemoryStore};

mod chat;
mod memory;

/// Aura: a voice companion that remembers and learns from its own slowness
#[derive(Parser)]
#[command(name = "aura", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to aura.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the terminal
    Chat {
        /// Skip background reflection (no new memories or recipes)
        #[arg(long)]
        no_learn: bool,
    },
    /// Inspect and edit long-term memories
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Inspect and edit recipes (lessons from past tasks)
    Recipe {
        #[command(subcommand)]
        action: RecipeAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum MemoryAction {
    /// List stored memories, newest first
    List {
        /// Only show one category: preference, fact, event, task, general
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search memories by meaning
    Search {
        query: String,
        /// Maximum results
        #[arg(short = 'k', long, default_value = "5")]
        limit: usize,
    },
    /// Forget memories containing a keyword, or one memory by id
    Forget {
        /// Keyword to match (case-insensitive)
        keyword: Option<String>,
        /// Exact memory id
        #[arg(long, conflicts_with = "keyword")]
        id: Option<String>,
    },
    /// Show counts per collection and category
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum RecipeAction {
    /// List recipes, most important first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe by hand
    Add {
        /// When the lesson applies
        trigger: String,
        /// What to do
        solution: String,
        /// Importance 1-5
        #[arg(short, long, default_value = "4")]
        importance: u8,
    },
    /// Install the built-in recipes (skips ones already present)
    Seed,
    /// Remove a recipe by id
    Remove { id: String },
}

impl Cli {
    pub async fn run(self) -> aura_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config default
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Chat { no_learn } => chat::cmd_chat(config, no_learn).await,
            Commands::Memory { action } => memory::cmd_memory(config, action).await,
            Commands::Recipe { action } => memory::cmd_recipe(config, action).await,
            Commands::Config { json } => Self::cmd_config(config, json),
        }
    }

    fn cmd_config(config: &AuraConfig, json: bool) -> aura_core::Result<()> {
        let mut shown = config.clone();
        redact(&mut shown.services.api_key);
        redact(&mut shown.services.embedding_api_key);
        if json {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&shown).map_err(|e| AuraError::Config(e.to_string()))?
            );
        }
        Ok(())
    }
}

fn redact(secret: &mut Option<String>) {
    if let Some(s) = secret.as_mut() {
        *s = format!("{}…", s.chars().take(4).collect::<String>());
    }
}

/// `RUST_LOG` wins over the resolved level.
fn init_tracing(format: &str, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

// ── Wiring ─────────────────────────────────────────────────────

pub(crate) fn build_embedder(config: &AuraConfig) -> aura_core::Result<Arc<dyn EmbeddingProvider>> {
    let memory = &config.memory;
    match memory.embedding {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedding::new(memory.embedding_dims))),
        EmbeddingBackend::Openai => {
            let key = config.services.embedding_api_key.clone().ok_or_else(|| {
                AuraError::Config(
                    "memory.embedding = \"openai\" needs services.embedding_api_key or OPENAI_API_KEY"
                        .into(),
                )
            })?;
            Ok(Arc::new(OpenAiEmbedding::new(
                key,
                memory.embedding_base_url.clone(),
                memory.embedding_model.clone(),
                memory.embedding_dims,
            )))
        }
    }
}

pub(crate) fn memory_settings(config: &AuraConfig) -> MemorySettings {
    let m = &config.memory;
    MemorySettings {
        dedup_threshold: m.dedup_threshold,
        recipe_dedup_threshold: m.recipe_dedup_threshold,
        search_threshold: m.search_threshold,
        recipe_threshold: m.recipe_threshold,
        importance_boost: m.importance_boost,
        min_relevance: m.min_relevance,
    }
}

pub(crate) fn open_memory(config: &AuraConfig) -> aura_core::Result<Arc<MemoryStore>> {
    if let Some(parent) = config.memory.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let store = MemoryStore::open(&config.memory.db_path, build_embedder(config)?, memory_settings(config))?;
    Ok(Arc::new(store))
}

pub(crate) fn build_provider(config: &AuraConfig) -> aura_core::Result<Arc<dyn LlmProvider>> {
    let key = config.services.api_key.clone().ok_or_else(|| {
        AuraError::Config(
            "no chat API key: set [services] api_key in aura.toml, or AURA_API_KEY / DEEPSEEK_API_KEY"
                .into(),
        )
    })?;
    let provider = OpenAiProvider::new(
        key,
        config.agent.base_url.clone(),
        Duration::from_secs(config.retry.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_memory_forget_by_id() {
        let cli = Cli::try_parse_from(["aura", "memory", "forget", "--id", "abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Memory {
                action: MemoryAction::Forget { keyword: None, id: Some(_) }
            }
        ));
    }

    #[test]
    fn test_memory_settings_follow_config() {
        let mut config = AuraConfig::default();
        config.memory.dedup_threshold = 0.05;
        assert_eq!(memory_settings(&config).dedup_threshold, 0.05);
        assert_eq!(memory_settings(&AuraConfig::default()), MemorySettings::default());
    }

    #[test]
    fn test_openai_embedding_requires_key() {
        let mut config = AuraConfig::default();
        config.memory.embedding = EmbeddingBackend::Openai;
        config.services.embedding_api_key = None;
        assert!(build_embedder(&config).is_err());
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        let mut key = Some("sk-abcdef123".to_string());
        redact(&mut key);
        assert_eq!(key.as_deref(), Some("sk-a…"));
    }
}
