use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::AuraConfig;

/// Loads the Aura configuration.
pub struct ConfigLoader {
    config: AuraConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > AURA_CONFIG env > ~/.aura/aura.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("AURA_CONFIG") {
            return PathBuf::from(p);
        }
        Self::data_dir().join("aura.toml")
    }

    /// `~/.aura`, where relative data paths are anchored.
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aura")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> aura_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                aura_core::AuraError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            AuraConfig::default()
        };

        let mut config = Self::apply_env_overrides(config);
        Self::anchor_paths(&mut config, config_path.parent());

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(aura_core::AuraError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse a TOML document into a config.
    pub fn parse(raw: &str) -> Result<AuraConfig, toml::de::Error> {
        toml::from_str::<AuraConfig>(raw)
    }

    pub fn get(&self) -> &AuraConfig {
        &self.config
    }

    pub fn into_config(self) -> AuraConfig {
        self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (AURA_MODEL, AURA_LOG_LEVEL, ...).
    pub fn apply_env_overrides(mut config: AuraConfig) -> AuraConfig {
        if let Ok(v) = std::env::var("AURA_MODEL") {
            config.agent.model = v;
        }
        if let Ok(v) = std::env::var("AURA_BASE_URL") {
            config.agent.base_url = v;
        }
        if let Ok(v) = std::env::var("AURA_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("AURA_MAX_ITERATIONS")
            && let Ok(n) = v.parse::<u32>()
        {
            config.agent.max_iterations = n;
        }
        if let Ok(v) = std::env::var("AURA_MEMORY_DB") {
            config.memory.db_path = PathBuf::from(v);
        }
        // Config file takes priority, env is the fallback.
        if config.services.api_key.is_none() {
            config.services.api_key = std::env::var("AURA_API_KEY")
                .or_else(|_| std::env::var("DEEPSEEK_API_KEY"))
                .ok();
        }
        if config.services.embedding_api_key.is_none()
            && let Ok(v) = std::env::var("OPENAI_API_KEY")
        {
            config.services.embedding_api_key = Some(v);
        }
        config
    }

    /// Relative data paths live next to the config file.
    fn anchor_paths(config: &mut AuraConfig, base: Option<&Path>) {
        let Some(base) = base else { return };
        if config.memory.db_path.is_relative() {
            config.memory.db_path = base.join(&config.memory.db_path);
        }
        if config.session.path.is_relative() {
            config.session.path = base.join(&config.session.path);
        }
    }
}
