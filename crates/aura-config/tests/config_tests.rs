#[cfg(test)]
mod tests {
    use aura_config::ConfigLoader;
    use aura_config::schema::*;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_agent_defaults() {
        let config = AuraConfig::default();
        assert_eq!(config.agent.model, "deepseek-chat");
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.max_history, 20);
        assert_eq!(config.agent.tool_timeout_secs, 120);
    }

    #[test]
    fn test_memory_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.embedding, EmbeddingBackend::Hash);
        assert_eq!(config.embedding_dims, 384);
        assert_eq!(config.importance_boost, 0.1);
        assert_eq!(config.min_relevance, 0.5);
        assert!(config.seed_recipes);
    }

    #[test]
    fn test_learning_and_retry_defaults() {
        let learning = LearningConfig::default();
        assert_eq!(learning.slow_threshold_secs, 30.0);
        assert_eq!(learning.tool_count_threshold, 3);
        assert_eq!(learning.sample_capacity, 100);

        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.base_delay_ms, 1_000);
        assert_eq!(retry.rate_limit_step_ms, 5_000);
    }

    #[test]
    fn test_reflection_model_falls_back_to_agent_model() {
        let mut config = AuraConfig::default();
        assert_eq!(config.reflection_model(), "deepseek-chat");
        config.learning.reflection_model = Some("small-model".into());
        assert_eq!(config.reflection_model(), "small-model");
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = AuraConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored = ConfigLoader::parse(&toml_str).unwrap();
        assert_eq!(restored.agent.model, config.agent.model);
        assert_eq!(restored.memory.db_path, config.memory.db_path);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let config = ConfigLoader::parse(
            r#"
[agent]
model = "gpt-4o-mini"

[memory]
embedding = "openai"
"#,
        )
        .unwrap();
        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert_eq!(config.memory.embedding, EmbeddingBackend::Openai);
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.learning.max_concurrent_reflections, 2);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        let warnings = AuraConfig::default().validate().unwrap();
        assert!(
            warnings
                .iter()
                .all(|w| w.severity != WarningSeverity::Error)
        );
    }

    #[test]
    fn test_zero_iterations_is_an_error() {
        let mut config = AuraConfig::default();
        config.agent.max_iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("agent.max_iterations"));
    }

    #[test]
    fn test_openai_embedding_requires_key() {
        let mut config = AuraConfig::default();
        config.memory.embedding = EmbeddingBackend::Openai;
        assert!(config.validate().is_err());
        config.services.embedding_api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_format_warns() {
        let mut config = AuraConfig::default();
        config.logging.format = "xml".into();
        let warnings = config.validate().unwrap();
        let w = warnings
            .iter()
            .find(|w| w.field == "logging.format")
            .unwrap();
        assert_eq!(w.severity, WarningSeverity::Warning);
        assert!(w.to_string().contains("xml"));
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("aura.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[agent]
max_iterations = 7

[memory]
db_path = "brain.db"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.agent.max_iterations, 7);
        // Relative data paths are anchored next to the config file.
        assert_eq!(config.memory.db_path, dir.path().join("brain.db"));
        assert_eq!(config.session.path, dir.path().join("session.json"));
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("aura.toml");
        std::fs::write(&config_path, "[agent]\ntemperature = 9.0\n").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());

        std::fs::write(&config_path, "[agent\n").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(loader.get().agent.model, AuraConfig::default().agent.model);
    }
}
