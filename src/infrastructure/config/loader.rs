use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("Invalid top_k: {0}. Must be at least 1")]
    InvalidTopK(usize),

    #[error("Invalid oversample: {0}. Must be at least 1")]
    InvalidOversample(usize),

    #[error("Invalid max_context_chars: {0}. Must be greater than 0")]
    InvalidMaxContextChars(usize),

    #[error("Invalid embedding dimension: {0}. Must be greater than 0")]
    InvalidDimension(usize),

    #[error("Invalid ingest concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid timeout for {0}: must be greater than 0 seconds")]
    InvalidTimeout(&'static str),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Unknown {kind} provider: {name}")]
    UnknownProvider { kind: &'static str, name: String },

    #[error("Index path cannot be empty")]
    EmptyIndexPath,
}

const EMBEDDING_PROVIDERS: [&str; 1] = ["voyage"];
const GENERATION_PROVIDERS: [&str; 1] = ["anthropic"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mmrag/config.yaml (project config)
    /// 3. .mmrag/local.yaml (project local overrides, optional)
    /// 4. Environment variables (MMRAG_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MMRAG_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".mmrag/config.yaml"))
            .merge(Yaml::file(".mmrag/local.yaml"))
            .merge(Env::prefixed("MMRAG_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.data.index_path.is_empty() {
            return Err(ConfigError::EmptyIndexPath);
        }

        config
            .chunking
            .validate()
            .map_err(ConfigError::InvalidChunking)?;

        // Embedding and generation backends
        if !EMBEDDING_PROVIDERS.contains(&config.embedding.provider.as_str()) {
            return Err(ConfigError::UnknownProvider {
                kind: "embedding",
                name: config.embedding.provider.clone(),
            });
        }
        if !GENERATION_PROVIDERS.contains(&config.generation.provider.as_str()) {
            return Err(ConfigError::UnknownProvider {
                kind: "generation",
                name: config.generation.provider.clone(),
            });
        }
        if config.embedding.dimension == 0 {
            return Err(ConfigError::InvalidDimension(config.embedding.dimension));
        }
        if config.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("embedding"));
        }
        if config.generation.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("generation"));
        }

        if config.ingest.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(config.ingest.concurrency));
        }

        // Query tuning
        if config.query.top_k == 0 {
            return Err(ConfigError::InvalidTopK(config.query.top_k));
        }
        if config.query.oversample == 0 {
            return Err(ConfigError::InvalidOversample(config.query.oversample));
        }
        if config.query.max_context_chars == 0 {
            return Err(ConfigError::InvalidMaxContextChars(
                config.query.max_context_chars,
            ));
        }
        if config.query.embed_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("query embedding"));
        }
        if config.query.generation_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("query generation"));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        // Rate limit and retry
        if config.rate_limit.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::QueryFusion;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.index_path, ".mmrag/index.db");
        assert_eq!(config.embedding.provider, "voyage");
        assert_eq!(config.generation.provider, "anthropic");
        assert!((config.rate_limit.requests_per_second - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
embedding:
  dimension: 512
  timeout_secs: 10
chunking:
  chunk_size: 500
  chunk_overlap: 100
query:
  top_k: 8
  max_chunks_per_source: 0
  fusion: prefer_text
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.embedding.dimension, 512);
        assert_eq!(config.embedding.model, "voyage-multimodal-3");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.query.top_k, 8);
        assert_eq!(config.query.max_chunks_per_source, 0);
        assert_eq!(config.query.fusion, QueryFusion::PreferText);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_chunk_overlap() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidChunking(_))
        ));
    }

    #[test]
    fn test_validate_zero_top_k() {
        let mut config = Config::default();
        config.query.top_k = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTopK(0))
        ));
    }

    #[test]
    fn test_validate_zero_dimension() {
        let mut config = Config::default();
        config.embedding.dimension = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDimension(0))
        ));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.embedding.provider = "bedrock".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::UnknownProvider { kind, name }) => {
                assert_eq!(kind, "embedding");
                assert_eq!(name, "bedrock");
            }
            other => panic!("Expected UnknownProvider, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.requests_per_second = 0.0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "query:\n  top_k: 3\nlogging:\n  level: warn\n  format: json"
        )
        .unwrap();
        file.flush().unwrap();

        let config = temp_env::with_vars(
            [
                ("MMRAG_QUERY__TOP_K", Some("7")),
                ("MMRAG_EMBEDDING__DIMENSION", Some("256")),
            ],
            || ConfigLoader::load_from_file(file.path()),
        )
        .unwrap();

        assert_eq!(config.query.top_k, 7, "env should win over the file");
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.logging.level, "warn", "file value should persist");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(ConfigLoader::load_from_file("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "query:\n  top_k: 4\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "query:\n  top_k: 9\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.query.top_k, 9, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
