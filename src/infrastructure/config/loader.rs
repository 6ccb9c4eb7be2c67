//! Layered configuration loading: defaults, project file, local overrides, extra
//! file, then `TESTRECALL_` environment variables.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::MAX_ANALYSIS_DEPTH;

/// Project config, created by `init`
pub const PROJECT_CONFIG_PATH: &str = ".testrecall/config.yaml";
/// Optional local overrides
pub const LOCAL_CONFIG_PATH: &str = ".testrecall/local.yaml";
/// Prefix of environment overrides, e.g. `TESTRECALL_ANALYSIS__MAX_DEPTH`
pub const ENV_PREFIX: &str = "TESTRECALL_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_depth: {0}. Must be between 1 and {MAX_ANALYSIS_DEPTH}")]
    InvalidMaxDepth(u32),

    #[error("Invalid default_depth: {depth}. Must be between 1 and max_depth ({max})")]
    InvalidDefaultDepth { depth: u32, max: u32 },

    #[error("Invalid history_limit: {0}. Must be at least 1")]
    InvalidHistoryLimit(u32),

    #[error("Invalid max_workers: {0}. Must be at least 1")]
    InvalidMaxWorkers(usize),

    #[error("Invalid similarity threshold {name}: {value}. Must be in (0, 1]")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .testrecall/config.yaml
    /// 3. .testrecall/local.yaml
    /// 4. `explicit`, when given
    /// 5. Environment variables (TESTRECALL_* prefix, `__` separates sections)
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        let config: Config = Self::figment(explicit)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The merged providers, before extraction.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG_PATH))
            .merge(Yaml::file(LOCAL_CONFIG_PATH));
        if let Some(path) = explicit {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

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
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        let analysis = &config.analysis;
        if analysis.max_depth == 0 || analysis.max_depth > MAX_ANALYSIS_DEPTH {
            return Err(ConfigError::InvalidMaxDepth(analysis.max_depth));
        }
        if analysis.default_depth == 0 || analysis.default_depth > analysis.max_depth {
            return Err(ConfigError::InvalidDefaultDepth {
                depth: analysis.default_depth,
                max: analysis.max_depth,
            });
        }
        if analysis.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit(analysis.history_limit));
        }
        if analysis.max_workers == 0 {
            return Err(ConfigError::InvalidMaxWorkers(analysis.max_workers));
        }

        let thresholds = &config.similarity;
        for (name, value) in [
            ("levenshtein_ratio", thresholds.levenshtein_ratio),
            ("cosine_ratio", thresholds.cosine_ratio),
            ("stream_ratio", thresholds.stream_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        Ok(())
    }
}
