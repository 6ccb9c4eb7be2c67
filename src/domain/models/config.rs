//! Configuration model, deserialized from YAML and environment by the loader.

use serde::{Deserialize, Serialize};

use super::analysis::MAX_ANALYSIS_DEPTH;

/// Main configuration structure for testrecall
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Failure analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Similarity thresholds
    #[serde(default)]
    pub similarity: SimilarityThresholds,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".testrecall/testrecall.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (console only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Failure analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalysisConfig {
    /// Depth used when a check does not specify one
    #[serde(default = "default_depth")]
    pub default_depth: u32,

    /// Largest depth a caller may request (at most 128)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of recent suite runs used by history listings
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Concurrent comparison workers for batch analysis
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-failure comparison deadline for batch analysis, counted from the failure's
    /// first comparison getting a worker; none when unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

const fn default_depth() -> u32 {
    16
}

const fn default_max_depth() -> u32 {
    MAX_ANALYSIS_DEPTH
}

const fn default_history_limit() -> u32 {
    32
}

const fn default_max_workers() -> usize {
    4
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            history_limit: default_history_limit(),
            max_workers: default_max_workers(),
            timeout_ms: None,
        }
    }
}

/// Thresholds used by the similarity checker. All ratios are in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimilarityThresholds {
    /// Minimum normalized Levenshtein ratio for text fields
    #[serde(default = "default_levenshtein_ratio")]
    pub levenshtein_ratio: f64,

    /// Minimum rescaled TF-IDF cosine ratio for text fields
    #[serde(default = "default_cosine_ratio")]
    pub cosine_ratio: f64,

    /// Minimum sequence-matcher ratio for stdout/stderr
    #[serde(default = "default_stream_ratio")]
    pub stream_ratio: f64,
}

const fn default_levenshtein_ratio() -> f64 {
    0.90
}

const fn default_cosine_ratio() -> f64 {
    0.97
}

const fn default_stream_ratio() -> f64 {
    0.95
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            levenshtein_ratio: default_levenshtein_ratio(),
            cosine_ratio: default_cosine_ratio(),
            stream_ratio: default_stream_ratio(),
        }
    }
}
