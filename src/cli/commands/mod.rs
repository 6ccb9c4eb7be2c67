//! CLI command implementations.

pub mod check;
pub mod check_run;
pub mod failed;
pub mod history;
pub mod import;
pub mod init;
pub mod runs;

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteTestHistoryRepository};
use crate::domain::models::Config;
use crate::domain::ports::SuiteRunWindow;
use crate::services::{ResultsService, SimilarityChecker};

/// Settings shared by every command.
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Print JSON instead of tables
    pub json: bool,
}

impl CommandContext {
    /// Context for one invocation.
    pub fn new(config: Config, json: bool) -> Self {
        Self { config, json }
    }

    /// Open the configured database and build the results service on it.
    pub async fn results_service(&self) -> Result<ResultsService> {
        let pool = initialize_database(&self.config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", self.config.database.path))?;
        let repo = Arc::new(SqliteTestHistoryRepository::new(pool));
        Ok(ResultsService::new(
            repo,
            self.config.analysis.clone(),
            SimilarityChecker::new(self.config.similarity),
        ))
    }
}

/// Identifies a suite.
#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    /// Organization name
    #[arg(long)]
    pub org: String,

    /// Project name
    #[arg(long)]
    pub project: String,

    /// Suite name
    #[arg(long)]
    pub suite: String,
}

/// Selects the most recent runs of a suite on a branch.
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Suite the runs belong to
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Branch name
    #[arg(long)]
    pub branch: String,

    /// Number of recent suite runs to look at (defaults to analysis.history_limit)
    #[arg(short, long)]
    pub limit: Option<u32>,
}

impl WindowArgs {
    /// Window over the selected runs, `default_limit` runs when `--limit` is unset.
    pub fn window(&self, default_limit: u32) -> SuiteRunWindow {
        SuiteRunWindow::new(
            self.suite.org.clone(),
            self.suite.project.clone(),
            self.suite.suite.clone(),
            self.branch.clone(),
            self.limit.unwrap_or(default_limit),
        )
    }
}

/// Where a failure is checked against.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckTargetArgs {
    /// Suite to check against (defaults to the failing test's own suite)
    #[arg(long, requires = "check_branch")]
    pub check_suite: Option<String>,

    /// Branch to check against; without it the failure is checked for regression
    #[arg(long)]
    pub check_branch: Option<String>,

    /// Number of suite runs to examine (defaults to analysis.default_depth)
    #[arg(short, long)]
    pub depth: Option<u32>,
}
