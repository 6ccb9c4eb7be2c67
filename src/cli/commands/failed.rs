//! Implementation of the `testrecall failed` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::commands::history::render_test_runs;
use crate::cli::commands::{CommandContext, WindowArgs};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::TestRunWithSuite;

/// Arguments for `failed`.
#[derive(Args, Debug)]
pub struct FailedArgs {
    /// Suite runs to look at
    #[command(flatten)]
    pub window: WindowArgs,
}

/// Failures listed by `failed`.
#[derive(Debug, Serialize)]
pub struct FailedOutput {
    /// Newest first
    pub failed_tests: Vec<TestRunWithSuite>,
}

impl CommandOutput for FailedOutput {
    fn to_human(&self) -> String {
        render_test_runs(&self.failed_tests)
    }
}

/// List failed tests in a branch's recent runs.
pub async fn execute(args: FailedArgs, ctx: &CommandContext) -> Result<()> {
    let window = args.window.window(ctx.config.analysis.history_limit);
    let service = ctx.results_service().await?;
    let failed_tests = service
        .failed_tests(&window)
        .await
        .context("Failed to list failed tests")?;
    output(&FailedOutput { failed_tests }, ctx.json);
    Ok(())
}
