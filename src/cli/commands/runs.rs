//! Implementation of the `testrecall runs` command.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::{CommandContext, WindowArgs};
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::SuiteRun;

/// Arguments for `runs`.
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Suite runs to list
    #[command(flatten)]
    pub window: WindowArgs,
}

/// Suite runs listed by `runs`.
#[derive(Debug, Serialize)]
pub struct RunsOutput {
    /// Newest first
    pub suite_runs: Vec<SuiteRun>,
}

impl CommandOutput for RunsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["run", "status", "pass", "fail", "skip", "total", "time", "commit"]);
        for run in &self.suite_runs {
            table.add_row(vec![
                Cell::new(run.run_id),
                Cell::new(run.status.as_str()),
                Cell::new(run.pass_count),
                Cell::new(run.fail_count),
                Cell::new(run.skip_count),
                Cell::new(run.total_tests()),
                Cell::new(
                    run.tstamp
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Cell::new(run.commit.as_deref().unwrap_or("-")),
            ]);
        }
        render_list("suite run", &table, self.suite_runs.len())
    }
}

/// List the most recent suite runs of a branch.
pub async fn execute(args: RunsArgs, ctx: &CommandContext) -> Result<()> {
    let window = args.window.window(ctx.config.analysis.history_limit);
    let service = ctx.results_service().await?;
    let suite_runs = service
        .suite_runs(&window)
        .await
        .context("Failed to list suite runs")?;
    output(&RunsOutput { suite_runs }, ctx.json);
    Ok(())
}
