//! Implementation of the `testrecall history` command.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::{CommandContext, WindowArgs};
use crate::cli::output::{first_line, list_table, output, render_list, CommandOutput};
use crate::domain::models::{TestResult, TestRunWithSuite};
use crate::services::TestFilter;

/// Arguments for `history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Suite runs to look at
    #[command(flatten)]
    pub window: WindowArgs,

    /// Test package
    #[arg(long)]
    pub package: String,

    /// Test class
    #[arg(long)]
    pub class: Option<String>,

    /// Test case
    #[arg(long, requires = "class")]
    pub case: Option<String>,

    /// Test configuration
    #[arg(long)]
    pub test_config: Option<String>,

    /// Only show results of this kind (pass, fail, skip)
    #[arg(long)]
    pub result: Option<String>,
}

/// Executions found by `history`.
#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    /// Newest first
    pub test_runs: Vec<TestRunWithSuite>,
}

/// Table of executions shared by `history` and `failed`.
pub fn render_test_runs(test_runs: &[TestRunWithSuite]) -> String {
    let mut table = list_table(&["run", "test", "config", "result", "error"]);
    for item in test_runs {
        let run = &item.test_run;
        table.add_row(vec![
            Cell::new(run.run_id),
            Cell::new(format!("{}::{}::{}", run.test_package, run.test_class, run.test_case)),
            Cell::new(if run.test_config.is_empty() { "-" } else { run.test_config.as_str() }),
            Cell::new(run.result.as_str()),
            Cell::new(first_line(run.error_details.as_deref(), 60)),
        ]);
    }
    render_list("test run", &table, test_runs.len())
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        render_test_runs(&self.test_runs)
    }
}

/// Print the history of a test across a branch's recent runs.
pub async fn execute(args: HistoryArgs, ctx: &CommandContext) -> Result<()> {
    let result = args
        .result
        .as_deref()
        .map(|r| TestResult::from_str(r).ok_or_else(|| anyhow!("Unknown test result: {r}")))
        .transpose()?;
    let window = args.window.window(ctx.config.analysis.history_limit);
    let filter = TestFilter {
        package: args.package,
        class: args.class,
        case: args.case,
        config: args.test_config,
        result,
    };

    let service = ctx.results_service().await?;
    let test_runs = service
        .test_history(&window, filter)
        .await
        .context("Failed to load test history")?;
    output(&HistoryOutput { test_runs }, ctx.json);
    Ok(())
}
