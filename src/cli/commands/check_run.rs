//! Implementation of the `testrecall check-run` command.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::commands::check::render_summary;
use crate::cli::commands::{CheckTargetArgs, CommandContext, SuiteArgs};
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{CheckMode, FailureAnalysisSummary};
use crate::domain::ports::SuiteRunKey;

/// Arguments for `check-run`.
#[derive(Args, Debug)]
pub struct CheckRunArgs {
    /// Suite of the run to check
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Run id of the suite run to check
    #[arg(long)]
    pub run_id: i64,

    /// Branch of that suite run, when the run id exists on several branches
    #[arg(long)]
    pub branch: Option<String>,

    /// What to check against
    #[command(flatten)]
    pub target: CheckTargetArgs,

    /// Print every analysis in full instead of a table
    #[arg(long)]
    pub details: bool,
}

impl CheckRunArgs {
    /// The suite run to check.
    pub fn suite_run_key(&self) -> SuiteRunKey {
        SuiteRunKey::new(&self.suite.org, &self.suite.project, &self.suite.suite, self.run_id)
            .maybe_on_branch(self.branch.clone())
    }

    /// Regression check unless `--check-branch` is given.
    pub fn mode(&self) -> CheckMode {
        match &self.target.check_branch {
            Some(branch) => CheckMode::Upstream {
                suite: self
                    .target
                    .check_suite
                    .clone()
                    .unwrap_or_else(|| self.suite.suite.clone()),
                branch: branch.clone(),
            },
            None => CheckMode::Regression,
        }
    }
}

/// Analyses produced by `check-run`.
#[derive(Debug, Serialize)]
pub struct CheckRunOutput {
    /// One per failed test
    pub analyses: Vec<FailureAnalysisSummary>,
    /// Print in full instead of a table
    #[serde(skip)]
    pub details: bool,
}

impl CommandOutput for CheckRunOutput {
    fn to_human(&self) -> String {
        if self.details {
            if self.analyses.is_empty() {
                return "No failed tests in this suite run.".to_string();
            }
            return self
                .analyses
                .iter()
                .map(render_summary)
                .collect::<Vec<_>>()
                .join("\n\n");
        }

        let mut table = list_table(&["test", "verdict", "runs", "same", "other", "pass"]);
        for analysis in &self.analyses {
            let counts = &analysis.summary;
            table.add_row(vec![
                Cell::new(truncate(&analysis.test_case.test_case_str(), 70)),
                Cell::new(analysis.verdict.as_str()),
                Cell::new(counts.num_runs),
                Cell::new(counts.num_same_fail),
                Cell::new(counts.num_diff_fail),
                Cell::new(counts.num_pass),
            ]);
        }
        render_list("failed test", &table, self.analyses.len())
    }
}

/// Check every failed test of a suite run.
pub async fn execute(args: CheckRunArgs, ctx: &CommandContext) -> Result<()> {
    let mode = args.mode();
    let service = ctx.results_service().await?;
    let analyses = service
        .check_run(&args.suite_run_key(), &mode, args.target.depth)
        .await
        .with_context(|| format!("Failed to check suite run {}", args.run_id))?;
    output(
        &CheckRunOutput {
            analyses,
            details: args.details,
        },
        ctx.json,
    );
    Ok(())
}
