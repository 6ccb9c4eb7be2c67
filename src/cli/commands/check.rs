//! Implementation of the `testrecall check` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::commands::{CheckTargetArgs, CommandContext, SuiteArgs};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{FailureAnalysisSummary, TestCaseIdentity};
use crate::services::CheckRequest;

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Suite of the failing run
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Run id of the suite run holding the failure
    #[arg(long)]
    pub run_id: i64,

    /// Branch of that suite run, when the run id exists on several branches
    #[arg(long)]
    pub branch: Option<String>,

    /// Test package
    #[arg(long)]
    pub package: String,

    /// Test class
    #[arg(long)]
    pub class: String,

    /// Test case
    #[arg(long)]
    pub case: String,

    /// Test configuration
    #[arg(long, default_value = "")]
    pub test_config: String,

    /// What to check against
    #[command(flatten)]
    pub target: CheckTargetArgs,
}

impl CheckArgs {
    /// The service request these arguments describe.
    pub fn request(&self) -> CheckRequest {
        CheckRequest {
            org: self.suite.org.clone(),
            project: self.suite.project.clone(),
            suite: self.suite.suite.clone(),
            run_id: self.run_id,
            branch: self.branch.clone(),
            test: TestCaseIdentity::new(&self.package, &self.class, &self.case).with_config(&self.test_config),
            check_suite: self.target.check_suite.clone(),
            check_branch: self.target.check_branch.clone(),
            depth: self.target.depth,
        }
    }
}

/// Human rendering of one analysis, shared with `check-run`.
pub fn render_summary(summary: &FailureAnalysisSummary) -> String {
    let counts = &summary.summary;
    let mut lines = vec![
        format!(
            "{} [{}]: {}",
            summary.test_case.test_case_str(),
            summary.mode,
            summary.verdict.as_str().to_uppercase()
        ),
        format!(
            "  checked {} run(s): {} pass, {} skip, {} same failure, {} other failure ({} inconclusive)",
            counts.num_runs,
            counts.num_pass,
            counts.num_skip,
            counts.num_same_fail,
            counts.num_diff_fail,
            counts.num_unknown_fail
        ),
    ];
    for similar in &summary.similar_failures {
        let commit = similar
            .suite_run
            .as_ref()
            .and_then(|run| run.commit.as_deref())
            .unwrap_or("-");
        lines.push(format!(
            "  similar: {}::{} run {} (commit {})",
            similar.test_run.suite, similar.test_run.branch, similar.test_run.run_id, commit
        ));
    }
    if !summary.message.is_empty() {
        lines.extend(summary.message.lines().map(|line| format!("  > {line}")));
    }
    lines.join("\n")
}

impl CommandOutput for FailureAnalysisSummary {
    fn to_human(&self) -> String {
        render_summary(self)
    }
}

/// Check whether a failed test is a known failure.
pub async fn execute(args: CheckArgs, ctx: &CommandContext) -> Result<()> {
    let request = args.request();
    let service = ctx.results_service().await?;
    let summary = service
        .check(&request)
        .await
        .with_context(|| format!("Failed to check {}", request.test))?;
    output(&summary, ctx.json);
    Ok(())
}
