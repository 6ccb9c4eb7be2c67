//! Implementation of the `testrecall import` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::cli::commands::CommandContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ImportDocument;
use crate::services::ImportOutcome;

/// Arguments for `import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON document with `suite_run` and `test_runs`; `-` reads stdin
    pub file: PathBuf,
}

impl CommandOutput for ImportOutcome {
    fn to_human(&self) -> String {
        let run = &self.suite_run;
        format!(
            "Imported {} on {} with {} test result(s) (pass {}, fail {}, skip {})",
            run,
            run.branch,
            self.test_runs,
            run.pass_count,
            run.fail_count,
            run.skip_count
        )
    }
}

/// Import a suite run document into the database.
pub async fn execute(args: ImportArgs, ctx: &CommandContext) -> Result<()> {
    let raw = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&args.file)
            .await
            .with_context(|| format!("Failed to read {}", args.file.display()))?
    };
    let document: ImportDocument = serde_json::from_str(&raw).context("Invalid import document")?;

    let service = ctx.results_service().await?;
    let outcome = service.import(&document).await.context("Import failed")?;
    output(&outcome, ctx.json);
    Ok(())
}
