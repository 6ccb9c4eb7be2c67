//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{
    check::CheckArgs, check_run::CheckRunArgs, failed::FailedArgs, history::HistoryArgs, import::ImportArgs,
    init::InitArgs, runs::RunsArgs,
};

/// Command line of the `testrecall` binary.
#[derive(Parser, Debug)]
#[command(name = "testrecall")]
#[command(about = "testrecall - test result history and known-failure analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Extra configuration file, merged over .testrecall/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .testrecall/ with a default config and an empty database
    Init(InitArgs),

    /// Import a suite run and its test results from a JSON document
    Import(ImportArgs),

    /// List the most recent suite runs of a branch
    Runs(RunsArgs),

    /// Show the history of a test across a branch's recent runs
    History(HistoryArgs),

    /// List failed tests in a branch's recent runs
    Failed(FailedArgs),

    /// Check whether a failed test is a known failure
    Check(CheckArgs),

    /// Check every failed test of a suite run
    CheckRun(CheckRunArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_with_globals() {
        let cli = Cli::try_parse_from([
            "testrecall",
            "check",
            "--org",
            "acme",
            "--project",
            "db",
            "--suite",
            "ci",
            "--run-id",
            "57",
            "--package",
            "org.acme",
            "--class",
            "StorageTest",
            "--case",
            "flush",
            "--branch",
            "feature/x",
            "--check-branch",
            "main",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.run_id, 57);
                assert_eq!(args.branch.as_deref(), Some("feature/x"));
                assert_eq!(args.target.check_branch.as_deref(), Some("main"));
                assert_eq!(args.test_config, "");
                assert!(args.target.depth.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_check_suite_requires_check_branch() {
        let result = Cli::try_parse_from([
            "testrecall",
            "check",
            "--org",
            "acme",
            "--project",
            "db",
            "--suite",
            "ci",
            "--run-id",
            "57",
            "--package",
            "p",
            "--class",
            "C",
            "--case",
            "t",
            "--check-suite",
            "nightly",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_case_requires_class() {
        let result = Cli::try_parse_from([
            "testrecall",
            "history",
            "--org",
            "acme",
            "--project",
            "db",
            "--suite",
            "ci",
            "--branch",
            "main",
            "--package",
            "p",
            "--case",
            "t",
        ]);
        assert!(result.is_err());
    }
}
