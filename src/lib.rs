//! testrecall - test result history and known-failure analysis
//!
//! Stores suite runs and per-test executions, and decides whether a failed
//! test has failed the same way before, either earlier on its own branch
//! (regression check) or on an upstream suite and branch.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the storage port
//! - **Service Layer** (`services`): similarity checks, history collection and failure analysis
//! - **Adapters** (`adapters`): SQLite storage
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use testrecall::services::FailureAnalyser;
//!
//! let analysis = FailureAnalyser::new(repo, failing).check_regression(16).await?;
//! println!("{}", analysis.verdict().as_str());
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    CheckMode, Config, FailureAnalysisSummary, Similarity, SuiteRun, TestCaseExecution, TestCaseIdentity,
    TestResult, Verdict,
};
pub use domain::ports::{SuiteRunKey, SuiteRunWindow, TestCaseQuery, TestHistoryRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BatchAnalyser, FailureAnalyser, FailureAnalysis, ResultsService, SimilarityChecker};
