//! Domain models: suite runs, test case executions, imports, analyses and config.

pub mod analysis;
pub mod config;
pub mod import;
pub mod results;

pub use analysis::{
    AnalysisCounts, CheckMode, FailureAnalysisRequest, FailureAnalysisSummary, Similarity,
    Verdict, MAX_ANALYSIS_DEPTH,
};
pub use config::{AnalysisConfig, Config, DatabaseConfig, LoggingConfig, SimilarityThresholds};
pub use import::{ImportDocument, ImportedTestRun};
pub use results::{
    SuiteRun, SuiteRunStatus, TestCaseExecution, TestCaseIdentity, TestResult, TestRunWithSuite,
};
