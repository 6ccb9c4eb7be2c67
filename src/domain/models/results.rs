//! Test result domain models.
//!
//! A [`SuiteRun`] is one build of a named suite on a branch (for example CI build 57
//! of `main`). A [`TestCaseExecution`] is the outcome of a single test case inside one
//! suite run. Both are immutable once imported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    /// Passed
    Pass,
    /// Failed
    Fail,
    /// Skipped
    Skip,
}

impl TestResult {
    /// Upper-case name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }

    /// Parse a stored or imported result; `PASSED` and friends are accepted.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PASS" | "PASSED" => Some(Self::Pass),
            "FAIL" | "FAILED" => Some(Self::Fail),
            "SKIP" | "SKIPPED" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CI-provided status of a suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuiteRunStatus {
    /// All tests passed
    Success,
    /// Some tests failed
    #[default]
    Failure,
    /// The run hit an error; results may not be analysable
    Error,
    /// Still running; counts may be partial
    InProgress,
}

impl SuiteRunStatus {
    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Error => "ERROR",
            Self::InProgress => "IN_PROGRESS",
        }
    }

    /// Parse a stored status, ignoring case.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            "ERROR" => Some(Self::Error),
            "IN_PROGRESS" => Some(Self::InProgress),
            _ => None,
        }
    }
}

/// One execution (build) of a suite on a branch.
///
/// `run_id` is strictly increasing per suite and branch and is the only recency
/// signal used by the analysis. `tstamp` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRun {
    /// Organization
    pub org: String,
    /// Project within the organization
    pub project: String,
    /// Suite name, e.g. `ci` or `nightly`
    pub suite: String,
    /// Branch the suite ran on
    pub branch: String,
    /// Build number, increasing per suite and branch
    pub run_id: i64,
    /// When the run started
    #[serde(default)]
    pub tstamp: Option<DateTime<Utc>>,
    /// Commit under test
    #[serde(default)]
    pub commit: Option<String>,
    /// Link to the CI build
    #[serde(default)]
    pub url: Option<String>,
    /// Passed tests
    #[serde(default)]
    pub pass_count: u32,
    /// Failed tests
    #[serde(default)]
    pub fail_count: u32,
    /// Skipped tests
    #[serde(default)]
    pub skip_count: u32,
    /// Total reported by CI, when it differs from the sum of counts
    #[serde(default)]
    pub total_count: Option<u32>,
    /// Wall time of the run
    #[serde(default)]
    pub duration_sec: Option<u32>,
    /// Status reported by CI
    #[serde(default)]
    pub status: SuiteRunStatus,
    /// Imported but not to be trusted for analysis
    #[serde(default)]
    pub ignore: bool,
    /// Why the run is ignored
    #[serde(default)]
    pub ignore_details: Option<String>,
}

impl SuiteRun {
    /// A suite run with no counts and the default status.
    pub fn new(
        org: impl Into<String>,
        project: impl Into<String>,
        suite: impl Into<String>,
        branch: impl Into<String>,
        run_id: i64,
    ) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            suite: suite.into(),
            branch: branch.into(),
            run_id,
            tstamp: None,
            commit: None,
            url: None,
            pass_count: 0,
            fail_count: 0,
            skip_count: 0,
            total_count: None,
            duration_sec: None,
            status: SuiteRunStatus::default(),
            ignore: false,
            ignore_details: None,
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: SuiteRunStatus) -> Self {
        self.status = status;
        self
    }

    /// Set pass, fail and skip counts.
    pub fn with_counts(mut self, pass: u32, fail: u32, skip: u32) -> Self {
        self.pass_count = pass;
        self.fail_count = fail;
        self.skip_count = skip;
        self
    }

    /// Set the start time.
    pub fn with_timestamp(mut self, tstamp: DateTime<Utc>) -> Self {
        self.tstamp = Some(tstamp);
        self
    }

    /// Set the commit under test.
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Mark the run as not to be used for analysis.
    pub fn ignored(mut self, details: impl Into<String>) -> Self {
        self.ignore = true;
        self.ignore_details = Some(details.into());
        self
    }

    /// Total number of tests, falling back to the sum of the per-result counts.
    pub fn total_tests(&self) -> u32 {
        self.total_count
            .unwrap_or(self.pass_count + self.fail_count + self.skip_count)
    }

    /// `org::project::suite`
    pub fn test_suite_str(&self) -> String {
        format!("{}::{}::{}", self.org, self.project, self.suite)
    }
}

impl fmt::Display for SuiteRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.test_suite_str(), self.run_id)
    }
}

/// The package/class/case/config coordinates of a test, independent of any run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TestCaseIdentity {
    /// Package, or module, holding the test
    pub test_package: String,
    /// Test class
    pub test_class: String,
    /// Test case name
    pub test_case: String,
    /// Disambiguates parametrized or repeated cases; empty when unused
    #[serde(default)]
    pub test_config: String,
}

impl TestCaseIdentity {
    /// Identity with an empty configuration.
    pub fn new(
        test_package: impl Into<String>,
        test_class: impl Into<String>,
        test_case: impl Into<String>,
    ) -> Self {
        Self {
            test_package: test_package.into(),
            test_class: test_class.into(),
            test_case: test_case.into(),
            test_config: String::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.test_config = config.into();
        self
    }
}

impl fmt::Display for TestCaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.test_package, self.test_class, self.test_case)?;
        if !self.test_config.is_empty() {
            write!(f, "::{}", self.test_config)?;
        }
        Ok(())
    }
}

/// Result of one test case within one suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseExecution {
    /// Organization
    pub org: String,
    /// Project
    pub project: String,
    /// Suite
    pub suite: String,
    /// Branch of the suite run
    pub branch: String,
    /// Run id of the suite run
    pub run_id: i64,
    /// Test package
    pub test_package: String,
    /// Test class
    pub test_class: String,
    /// Test case
    pub test_case: String,
    /// Configuration; empty when unused
    #[serde(default)]
    pub test_config: String,
    /// Pass, fail or skip
    pub result: TestResult,
    /// Free-form grouping reported by the runner
    #[serde(default)]
    pub test_group: Option<String>,
    /// When the test ran
    #[serde(default)]
    pub tstamp: Option<DateTime<Utc>>,
    /// Test duration
    #[serde(default)]
    pub duration_ms: Option<i64>,
    /// Failure message
    #[serde(default)]
    pub error_details: Option<String>,
    /// Failure stack trace
    #[serde(default)]
    pub error_stacktrace: Option<String>,
    /// Captured standard output
    #[serde(default)]
    pub stdout: Option<String>,
    /// Captured standard error
    #[serde(default)]
    pub stderr: Option<String>,
    /// Why the test was skipped
    #[serde(default)]
    pub skip_details: Option<String>,
}

impl TestCaseExecution {
    /// Create an execution of `test` inside `suite_run`.
    pub fn new(suite_run: &SuiteRun, test: TestCaseIdentity, result: TestResult) -> Self {
        Self {
            org: suite_run.org.clone(),
            project: suite_run.project.clone(),
            suite: suite_run.suite.clone(),
            branch: suite_run.branch.clone(),
            run_id: suite_run.run_id,
            test_package: test.test_package,
            test_class: test.test_class,
            test_case: test.test_case,
            test_config: test.test_config,
            result,
            test_group: None,
            tstamp: None,
            duration_ms: None,
            error_details: None,
            error_stacktrace: None,
            stdout: None,
            stderr: None,
            skip_details: None,
        }
    }

    /// Set the failure message.
    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }

    /// Set the failure stack trace.
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.error_stacktrace = Some(stacktrace.into());
        self
    }

    /// Set the captured standard output.
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    /// Set the captured standard error.
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// Set the duration.
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Package, class, case and config of this execution.
    pub fn identity(&self) -> TestCaseIdentity {
        TestCaseIdentity {
            test_package: self.test_package.clone(),
            test_class: self.test_class.clone(),
            test_case: self.test_case.clone(),
            test_config: self.test_config.clone(),
        }
    }

    /// Whether the test failed.
    pub fn is_failure(&self) -> bool {
        self.result == TestResult::Fail
    }

    /// Same package and class.
    pub fn is_same_test_suite(&self, other: &Self) -> bool {
        self.test_package == other.test_package && self.test_class == other.test_class
    }

    /// Same package, class and case; configs may differ.
    pub fn is_same_test_case(&self, other: &Self) -> bool {
        self.test_case == other.test_case && self.is_same_test_suite(other)
    }

    /// Same package, class, case and config.
    pub fn is_same_test_case_and_config(&self, other: &Self) -> bool {
        self.test_config == other.test_config && self.is_same_test_case(other)
    }

    /// Whether this execution belongs to the given suite run.
    pub fn belongs_to(&self, run: &SuiteRun) -> bool {
        self.org == run.org
            && self.project == run.project
            && self.suite == run.suite
            && self.branch == run.branch
            && self.run_id == run.run_id
    }

    /// Same test case, config and suite run.
    pub fn is_same_execution(&self, other: &Self) -> bool {
        self.org == other.org
            && self.project == other.project
            && self.suite == other.suite
            && self.branch == other.branch
            && self.run_id == other.run_id
            && self.is_same_test_case_and_config(other)
    }

    /// `org::project::suite`
    pub fn test_suite_str(&self) -> String {
        format!("{}::{}::{}", self.org, self.project, self.suite)
    }

    /// `org::project::suite::package::class::case[::config]`
    pub fn test_case_str(&self) -> String {
        format!("{}::{}", self.test_suite_str(), self.identity())
    }
}

impl fmt::Display for TestCaseExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.test_case_str(), self.run_id)
    }
}

/// A test case execution paired with the suite run it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunWithSuite {
    /// The execution
    pub test_run: TestCaseExecution,
    /// Its suite run, when it was in the window
    pub suite_run: Option<SuiteRun>,
}

impl TestRunWithSuite {
    /// Pair every execution with its suite run from `suite_runs`, when present.
    pub fn combine(test_runs: &[TestCaseExecution], suite_runs: &[SuiteRun]) -> Vec<Self> {
        test_runs
            .iter()
            .map(|test_run| Self {
                test_run: test_run.clone(),
                suite_run: suite_runs
                    .iter()
                    .find(|run| test_run.belongs_to(run))
                    .cloned(),
            })
            .collect()
    }
}
