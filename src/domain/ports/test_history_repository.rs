//! Storage port for test history and the selectors it accepts.

use std::fmt;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult};

/// Selects the most recent suite runs of one suite on one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteRunWindow {
    /// Organization
    pub org: String,
    /// Project
    pub project: String,
    /// Suite
    pub suite: String,
    /// Branch whose runs are selected
    pub branch: String,
    /// Maximum number of runs returned
    pub limit: u32,
    /// When set, only runs with `run_id < before_run_id` are eligible
    pub before_run_id: Option<i64>,
}

impl SuiteRunWindow {
    /// Window over the `limit` most recent runs of `suite` on `branch`.
    pub fn new(
        org: impl Into<String>,
        project: impl Into<String>,
        suite: impl Into<String>,
        branch: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            suite: suite.into(),
            branch: branch.into(),
            limit,
            before_run_id: None,
        }
    }

    /// Only runs older than `run_id`.
    pub fn before(mut self, run_id: i64) -> Self {
        self.before_run_id = Some(run_id);
        self
    }
}

/// Names a suite run by run id. Run ids are only unique per branch, so without a
/// branch the key may match runs on several branches.
///
/// # Examples
/// ```
/// use testrecall::SuiteRunKey;
///
/// let any_branch = SuiteRunKey::new("acme", "db", "ci", 57);
/// assert_eq!(any_branch.to_string(), "acme::db::ci@57");
///
/// let main = any_branch.on_branch("main");
/// assert_eq!(main.to_string(), "acme::db::ci[main]@57");
/// assert_eq!(main.clone().maybe_on_branch(None).branch, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteRunKey {
    /// Organization
    pub org: String,
    /// Project
    pub project: String,
    /// Suite
    pub suite: String,
    /// Run id, unique per suite and branch
    pub run_id: i64,
    /// Branch of the run; any branch when unset
    pub branch: Option<String>,
}

impl SuiteRunKey {
    /// Key matching run `run_id` of `suite` on any branch.
    pub fn new(org: impl Into<String>, project: impl Into<String>, suite: impl Into<String>, run_id: i64) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            suite: suite.into(),
            run_id,
            branch: None,
        }
    }

    /// Restrict the key to `branch`.
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Restrict the key to `branch` when one is given.
    pub fn maybe_on_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }
}

impl fmt::Display for SuiteRunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.org, self.project, self.suite)?;
        if let Some(branch) = &self.branch {
            write!(f, "[{branch}]")?;
        }
        write!(f, "@{}", self.run_id)
    }
}

/// Selects executions of a test inside a set of suite runs.
///
/// `package` is required. `class`, `case`, `config` and `result` narrow the match when
/// set; `config: None` matches every configuration of the case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestCaseQuery {
    /// Organization
    pub org: String,
    /// Project
    pub project: String,
    /// Suite
    pub suite: String,
    /// Any branch when unset
    pub branch: Option<String>,
    /// Suite runs to search
    pub run_ids: Vec<i64>,
    /// Test package
    pub package: String,
    /// Test class
    pub class: Option<String>,
    /// Test case
    pub case: Option<String>,
    /// Test configuration; all configurations when unset
    pub config: Option<String>,
    /// Only executions with this result
    pub result: Option<TestResult>,
}

impl TestCaseQuery {
    /// Query for every configuration of the test case `test` across `run_ids`.
    pub fn for_test_case(
        org: impl Into<String>,
        project: impl Into<String>,
        suite: impl Into<String>,
        branch: impl Into<String>,
        run_ids: Vec<i64>,
        test: &TestCaseIdentity,
    ) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            suite: suite.into(),
            branch: Some(branch.into()),
            run_ids,
            package: test.test_package.clone(),
            class: Some(test.test_class.clone()),
            case: Some(test.test_case.clone()),
            config: None,
            result: None,
        }
    }

    /// Only the given configuration.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Only executions with `result`.
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    /// `case` without `class` is ambiguous across classes.
    pub fn validate(&self) -> Result<(), String> {
        if self.package.is_empty() {
            return Err("test package is required".to_string());
        }
        if self.case.is_some() && self.class.is_none() {
            return Err("test class is required when test case is set".to_string());
        }
        Ok(())
    }
}

/// Repository interface for test result history.
///
/// The two windowed queries are the contract the failure analysis depends on; the
/// remaining operations populate and browse history. Implementations perform no
/// retries of their own beyond what the driver does.
#[async_trait]
pub trait TestHistoryRepository: Send + Sync {
    /// Insert or replace a suite run, keyed by org/project/suite/branch/run_id.
    async fn record_suite_run(&self, run: &SuiteRun) -> DomainResult<()>;

    /// Insert or replace a test case execution, keyed by suite run (branch included)
    /// and test identity.
    async fn record_test_case_execution(&self, execution: &TestCaseExecution) -> DomainResult<()>;

    /// Suite runs matching `key`, ordered by branch. At most one when `key.branch` is set.
    async fn suite_runs_with_id(&self, key: &SuiteRunKey) -> DomainResult<Vec<SuiteRun>>;

    /// Most recent suite runs of the window, ordered by `run_id` descending and
    /// bounded by `window.limit`.
    async fn suite_runs_in_window(&self, window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>>;

    /// Executions matching `query`, restricted to `query.run_ids`.
    async fn test_case_executions(&self, query: &TestCaseQuery) -> DomainResult<Vec<TestCaseExecution>>;

    /// Failed executions of the given suite runs.
    async fn failed_tests_for_suite_runs(&self, runs: &[SuiteRun]) -> DomainResult<Vec<TestCaseExecution>>;
}
