//! Import document format.
//!
//! One document carries a suite run and the test case results it produced:
//!
//! ```json
//! {
//!   "suite_run": { "org": "acme", "project": "db", "suite": "ci", "branch": "main", "run_id": 57 },
//!   "test_runs": [
//!     { "test_package": "org.acme", "test_class": "StorageTest", "test_case": "flush",
//!       "result": "FAIL", "error_details": "...", "error_stacktrace": "..." }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::results::{SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult};

/// A test case result inside an [`ImportDocument`]; the suite run supplies the rest of
/// its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedTestRun {
    /// Package, class, case and config
    #[serde(flatten)]
    pub test: TestCaseIdentity,
    /// Pass, fail or skip
    pub result: TestResult,
    /// Free-form grouping reported by the runner
    #[serde(default)]
    pub test_group: Option<String>,
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

/// A suite run with its test case results, as accepted by `import`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDocument {
    /// The suite run; counts are recomputed from `test_runs`
    pub suite_run: SuiteRun,
    /// Its test case results
    #[serde(default)]
    pub test_runs: Vec<ImportedTestRun>,
}

impl ImportDocument {
    /// Validate identity fields before anything is written.
    pub fn validate(&self) -> Result<(), String> {
        let run = &self.suite_run;
        for (field, value) in [
            ("org", &run.org),
            ("project", &run.project),
            ("suite", &run.suite),
            ("branch", &run.branch),
        ] {
            if value.trim().is_empty() {
                return Err(format!("suite_run.{field} cannot be empty"));
            }
        }
        if let Some(index) = self
            .test_runs
            .iter()
            .position(|t| t.test.test_package.is_empty() || t.test.test_case.is_empty())
        {
            return Err(format!("test_runs[{index}] needs test_package and test_case"));
        }
        Ok(())
    }

    /// The suite run, with counts derived from the test runs when none were given.
    pub fn suite_run_with_counts(&self) -> SuiteRun {
        let mut run = self.suite_run.clone();
        let has_counts = run.pass_count + run.fail_count + run.skip_count > 0 || run.total_count.is_some();
        if !has_counts && !self.test_runs.is_empty() {
            let count = |result: TestResult| {
                u32::try_from(self.test_runs.iter().filter(|t| t.result == result).count()).unwrap_or(u32::MAX)
            };
            run.pass_count = count(TestResult::Pass);
            run.fail_count = count(TestResult::Fail);
            run.skip_count = count(TestResult::Skip);
        }
        run
    }

    /// Test case executions belonging to the document's suite run.
    pub fn executions(&self) -> Vec<TestCaseExecution> {
        self.test_runs
            .iter()
            .map(|t| {
                let mut execution = TestCaseExecution::new(&self.suite_run, t.test.clone(), t.result);
                execution.test_group.clone_from(&t.test_group);
                execution.tstamp = self.suite_run.tstamp;
                execution.duration_ms = t.duration_ms;
                execution.error_details.clone_from(&t.error_details);
                execution.error_stacktrace.clone_from(&t.error_stacktrace);
                execution.stdout.clone_from(&t.stdout);
                execution.stderr.clone_from(&t.stderr);
                execution.skip_details.clone_from(&t.skip_details);
                execution
            })
            .collect()
    }
}
