//! Application use cases over stored test history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::errors::{AnalysisError, AnalysisResult, DomainError, DomainResult};
use crate::domain::models::{
    AnalysisConfig, CheckMode, FailureAnalysisRequest, FailureAnalysisSummary, ImportDocument,
    SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult, TestRunWithSuite,
};
use crate::domain::ports::{SuiteRunKey, SuiteRunWindow, TestCaseQuery, TestHistoryRepository};
use crate::services::batch_analyser::BatchAnalyser;
use crate::services::failure_analyser::{validate_request, FailureAnalyser};
use crate::services::history_collector::HistoryWindowCollector;
use crate::services::similarity_checker::SimilarityChecker;

/// Narrows a test history query. `package` is required; `class` is required when
/// `case` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    /// Test package; must not be empty
    pub package: String,
    /// Test class; required when `case` is set
    pub class: Option<String>,
    /// Test case name
    pub case: Option<String>,
    /// Test configuration; every configuration when unset
    pub config: Option<String>,
    /// Only executions with this result
    pub result: Option<TestResult>,
}

/// Identifies a failed execution and what to check it against.
///
/// Without `check_branch` the failure is checked for regression on its own branch.
/// With `check_branch` it is checked against that branch of `check_suite`, or of its
/// own suite when `check_suite` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Organization of the failing suite run
    pub org: String,
    /// Project of the failing suite run
    pub project: String,
    /// Suite of the failing suite run
    pub suite: String,
    /// Run id of the failing suite run
    pub run_id: i64,
    /// Branch of the failing run; needed when `run_id` exists on several branches
    #[serde(default)]
    pub branch: Option<String>,
    /// The failed test
    #[serde(flatten)]
    pub test: TestCaseIdentity,
    /// Suite to check against; requires `check_branch`
    #[serde(default)]
    pub check_suite: Option<String>,
    /// Branch to check against; regression check when unset
    #[serde(default)]
    pub check_branch: Option<String>,
    /// Suite runs to examine; the configured default when unset
    #[serde(default)]
    pub depth: Option<u32>,
}

impl CheckRequest {
    /// The suite run holding the failure.
    pub fn suite_run_key(&self) -> SuiteRunKey {
        SuiteRunKey::new(&self.org, &self.project, &self.suite, self.run_id).maybe_on_branch(self.branch.clone())
    }

    /// Resolve the check mode, given the failing execution's own suite.
    pub fn mode(&self) -> AnalysisResult<CheckMode> {
        match (&self.check_suite, &self.check_branch) {
            (Some(_), None) => Err(AnalysisError::InvalidTarget(
                "check_suite requires check_branch".to_string(),
            )),
            (suite, Some(branch)) => Ok(CheckMode::Upstream {
                suite: suite.clone().unwrap_or_else(|| self.suite.clone()),
                branch: branch.clone(),
            }),
            (None, None) => Ok(CheckMode::Regression),
        }
    }
}

/// What an import stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// The stored suite run, counts filled in from its test runs
    pub suite_run: SuiteRun,
    /// Number of test case results stored
    pub test_runs: usize,
}

/// Use cases over stored test history: import, browsing and failure checks.
pub struct ResultsService {
    repo: Arc<dyn TestHistoryRepository>,
    collector: HistoryWindowCollector,
    analysis: AnalysisConfig,
    checker: SimilarityChecker,
}

impl ResultsService {
    /// Service over `repo`, analysing with `analysis` limits and `checker` thresholds.
    pub fn new(repo: Arc<dyn TestHistoryRepository>, analysis: AnalysisConfig, checker: SimilarityChecker) -> Self {
        Self {
            collector: HistoryWindowCollector::new(Arc::clone(&repo)),
            repo,
            analysis,
            checker,
        }
    }

    /// Store a suite run and its test case results, replacing any earlier import of
    /// the same identities.
    #[instrument(skip(self, document), fields(run = %document.suite_run), err)]
    pub async fn import(&self, document: &ImportDocument) -> DomainResult<ImportOutcome> {
        document.validate().map_err(DomainError::ValidationFailed)?;

        let suite_run = document.suite_run_with_counts();
        self.repo.record_suite_run(&suite_run).await?;
        let executions = document.executions();
        for execution in &executions {
            self.repo.record_test_case_execution(execution).await?;
        }

        info!(test_runs = executions.len(), "Imported suite run");
        Ok(ImportOutcome {
            suite_run,
            test_runs: executions.len(),
        })
    }

    /// The single suite run named by `key`.
    pub async fn get_suite_run(&self, key: &SuiteRunKey) -> DomainResult<SuiteRun> {
        let mut runs = self.repo.suite_runs_with_id(key).await?;
        match runs.len() {
            0 => Err(DomainError::SuiteRunNotFound {
                suite: format!("{}::{}::{}", key.org, key.project, key.suite),
                run_id: key.run_id,
            }),
            1 => Ok(runs.remove(0)),
            _ => Err(DomainError::AmbiguousSuiteRun {
                key: key.to_string(),
                branches: runs.iter().map(|run| run.branch.as_str()).collect::<Vec<_>>().join(", "),
            }),
        }
    }

    /// Most recent suite runs of a branch, newest first.
    pub async fn suite_runs(&self, window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>> {
        self.collector.suite_runs_in_window(window).await
    }

    /// Executions of a test across the window, each with its suite run.
    #[instrument(skip(self, filter), fields(package = %filter.package), err)]
    pub async fn test_history(&self, window: &SuiteRunWindow, filter: TestFilter) -> DomainResult<Vec<TestRunWithSuite>> {
        let mut query = TestCaseQuery {
            org: window.org.clone(),
            project: window.project.clone(),
            suite: window.suite.clone(),
            branch: Some(window.branch.clone()),
            run_ids: Vec::new(),
            package: filter.package,
            class: filter.class,
            case: filter.case,
            config: filter.config,
            result: filter.result,
        };
        query.validate().map_err(DomainError::ValidationFailed)?;

        let runs = self.collector.suite_runs_in_window(window).await?;
        query.run_ids = runs.iter().map(|run| run.run_id).collect();
        let mut executions = self.collector.test_case_executions(&query).await?;
        sort_newest_first(&mut executions);
        Ok(TestRunWithSuite::combine(&executions, &runs))
    }

    /// Failed executions across the window, each with its suite run.
    pub async fn failed_tests(&self, window: &SuiteRunWindow) -> DomainResult<Vec<TestRunWithSuite>> {
        let runs = self.collector.suite_runs_in_window(window).await?;
        if runs.is_empty() {
            return Ok(Vec::new());
        }
        let mut failures = self.repo.failed_tests_for_suite_runs(&runs).await?;
        sort_newest_first(&mut failures);
        Ok(TestRunWithSuite::combine(&failures, &runs))
    }

    /// The single execution of `test` in the suite run named by `key`.
    pub async fn find_execution(&self, key: &SuiteRunKey, test: &TestCaseIdentity) -> DomainResult<TestCaseExecution> {
        let query = TestCaseQuery {
            org: key.org.clone(),
            project: key.project.clone(),
            suite: key.suite.clone(),
            branch: key.branch.clone(),
            run_ids: vec![key.run_id],
            package: test.test_package.clone(),
            class: Some(test.test_class.clone()),
            case: Some(test.test_case.clone()),
            config: Some(test.test_config.clone()),
            result: None,
        };
        let mut executions = self.collector.test_case_executions(&query).await?;
        let identity = format!("{key}::{test}");
        match executions.len() {
            0 => Err(DomainError::TestCaseExecutionNotFound(identity)),
            1 => Ok(executions.remove(0)),
            count => Err(DomainError::AmbiguousTestCaseExecution { identity, count }),
        }
    }

    /// Check whether the requested failure is known.
    #[instrument(skip(self, request), fields(test = %request.test, run_id = request.run_id), err)]
    pub async fn check(&self, request: &CheckRequest) -> AnalysisResult<FailureAnalysisSummary> {
        let mode = request.mode()?;
        let depth = request.depth.unwrap_or(self.analysis.default_depth);
        validate_request(&mode, depth, self.analysis.max_depth)?;

        let failing = self
            .find_execution(&request.suite_run_key(), &request.test)
            .await?;
        self.analyse(FailureAnalysisRequest { failing, mode, depth }).await
    }

    /// Analyse a failed execution that need not be stored itself.
    pub async fn analyse(&self, request: FailureAnalysisRequest) -> AnalysisResult<FailureAnalysisSummary> {
        if !request.failing.is_failure() {
            warn!(result = %request.failing.result, "Checking a test execution that did not fail");
        }
        let analysis = FailureAnalyser::with_collector(self.collector.clone(), request.failing)
            .with_checker(self.checker)
            .with_max_depth(self.analysis.max_depth)
            .run(&request.mode, request.depth)
            .await?;
        Ok(FailureAnalysisSummary::from(&analysis))
    }

    /// Check every failure of one suite run.
    pub async fn check_run(
        &self,
        key: &SuiteRunKey,
        mode: &CheckMode,
        depth: Option<u32>,
    ) -> AnalysisResult<Vec<FailureAnalysisSummary>> {
        let depth = depth.unwrap_or(self.analysis.default_depth);
        validate_request(mode, depth, self.analysis.max_depth)?;

        let run = self.get_suite_run(key).await?;
        let analyses = BatchAnalyser::new(Arc::clone(&self.repo), &self.analysis, self.checker)
            .analyse_suite_run(&run, mode, depth)
            .await?;
        Ok(analyses.iter().map(FailureAnalysisSummary::from).collect())
    }
}

fn sort_newest_first(executions: &mut [TestCaseExecution]) {
    executions.sort_by(|a, b| {
        b.run_id
            .cmp(&a.run_id)
            .then_with(|| a.test_class.cmp(&b.test_class))
            .then_with(|| a.test_case.cmp(&b.test_case))
            .then_with(|| a.test_config.cmp(&b.test_config))
    });
}
