//! Failure analysis: is a failed test execution a known failure or a new one?
//!
//! The analysis moves through typed stages:
//!
//! ```text
//! FailureAnalyser ──collect_builds──▶ CollectedBuilds ──collect_test_runs──▶ CollectedTestRuns
//!        │                                   │                                      │
//!        │                                   └── no suite runs ──┐                  │ analyze / complete
//!        │                                                       ▼                  ▼
//!        └──────────────────── check_regression / check_vs_upstream ──────▶ FailureAnalysis
//! ```
//!
//! Each stage consumes the previous one, so a check mode can only be chosen once per
//! analyser and the fields of a later stage only exist once they have been collected.
//! An empty window ends the analysis early with an indeterminate verdict.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::models::{
    CheckMode, Similarity, SuiteRun, TestCaseExecution, TestResult, Verdict, MAX_ANALYSIS_DEPTH,
};
use crate::domain::ports::{SuiteRunWindow, TestCaseQuery, TestHistoryRepository};
use crate::services::history_collector::HistoryWindowCollector;
use crate::services::similarity_checker::SimilarityChecker;

/// Precondition checks shared by every entry point; run before any query.
pub fn validate_request(mode: &CheckMode, depth: u32, max_depth: u32) -> AnalysisResult<()> {
    AnalysisError::check_depth(depth, max_depth)?;
    if let CheckMode::Upstream { suite, branch } = mode {
        if suite.trim().is_empty() || branch.trim().is_empty() {
            return Err(AnalysisError::InvalidTarget(
                "upstream check needs both suite and branch".to_string(),
            ));
        }
    }
    Ok(())
}

/// Either the next stage, or the analysis ended early.
#[derive(Debug)]
pub enum Progress<T> {
    /// The next stage
    Continue(T),
    /// Nothing left to compare; this is the final analysis
    Finished(FailureAnalysis),
}

/// Suite and branch an analysis compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    mode: &'static str,
    suite: String,
    branch: String,
    before_run_id: Option<i64>,
}

/// Trace messages kept alongside the stages and handed to the final result.
#[derive(Debug, Default)]
struct Trace(Vec<String>);

impl Trace {
    fn add_msg(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{}", msg);
        self.0.push(msg);
    }
}

/// Created stage: a failed execution waiting for a check mode.
pub struct FailureAnalyser {
    collector: HistoryWindowCollector,
    failing: TestCaseExecution,
    checker: SimilarityChecker,
    max_depth: u32,
}

impl FailureAnalyser {
    /// Analyser for `failing`, reading history from `repo` with default thresholds.
    pub fn new(repo: Arc<dyn TestHistoryRepository>, failing: TestCaseExecution) -> Self {
        Self::with_collector(HistoryWindowCollector::new(repo), failing)
    }

    /// Analyser reading history through an existing collector.
    pub fn with_collector(collector: HistoryWindowCollector, failing: TestCaseExecution) -> Self {
        Self {
            collector,
            failing,
            checker: SimilarityChecker::default(),
            max_depth: MAX_ANALYSIS_DEPTH,
        }
    }

    /// Compare failures with `checker` instead of the default thresholds.
    pub fn with_checker(mut self, checker: SimilarityChecker) -> Self {
        self.checker = checker;
        self
    }

    /// Lower the accepted depth bound. Values above the hard cap are ignored.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.min(MAX_ANALYSIS_DEPTH);
        self
    }

    /// The failed execution under check.
    pub fn failing(&self) -> &TestCaseExecution {
        &self.failing
    }

    /// Compare against the `depth` most recent earlier runs of the failing execution's
    /// own suite and branch.
    pub async fn check_regression(self, depth: u32) -> AnalysisResult<FailureAnalysis> {
        self.run(&CheckMode::Regression, depth).await
    }

    /// Compare against the `depth` most recent runs of `suite` on `branch`, without a
    /// `run_id` bound.
    pub async fn check_vs_upstream(
        self,
        suite: impl Into<String>,
        branch: impl Into<String>,
        depth: u32,
    ) -> AnalysisResult<FailureAnalysis> {
        let mode = CheckMode::Upstream {
            suite: suite.into(),
            branch: branch.into(),
        };
        self.run(&mode, depth).await
    }

    /// Run every stage of the analysis in `mode`.
    pub async fn run(self, mode: &CheckMode, depth: u32) -> AnalysisResult<FailureAnalysis> {
        let builds = match self.collect_builds(mode, depth).await? {
            Progress::Continue(builds) => builds,
            Progress::Finished(analysis) => return Ok(analysis),
        };
        match builds.collect_test_runs().await? {
            Progress::Continue(test_runs) => Ok(test_runs.analyze()),
            Progress::Finished(analysis) => Ok(analysis),
        }
    }

    /// Validate the request and fetch the suite run window.
    #[instrument(skip(self, mode), fields(test = %self.failing, mode = mode.as_str()), err)]
    pub async fn collect_builds(self, mode: &CheckMode, depth: u32) -> AnalysisResult<Progress<CollectedBuilds>> {
        validate_request(mode, depth, self.max_depth)?;

        let mut trace = Trace::default();
        let target = match mode {
            CheckMode::Regression => {
                trace.add_msg(format!(
                    "Checking regression on {}::{} before run {}",
                    self.failing.suite, self.failing.branch, self.failing.run_id
                ));
                Target {
                    mode: mode.as_str(),
                    suite: self.failing.suite.clone(),
                    branch: self.failing.branch.clone(),
                    before_run_id: Some(self.failing.run_id),
                }
            }
            CheckMode::Upstream { suite, branch } => {
                trace.add_msg(format!("Checking regression vs upstream {suite}::{branch}"));
                Target {
                    mode: mode.as_str(),
                    suite: suite.clone(),
                    branch: branch.clone(),
                    before_run_id: None,
                }
            }
        };
        trace.add_msg(format!("Using depth of {depth}"));

        let mut window = SuiteRunWindow::new(
            self.failing.org.clone(),
            self.failing.project.clone(),
            target.suite.clone(),
            target.branch.clone(),
            depth,
        );
        if let Some(before) = target.before_run_id {
            trace.add_msg(format!("Using only suite runs with id < {before}."));
            window = window.before(before);
        }

        let suite_runs = self.collector.suite_runs_in_window(&window).await?;
        if suite_runs.is_empty() {
            trace.add_msg("No suite runs for checking found.");
            return Ok(Progress::Finished(FailureAnalysis::from_parts(
                self.failing,
                target.mode,
                Vec::new(),
                Vec::new(),
                &[],
                trace,
            )));
        }

        Ok(Progress::Continue(CollectedBuilds {
            collector: self.collector,
            failing: self.failing,
            checker: self.checker,
            target,
            suite_runs,
            trace,
        }))
    }
}

/// Builds-collected stage: the suite run window is known.
pub struct CollectedBuilds {
    collector: HistoryWindowCollector,
    failing: TestCaseExecution,
    checker: SimilarityChecker,
    target: Target,
    suite_runs: Vec<SuiteRun>,
    trace: Trace,
}

impl CollectedBuilds {
    /// Suite runs in the window, newest first.
    pub fn suite_runs(&self) -> &[SuiteRun] {
        &self.suite_runs
    }

    /// Fetch every configuration of the failing test case inside the window.
    #[instrument(skip(self), fields(test = %self.failing, runs = self.suite_runs.len()), err)]
    pub async fn collect_test_runs(mut self) -> AnalysisResult<Progress<CollectedTestRuns>> {
        let run_ids: Vec<i64> = self.suite_runs.iter().map(|run| run.run_id).collect();
        let query = TestCaseQuery::for_test_case(
            self.failing.org.clone(),
            self.failing.project.clone(),
            self.target.suite.clone(),
            self.target.branch.clone(),
            run_ids.clone(),
            &self.failing.identity(),
        );

        let failing = &self.failing;
        let target = &self.target;
        let test_runs: Vec<TestCaseExecution> = self
            .collector
            .test_case_executions(&query)
            .await?
            .into_iter()
            .filter(|run| match target.before_run_id {
                Some(before) => run.run_id < before,
                None => !run.is_same_execution(failing),
            })
            .collect();
        info!(count = test_runs.len(), test = %self.failing, "Found test runs to check");

        if test_runs.is_empty() {
            self.trace.add_msg(format!(
                "Got {} suite runs but no test runs for the test under check.",
                self.suite_runs.len()
            ));
            self.trace.add_msg(format!("Builds considered: {run_ids:?}."));
            return Ok(Progress::Finished(FailureAnalysis::from_parts(
                self.failing,
                self.target.mode,
                self.suite_runs,
                Vec::new(),
                &[],
                self.trace,
            )));
        }

        Ok(Progress::Continue(CollectedTestRuns {
            failing: self.failing,
            checker: self.checker,
            mode: self.target.mode,
            suite_runs: self.suite_runs,
            test_runs,
            trace: self.trace,
        }))
    }
}

/// Test-runs-collected stage: everything needed for the comparisons is in memory.
#[derive(Debug)]
pub struct CollectedTestRuns {
    failing: TestCaseExecution,
    checker: SimilarityChecker,
    mode: &'static str,
    suite_runs: Vec<SuiteRun>,
    test_runs: Vec<TestCaseExecution>,
    trace: Trace,
}

impl CollectedTestRuns {
    /// The failed execution under check.
    pub fn failing(&self) -> &TestCaseExecution {
        &self.failing
    }

    /// Checker the comparisons use.
    pub fn checker(&self) -> SimilarityChecker {
        self.checker
    }

    /// Executions found in the window, the failed one excluded.
    pub fn test_runs(&self) -> &[TestCaseExecution] {
        &self.test_runs
    }

    /// Failed executions to compare, in the order [`complete`](Self::complete) expects.
    pub fn failed_candidates(&self) -> impl Iterator<Item = &TestCaseExecution> {
        self.test_runs.iter().filter(|run| run.is_failure())
    }

    /// Compare every failed candidate on the current thread.
    pub fn analyze(self) -> FailureAnalysis {
        let similarities: Vec<Similarity> = self
            .failed_candidates()
            .map(|candidate| {
                debug!(candidate = %candidate, "Checking candidate");
                self.checker.is_similar(&self.failing, candidate)
            })
            .collect();
        FailureAnalysis::from_parts(
            self.failing,
            self.mode,
            self.suite_runs,
            self.test_runs,
            &similarities,
            self.trace,
        )
    }

    /// Give up on the comparisons, for example because a deadline expired. The verdict
    /// is indeterminate, never new.
    pub fn abandon(mut self, reason: impl Into<String>) -> FailureAnalysis {
        self.trace.add_msg(reason);
        FailureAnalysis::from_parts(
            self.failing,
            self.mode,
            self.suite_runs,
            Vec::new(),
            &[],
            self.trace,
        )
    }

    /// Finish with comparisons computed elsewhere, one per failed candidate.
    pub fn complete(self, similarities: Vec<Similarity>) -> AnalysisResult<FailureAnalysis> {
        let expected = self.failed_candidates().count();
        if similarities.len() != expected {
            return Err(AnalysisError::Worker(format!(
                "expected {expected} comparison results, got {}",
                similarities.len()
            )));
        }
        Ok(FailureAnalysis::from_parts(
            self.failing,
            self.mode,
            self.suite_runs,
            self.test_runs,
            &similarities,
            self.trace,
        ))
    }
}

/// Analyzed stage: the verdict and everything it was derived from.
#[derive(Debug, Clone)]
pub struct FailureAnalysis {
    failing: TestCaseExecution,
    mode: &'static str,
    verdict: Verdict,
    suite_runs: Vec<SuiteRun>,
    test_runs: Vec<TestCaseExecution>,
    similar_failures: Vec<TestCaseExecution>,
    num_inconclusive: usize,
    messages: Vec<String>,
}

impl FailureAnalysis {
    fn from_parts(
        failing: TestCaseExecution,
        mode: &'static str,
        suite_runs: Vec<SuiteRun>,
        test_runs: Vec<TestCaseExecution>,
        similarities: &[Similarity],
        trace: Trace,
    ) -> Self {
        let similar_failures: Vec<TestCaseExecution> = test_runs
            .iter()
            .filter(|run| run.is_failure())
            .zip(similarities)
            .filter(|(_, similarity)| similarity.is_similar())
            .map(|(run, _)| run.clone())
            .collect();
        let num_inconclusive = similarities.iter().filter(|s| s.is_unknown()).count();

        let verdict = if test_runs.is_empty() {
            Verdict::Indeterminate
        } else if similar_failures.is_empty() {
            Verdict::New
        } else {
            Verdict::Known
        };
        debug!(
            test = %failing,
            verdict = %verdict,
            similar = similar_failures.len(),
            inconclusive = num_inconclusive,
            "Analysis finished"
        );

        Self {
            failing,
            mode,
            verdict,
            suite_runs,
            test_runs,
            similar_failures,
            num_inconclusive,
            messages: trace.0,
        }
    }

    /// The failed execution that was checked.
    pub fn failing(&self) -> &TestCaseExecution {
        &self.failing
    }

    /// `regression` or `upstream`.
    pub fn mode(&self) -> &str {
        self.mode
    }

    /// Known, new or indeterminate.
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// `Some(true)` known, `Some(false)` new, `None` when no test runs were found.
    pub fn is_known_failure(&self) -> Option<bool> {
        self.verdict.is_known_failure()
    }

    /// Executions found and examined.
    pub fn num_test_runs_checked(&self) -> usize {
        self.test_runs.len()
    }

    /// Passing executions found.
    pub fn num_test_runs_pass(&self) -> usize {
        self.count_with_result(TestResult::Pass)
    }

    /// Skipped executions found.
    pub fn num_test_runs_skip(&self) -> usize {
        self.count_with_result(TestResult::Skip)
    }

    /// Failed executions found, similar or not.
    pub fn num_test_runs_fail(&self) -> usize {
        self.count_with_result(TestResult::Fail)
    }

    /// Failures found similar to the one under check.
    pub fn num_test_runs_fail_same_way(&self) -> usize {
        self.similar_failures.len()
    }

    /// All failures not found similar, including inconclusive comparisons.
    pub fn num_test_runs_fail_different_way(&self) -> usize {
        self.num_test_runs_fail() - self.similar_failures.len()
    }

    /// Failures whose comparison had too little signal to decide.
    pub fn num_test_runs_fail_inconclusive(&self) -> usize {
        self.num_inconclusive
    }

    /// Failures found similar, newest first.
    pub fn similar_failures(&self) -> &[TestCaseExecution] {
        &self.similar_failures
    }

    /// Suite runs the analysis looked at.
    pub fn suite_runs_checked(&self) -> &[SuiteRun] {
        &self.suite_runs
    }

    /// Every execution examined, newest first.
    pub fn test_runs_checked(&self) -> &[TestCaseExecution] {
        &self.test_runs
    }

    /// Trace of what the analysis did, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// The trace joined into one string.
    pub fn message(&self) -> String {
        self.messages.join("\n")
    }

    fn count_with_result(&self, result: TestResult) -> usize {
        self.test_runs.iter().filter(|run| run.result == result).count()
    }
}
