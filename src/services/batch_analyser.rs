//! Analysis of many failures at once.
//!
//! History is collected per failure; the pairwise comparisons of every (failure,
//! candidate) pair are then fanned out to the blocking thread pool, bounded by a
//! semaphore. Each failure gets its own comparison deadline, counted from the moment
//! its first comparison holds a worker; time spent queueing behind other failures
//! does not count. An expired deadline turns the verdict indeterminate rather than new.

use std::sync::{Arc, OnceLock};

use futures::future::{join_all, try_join_all};
use tokio::sync::{Notify, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{info, instrument, warn};

use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::models::{
    AnalysisConfig, CheckMode, Similarity, SuiteRun, TestCaseExecution, TestResult, MAX_ANALYSIS_DEPTH,
};
use crate::domain::ports::TestHistoryRepository;
use crate::services::failure_analyser::{
    validate_request, CollectedTestRuns, FailureAnalyser, FailureAnalysis, Progress,
};
use crate::services::history_collector::HistoryWindowCollector;
use crate::services::similarity_checker::SimilarityChecker;

type Comparison = JoinHandle<AnalysisResult<Similarity>>;

/// Runs failure analyses concurrently with a bounded number of comparison workers.
pub struct BatchAnalyser {
    collector: HistoryWindowCollector,
    checker: SimilarityChecker,
    max_depth: u32,
    timeout: Option<Duration>,
    semaphore: Arc<Semaphore>,
}

impl BatchAnalyser {
    /// Analyser bounded by `config.max_workers` and `config.timeout_ms`.
    pub fn new(repo: Arc<dyn TestHistoryRepository>, config: &AnalysisConfig, checker: SimilarityChecker) -> Self {
        Self {
            collector: HistoryWindowCollector::new(repo),
            checker,
            max_depth: config.max_depth.min(MAX_ANALYSIS_DEPTH),
            timeout: config.timeout_ms.map(Duration::from_millis),
            semaphore: Arc::new(Semaphore::new(config.max_workers.max(1))),
        }
    }

    /// Analyse every failed execution of `run`.
    #[instrument(skip(self, run), fields(run = %run, mode = mode.as_str()), err)]
    pub async fn analyse_suite_run(
        &self,
        run: &SuiteRun,
        mode: &CheckMode,
        depth: u32,
    ) -> AnalysisResult<Vec<FailureAnalysis>> {
        validate_request(mode, depth, self.max_depth)?;
        let failures = self
            .collector
            .repository()
            .failed_tests_for_suite_runs(std::slice::from_ref(run))
            .await?;
        self.analyse(failures, mode, depth).await
    }

    /// Analyse `failures`, returning one analysis per failure in the same order.
    ///
    /// Storage errors abort the whole batch.
    pub async fn analyse(
        &self,
        failures: Vec<TestCaseExecution>,
        mode: &CheckMode,
        depth: u32,
    ) -> AnalysisResult<Vec<FailureAnalysis>> {
        validate_request(mode, depth, self.max_depth)?;
        let failures: Vec<TestCaseExecution> = failures
            .into_iter()
            .filter(|failure| failure.result == TestResult::Fail)
            .collect();
        info!(failures = failures.len(), "Analysing batch");

        let collected = try_join_all(failures.into_iter().map(|failing| self.collect(failing, mode, depth))).await?;

        let pending: Vec<Pending> = collected
            .into_iter()
            .map(|progress| match progress {
                Progress::Continue(test_runs) => self.spawn_comparisons(test_runs),
                Progress::Finished(analysis) => Pending::Done(analysis),
            })
            .collect();

        let mut analyses = Vec::with_capacity(pending.len());
        for item in pending {
            analyses.push(self.finish(item).await?);
        }
        Ok(analyses)
    }

    async fn collect(
        &self,
        failing: TestCaseExecution,
        mode: &CheckMode,
        depth: u32,
    ) -> AnalysisResult<Progress<CollectedTestRuns>> {
        let analyser = FailureAnalyser::with_collector(self.collector.clone(), failing)
            .with_checker(self.checker)
            .with_max_depth(self.max_depth);
        match analyser.collect_builds(mode, depth).await? {
            Progress::Continue(builds) => builds.collect_test_runs().await,
            Progress::Finished(analysis) => Ok(Progress::Finished(analysis)),
        }
    }

    fn spawn_comparisons(&self, test_runs: CollectedTestRuns) -> Pending {
        let failing = Arc::new(test_runs.failing().clone());
        let checker = test_runs.checker();
        let started = Arc::new(ComparisonStart::default());
        let handles: Vec<Comparison> = test_runs
            .failed_candidates()
            .cloned()
            .map(|candidate| {
                let semaphore = Arc::clone(&self.semaphore);
                let failing = Arc::clone(&failing);
                let started = Arc::clone(&started);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AnalysisError::Worker(e.to_string()))?;
                    started.mark();
                    tokio::task::spawn_blocking(move || checker.is_similar(&failing, &candidate))
                        .await
                        .map_err(|e| AnalysisError::Worker(e.to_string()))
                })
            })
            .collect();
        Pending::Comparing {
            test_runs,
            handles,
            started,
        }
    }

    async fn finish(&self, pending: Pending) -> AnalysisResult<FailureAnalysis> {
        let (test_runs, handles, started) = match pending {
            Pending::Done(analysis) => return Ok(analysis),
            Pending::Comparing {
                test_runs,
                handles,
                started,
            } => (test_runs, handles, started),
        };
        let Some(timeout) = self.timeout else {
            return complete(test_runs, join_all(handles).await);
        };
        let abort_handles: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();
        let joined = join_all(handles);
        tokio::pin!(joined);

        // the clock only runs once this failure holds a worker
        let deadline = tokio::select! {
            results = &mut joined => return complete(test_runs, results),
            started_at = started.wait() => started_at + timeout,
        };

        match timeout_at(deadline, joined).await {
            Ok(results) => complete(test_runs, results),
            Err(_) => {
                abort_handles.iter().for_each(AbortHandle::abort);
                warn!(test = %test_runs.failing(), "Comparison deadline expired");
                Ok(test_runs.abandon(format!(
                    "Comparisons did not finish within {} ms; cannot tell whether the failure is known.",
                    timeout.as_millis()
                )))
            }
        }
    }
}

fn complete(
    test_runs: CollectedTestRuns,
    results: Vec<Result<AnalysisResult<Similarity>, tokio::task::JoinError>>,
) -> AnalysisResult<FailureAnalysis> {
    let similarities = results
        .into_iter()
        .map(|result| result.map_err(|e| AnalysisError::Worker(e.to_string()))?)
        .collect::<AnalysisResult<Vec<Similarity>>>()?;
    test_runs.complete(similarities)
}

/// When the first comparison of one failure got a worker.
#[derive(Default)]
struct ComparisonStart {
    at: OnceLock<Instant>,
    notify: Notify,
}

impl ComparisonStart {
    fn mark(&self) {
        if self.at.set(Instant::now()).is_ok() {
            self.notify.notify_one();
        }
    }

    async fn wait(&self) -> Instant {
        loop {
            if let Some(at) = self.at.get() {
                return *at;
            }
            self.notify.notified().await;
        }
    }
}

enum Pending {
    Done(FailureAnalysis),
    Comparing {
        test_runs: CollectedTestRuns,
        handles: Vec<Comparison>,
        started: Arc<ComparisonStart>,
    },
}
