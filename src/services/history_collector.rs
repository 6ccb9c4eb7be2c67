//! Windowed history queries used by the failure analysis.
//!
//! Storage is expected to honour the window already; the collector re-applies the
//! bounds so the analysis invariants hold for any repository implementation.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SuiteRun, TestCaseExecution};
use crate::domain::ports::{SuiteRunWindow, TestCaseQuery, TestHistoryRepository};

/// Fetches suite run windows and the executions of a test inside them.
#[derive(Clone)]
pub struct HistoryWindowCollector {
    repo: Arc<dyn TestHistoryRepository>,
}

impl HistoryWindowCollector {
    /// Collector reading from `repo`.
    pub fn new(repo: Arc<dyn TestHistoryRepository>) -> Self {
        Self { repo }
    }

    /// The repository the collector reads from.
    pub fn repository(&self) -> &Arc<dyn TestHistoryRepository> {
        &self.repo
    }

    /// Most recent non-ignored runs of the window, `run_id` descending, at most
    /// `window.limit` of them.
    #[instrument(skip(self), fields(suite = %window.suite, branch = %window.branch), err)]
    pub async fn suite_runs_in_window(&self, window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>> {
        if window.limit == 0 {
            return Ok(Vec::new());
        }
        let fetched = self.repo.suite_runs_in_window(window).await?;
        let fetched_count = fetched.len();

        let mut runs: Vec<SuiteRun> = fetched
            .into_iter()
            .filter(|run| {
                run.org == window.org
                    && run.project == window.project
                    && run.suite == window.suite
                    && run.branch == window.branch
            })
            .filter(|run| window.before_run_id.map_or(true, |before| run.run_id < before))
            .filter(|run| !run.ignore)
            .collect();
        runs.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        runs.truncate(window.limit as usize);

        debug!(fetched = fetched_count, kept = runs.len(), "Collected suite run window");
        Ok(runs)
    }

    /// Executions matching `query` inside `query.run_ids`.
    #[instrument(skip(self), fields(suite = %query.suite, runs = query.run_ids.len()), err)]
    pub async fn test_case_executions(&self, query: &TestCaseQuery) -> DomainResult<Vec<TestCaseExecution>> {
        query.validate().map_err(DomainError::ValidationFailed)?;
        if query.run_ids.is_empty() {
            return Ok(Vec::new());
        }

        let executions: Vec<TestCaseExecution> = self
            .repo
            .test_case_executions(query)
            .await?
            .into_iter()
            .filter(|e| matches_query(e, query))
            .collect();

        debug!(found = executions.len(), "Collected test case executions");
        Ok(executions)
    }
}

fn matches_query(execution: &TestCaseExecution, query: &TestCaseQuery) -> bool {
    execution.org == query.org
        && execution.project == query.project
        && execution.suite == query.suite
        && query.run_ids.contains(&execution.run_id)
        && query.branch.as_ref().map_or(true, |b| &execution.branch == b)
        && execution.test_package == query.package
        && query.class.as_ref().map_or(true, |c| &execution.test_class == c)
        && query.case.as_ref().map_or(true, |c| &execution.test_case == c)
        && query.config.as_ref().map_or(true, |c| &execution.test_config == c)
        && query.result.map_or(true, |r| execution.result == r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TestCaseIdentity, TestResult};
    use crate::domain::ports::SuiteRunKey;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns everything it holds regardless of the requested bounds.
    #[derive(Default)]
    struct LooseRepository {
        runs: Vec<SuiteRun>,
        executions: Vec<TestCaseExecution>,
        execution_queries: AtomicUsize,
    }

    #[async_trait]
    impl TestHistoryRepository for LooseRepository {
        async fn record_suite_run(&self, _run: &SuiteRun) -> DomainResult<()> {
            Ok(())
        }

        async fn record_test_case_execution(&self, _execution: &TestCaseExecution) -> DomainResult<()> {
            Ok(())
        }

        async fn suite_runs_with_id(&self, _key: &SuiteRunKey) -> DomainResult<Vec<SuiteRun>> {
            Ok(Vec::new())
        }

        async fn suite_runs_in_window(&self, _window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>> {
            Ok(self.runs.clone())
        }

        async fn test_case_executions(&self, _query: &TestCaseQuery) -> DomainResult<Vec<TestCaseExecution>> {
            self.execution_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.executions.clone())
        }

        async fn failed_tests_for_suite_runs(&self, _runs: &[SuiteRun]) -> DomainResult<Vec<TestCaseExecution>> {
            Ok(Vec::new())
        }
    }

    fn run(branch: &str, run_id: i64) -> SuiteRun {
        SuiteRun::new("acme", "db", "ci", branch, run_id)
    }

    fn test() -> TestCaseIdentity {
        TestCaseIdentity::new("org.acme", "WalTest", "test_replay")
    }

    #[tokio::test]
    async fn test_window_is_rebounded() {
        let mut ignored = run("main", 5);
        ignored.ignore = true;
        let repo = LooseRepository {
            runs: vec![run("main", 2), run("main", 9), ignored, run("main", 7), run("release", 6), run("main", 4)],
            ..LooseRepository::default()
        };
        let collector = HistoryWindowCollector::new(Arc::new(repo));

        let window = SuiteRunWindow::new("acme", "db", "ci", "main", 2).before(8);
        let runs = collector.suite_runs_in_window(&window).await.unwrap();

        let ids: Vec<i64> = runs.iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec![7, 4]);
    }

    #[tokio::test]
    async fn test_executions_outside_query_are_dropped() {
        let main_3 = run("main", 3);
        let other_case = TestCaseExecution::new(
            &main_3,
            TestCaseIdentity::new("org.acme", "WalTest", "test_truncate"),
            TestResult::Fail,
        );
        let repo = LooseRepository {
            executions: vec![
                TestCaseExecution::new(&main_3, test(), TestResult::Fail),
                TestCaseExecution::new(&run("main", 8), test(), TestResult::Pass),
                other_case,
            ],
            ..LooseRepository::default()
        };
        let collector = HistoryWindowCollector::new(Arc::new(repo));

        let query = TestCaseQuery::for_test_case("acme", "db", "ci", "main", vec![3], &test());
        let executions = collector.test_case_executions(&query).await.unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].run_id, 3);
        assert_eq!(executions[0].test_case, "test_replay");
    }

    #[tokio::test]
    async fn test_empty_run_ids_skip_storage() {
        let repo = Arc::new(LooseRepository::default());
        let collector = HistoryWindowCollector::new(repo.clone());

        let query = TestCaseQuery::for_test_case("acme", "db", "ci", "main", Vec::new(), &test());
        assert!(collector.test_case_executions(&query).await.unwrap().is_empty());
        assert_eq!(repo.execution_queries.load(Ordering::SeqCst), 0);

        let invalid = TestCaseQuery {
            class: None,
            ..query
        };
        assert!(matches!(
            collector.test_case_executions(&invalid).await,
            Err(DomainError::ValidationFailed(_))
        ));
    }
}
