//! Common test utilities for integration tests
//!
//! Provides history fixtures, a seeded SQLite repository and a scripted in-memory
//! repository used across multiple integration test files.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use testrecall::adapters::sqlite::{create_migrated_test_pool, SqliteTestHistoryRepository};
use testrecall::domain::errors::{DomainError, DomainResult};
use testrecall::domain::models::{SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult};
use testrecall::domain::ports::{SuiteRunKey, SuiteRunWindow, TestCaseQuery, TestHistoryRepository};

pub const ORG: &str = "acme";
pub const PROJECT: &str = "storage";
pub const SUITE: &str = "ci";

pub const NPE_DETAILS: &str =
    "java.lang.NullPointerException: Cannot invoke \"String.length()\" because \"name\" is null";

pub const NPE_STACKTRACE: &str = "
Exception in thread \"main\" java.lang.NullPointerException
    at com.example.MyClass.methodA(MyClass.java:15)
    at com.example.MyClass.methodB(MyClass.java:20)
    at com.example.MyClass.methodC(MyClass.java:25)
    at com.example.AnotherClass.methodD(AnotherClass.java:30)
    at com.example.AnotherClass.methodE(AnotherClass.java:35)
    at com.example.Application.main(Application.java:60)
";

pub const TIMEOUT_DETAILS: &str = "Timed out after 30000 ms waiting for cluster to report schema agreement";

pub const TIMEOUT_STACKTRACE: &str = "
java.util.concurrent.TimeoutException
    at org.acme.cluster.SchemaAgreement.await(SchemaAgreement.java:88)
    at org.acme.cluster.ClusterHarness.start(ClusterHarness.java:140)
";

/// Initializes a test-writer subscriber once; later calls are no-ops.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn identity() -> TestCaseIdentity {
    TestCaseIdentity::new("org.acme.storage", "FlushTest", "test_flush_under_load")
}

pub fn suite_run(branch: &str, run_id: i64) -> SuiteRun {
    SuiteRun::new(ORG, PROJECT, SUITE, branch, run_id)
}

pub fn key(run_id: i64) -> SuiteRunKey {
    SuiteRunKey::new(ORG, PROJECT, SUITE, run_id)
}

pub fn npe_failure(run: &SuiteRun) -> TestCaseExecution {
    TestCaseExecution::new(run, identity(), TestResult::Fail)
        .with_error_details(NPE_DETAILS)
        .with_stacktrace(NPE_STACKTRACE)
}

pub fn timeout_failure(run: &SuiteRun) -> TestCaseExecution {
    TestCaseExecution::new(run, identity(), TestResult::Fail)
        .with_error_details(TIMEOUT_DETAILS)
        .with_stacktrace(TIMEOUT_STACKTRACE)
}

pub fn passed(run: &SuiteRun) -> TestCaseExecution {
    TestCaseExecution::new(run, identity(), TestResult::Pass)
}

pub fn skipped(run: &SuiteRun) -> TestCaseExecution {
    TestCaseExecution::new(run, identity(), TestResult::Skip)
}

/// Build the execution for one history letter: `F` NPE failure, `T` timeout failure,
/// `P` pass, `S` skip.
pub fn execution_for(run: &SuiteRun, letter: char) -> TestCaseExecution {
    match letter {
        'F' => npe_failure(run),
        'T' => timeout_failure(run),
        'S' => skipped(run),
        _ => passed(run),
    }
}

pub async fn sqlite_repo() -> Arc<SqliteTestHistoryRepository> {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create migrated test pool");
    Arc::new(SqliteTestHistoryRepository::new(pool))
}

/// Seed `history` on `branch`, one suite run per letter with run ids starting at
/// `first_run_id`. Returns the executions in run order.
pub async fn seed_history(
    repo: &dyn TestHistoryRepository,
    branch: &str,
    first_run_id: i64,
    history: &str,
) -> Vec<TestCaseExecution> {
    let mut executions = Vec::new();
    for (offset, letter) in history.chars().enumerate() {
        let run = suite_run(branch, first_run_id + offset as i64);
        repo.record_suite_run(&run).await.expect("Failed to record suite run");
        let execution = execution_for(&run, letter);
        repo.record_test_case_execution(&execution)
            .await
            .expect("Failed to record execution");
        executions.push(execution);
    }
    executions
}

/// Repository that returns canned data without honouring the query bounds, counts
/// every call, and can be told to fail.
#[derive(Default)]
pub struct ScriptedRepository {
    pub suite_runs: Vec<SuiteRun>,
    pub executions: Vec<TestCaseExecution>,
    pub fail_suite_runs: bool,
    pub fail_executions: bool,
    calls: AtomicUsize,
}

impl ScriptedRepository {
    pub fn with_history(branch: &str, history: &str) -> Self {
        let mut repo = Self::default();
        for (offset, letter) in history.chars().enumerate() {
            let run = suite_run(branch, 1 + offset as i64);
            repo.executions.push(execution_for(&run, letter));
            repo.suite_runs.push(run);
        }
        repo
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TestHistoryRepository for ScriptedRepository {
    async fn record_suite_run(&self, _run: &SuiteRun) -> DomainResult<()> {
        self.record_call();
        Ok(())
    }

    async fn record_test_case_execution(&self, _execution: &TestCaseExecution) -> DomainResult<()> {
        self.record_call();
        Ok(())
    }

    async fn suite_runs_with_id(&self, key: &SuiteRunKey) -> DomainResult<Vec<SuiteRun>> {
        self.record_call();
        Ok(self
            .suite_runs
            .iter()
            .filter(|run| {
                run.org == key.org
                    && run.project == key.project
                    && run.suite == key.suite
                    && run.run_id == key.run_id
                    && key.branch.as_ref().map_or(true, |branch| &run.branch == branch)
            })
            .cloned()
            .collect())
    }

    async fn suite_runs_in_window(&self, _window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>> {
        self.record_call();
        if self.fail_suite_runs {
            return Err(DomainError::DatabaseError("connection reset".to_string()));
        }
        Ok(self.suite_runs.clone())
    }

    async fn test_case_executions(&self, _query: &TestCaseQuery) -> DomainResult<Vec<TestCaseExecution>> {
        self.record_call();
        if self.fail_executions {
            return Err(DomainError::DatabaseError("read timeout".to_string()));
        }
        Ok(self.executions.clone())
    }

    async fn failed_tests_for_suite_runs(&self, runs: &[SuiteRun]) -> DomainResult<Vec<TestCaseExecution>> {
        self.record_call();
        Ok(self
            .executions
            .iter()
            .filter(|e| e.is_failure() && runs.iter().any(|run| e.belongs_to(run)))
            .cloned()
            .collect())
    }
}
