//! SQLite implementation of the TestHistoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SuiteRun, SuiteRunStatus, TestCaseExecution, TestResult};
use crate::domain::ports::{SuiteRunKey, SuiteRunWindow, TestCaseQuery, TestHistoryRepository};

/// [`TestHistoryRepository`](crate::domain::ports::TestHistoryRepository) backed by SQLite.
#[derive(Clone)]
pub struct SqliteTestHistoryRepository {
    pool: SqlitePool,
}

impl SqliteTestHistoryRepository {
    /// Repository over an open, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestHistoryRepository for SqliteTestHistoryRepository {
    async fn record_suite_run(&self, run: &SuiteRun) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO suite_runs (org, project, suite, branch, run_id, tstamp, commit_sha, url,
               pass_count, fail_count, skip_count, total_count, duration_sec, status, ignored, ignore_details)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&run.org)
        .bind(&run.project)
        .bind(&run.suite)
        .bind(&run.branch)
        .bind(run.run_id)
        .bind(run.tstamp.map(|t| t.to_rfc3339()))
        .bind(&run.commit)
        .bind(&run.url)
        .bind(i64::from(run.pass_count))
        .bind(i64::from(run.fail_count))
        .bind(i64::from(run.skip_count))
        .bind(run.total_count.map(i64::from))
        .bind(run.duration_sec.map(i64::from))
        .bind(run.status.as_str())
        .bind(run.ignore)
        .bind(&run.ignore_details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_test_case_execution(&self, execution: &TestCaseExecution) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO test_case_runs (org, project, suite, run_id, branch, test_package,
               test_class, test_case, test_config, result, test_group, tstamp, duration_ms, error_details,
               error_stacktrace, stdout, stderr, skip_details)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&execution.org)
        .bind(&execution.project)
        .bind(&execution.suite)
        .bind(execution.run_id)
        .bind(&execution.branch)
        .bind(&execution.test_package)
        .bind(&execution.test_class)
        .bind(&execution.test_case)
        .bind(&execution.test_config)
        .bind(execution.result.as_str())
        .bind(&execution.test_group)
        .bind(execution.tstamp.map(|t| t.to_rfc3339()))
        .bind(execution.duration_ms)
        .bind(&execution.error_details)
        .bind(&execution.error_stacktrace)
        .bind(&execution.stdout)
        .bind(&execution.stderr)
        .bind(&execution.skip_details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn suite_runs_with_id(&self, key: &SuiteRunKey) -> DomainResult<Vec<SuiteRun>> {
        let mut sql = String::from("SELECT * FROM suite_runs WHERE org = ? AND project = ? AND suite = ? AND run_id = ?");
        if key.branch.is_some() {
            sql.push_str(" AND branch = ?");
        }
        sql.push_str(" ORDER BY branch");

        let mut q = sqlx::query_as::<_, SuiteRunRow>(&sql)
            .bind(&key.org)
            .bind(&key.project)
            .bind(&key.suite)
            .bind(key.run_id);
        if let Some(branch) = &key.branch {
            q = q.bind(branch);
        }
        let rows: Vec<SuiteRunRow> = q.fetch_all(&self.pool).await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn suite_runs_in_window(&self, window: &SuiteRunWindow) -> DomainResult<Vec<SuiteRun>> {
        let mut sql = String::from(
            "SELECT * FROM suite_runs WHERE org = ? AND project = ? AND suite = ? AND branch = ? AND ignored = 0",
        );
        if window.before_run_id.is_some() {
            sql.push_str(" AND run_id < ?");
        }
        sql.push_str(" ORDER BY run_id DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, SuiteRunRow>(&sql)
            .bind(&window.org)
            .bind(&window.project)
            .bind(&window.suite)
            .bind(&window.branch);
        if let Some(before) = window.before_run_id {
            q = q.bind(before);
        }
        let rows: Vec<SuiteRunRow> = q.bind(i64::from(window.limit)).fetch_all(&self.pool).await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn test_case_executions(&self, query: &TestCaseQuery) -> DomainResult<Vec<TestCaseExecution>> {
        if query.run_ids.is_empty() {
            return Ok(Vec::new());
        }

        let run_ids: Vec<String> = query.run_ids.iter().map(i64::to_string).collect();
        let mut sql = format!(
            "SELECT * FROM test_case_runs WHERE org = ? AND project = ? AND suite = ? AND run_id IN ({}) AND test_package = ?",
            run_ids.join(", ")
        );
        let mut bindings: Vec<&str> = vec![
            query.org.as_str(),
            query.project.as_str(),
            query.suite.as_str(),
            query.package.as_str(),
        ];

        if let Some(branch) = &query.branch {
            sql.push_str(" AND branch = ?");
            bindings.push(branch);
        }
        if let Some(class) = &query.class {
            sql.push_str(" AND test_class = ?");
            bindings.push(class);
        }
        if let Some(case) = &query.case {
            sql.push_str(" AND test_case = ?");
            bindings.push(case);
        }
        if let Some(config) = &query.config {
            sql.push_str(" AND test_config = ?");
            bindings.push(config);
        }
        if let Some(result) = query.result {
            sql.push_str(" AND result = ?");
            bindings.push(result.as_str());
        }
        sql.push_str(" ORDER BY run_id DESC, test_class, test_case, test_config");

        let mut q = sqlx::query_as::<_, TestCaseRunRow>(&sql);
        for binding in bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TestCaseRunRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn failed_tests_for_suite_runs(&self, runs: &[SuiteRun]) -> DomainResult<Vec<TestCaseExecution>> {
        let mut failures: Vec<TestCaseExecution> = Vec::new();
        for run in runs {
            let rows: Vec<TestCaseRunRow> = sqlx::query_as(
                r#"SELECT * FROM test_case_runs
                   WHERE org = ? AND project = ? AND suite = ? AND run_id = ? AND branch = ? AND result = 'FAIL'
                   ORDER BY test_package, test_class, test_case, test_config"#,
            )
            .bind(&run.org)
            .bind(&run.project)
            .bind(&run.suite)
            .bind(run.run_id)
            .bind(&run.branch)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                failures.push(TestCaseExecution::try_from(row)?);
            }
        }
        Ok(failures)
    }
}

#[derive(sqlx::FromRow)]
struct SuiteRunRow {
    org: String,
    project: String,
    suite: String,
    branch: String,
    run_id: i64,
    tstamp: Option<String>,
    commit_sha: Option<String>,
    url: Option<String>,
    pass_count: i64,
    fail_count: i64,
    skip_count: i64,
    total_count: Option<i64>,
    duration_sec: Option<i64>,
    status: String,
    ignored: bool,
    ignore_details: Option<String>,
}

impl TryFrom<SuiteRunRow> for SuiteRun {
    type Error = DomainError;

    fn try_from(row: SuiteRunRow) -> Result<Self, Self::Error> {
        let status = SuiteRunStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid suite run status: {}", row.status)))?;

        Ok(SuiteRun {
            org: row.org,
            project: row.project,
            suite: row.suite,
            branch: row.branch,
            run_id: row.run_id,
            tstamp: super::parse_optional_datetime(row.tstamp)?,
            commit: row.commit_sha,
            url: row.url,
            pass_count: super::parse_count(row.pass_count, "pass_count")?,
            fail_count: super::parse_count(row.fail_count, "fail_count")?,
            skip_count: super::parse_count(row.skip_count, "skip_count")?,
            total_count: row.total_count.map(|c| super::parse_count(c, "total_count")).transpose()?,
            duration_sec: row.duration_sec.map(|d| super::parse_count(d, "duration_sec")).transpose()?,
            status,
            ignore: row.ignored,
            ignore_details: row.ignore_details,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TestCaseRunRow {
    org: String,
    project: String,
    suite: String,
    run_id: i64,
    branch: String,
    test_package: String,
    test_class: String,
    test_case: String,
    test_config: String,
    result: String,
    test_group: Option<String>,
    tstamp: Option<String>,
    duration_ms: Option<i64>,
    error_details: Option<String>,
    error_stacktrace: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
    skip_details: Option<String>,
}

impl TryFrom<TestCaseRunRow> for TestCaseExecution {
    type Error = DomainError;

    fn try_from(row: TestCaseRunRow) -> Result<Self, Self::Error> {
        let result = TestResult::from_str(&row.result)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid test result: {}", row.result)))?;

        Ok(TestCaseExecution {
            org: row.org,
            project: row.project,
            suite: row.suite,
            branch: row.branch,
            run_id: row.run_id,
            test_package: row.test_package,
            test_class: row.test_class,
            test_case: row.test_case,
            test_config: row.test_config,
            result,
            test_group: row.test_group,
            tstamp: super::parse_optional_datetime(row.tstamp)?,
            duration_ms: row.duration_ms,
            error_details: row.error_details,
            error_stacktrace: row.error_stacktrace,
            stdout: row.stdout,
            stderr: row.stderr,
            skip_details: row.skip_details,
        })
    }
}
