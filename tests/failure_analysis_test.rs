//! Integration tests for single-failure analysis over stored history.

mod common;

use std::sync::Arc;

use common::*;
use testrecall::domain::errors::{AnalysisError, DomainError};
use testrecall::domain::models::{FailureAnalysisSummary, TestCaseExecution, TestResult, Verdict};
use testrecall::domain::ports::TestHistoryRepository;
use testrecall::services::{FailureAnalyser, Progress};

async fn record(repo: &dyn TestHistoryRepository, execution: &TestCaseExecution) {
    repo.record_suite_run(&suite_run(&execution.branch, execution.run_id))
        .await
        .unwrap();
    repo.record_test_case_execution(execution).await.unwrap();
}

#[tokio::test]
async fn test_same_run_id_on_topic_branch_leaves_main_history_intact() {
    let repo = sqlite_repo().await;
    let history = seed_history(repo.as_ref(), "main", 3, "FF").await;
    record(repo.as_ref(), &passed(&suite_run("feature/x", 3))).await;

    let analysis = FailureAnalyser::new(repo, history[1].clone())
        .check_regression(8)
        .await
        .unwrap();

    assert_eq!(analysis.verdict(), Verdict::Known);
    assert_eq!(analysis.num_test_runs_checked(), 1);
    assert_eq!(analysis.similar_failures()[0].branch, "main");
}

#[tokio::test]
async fn test_known_failure_in_earlier_run() {
    setup_test_logging();
    let repo = sqlite_repo().await;
    let history = seed_history(repo.as_ref(), "main", 1, "FPPF").await;
    let failing = history[3].clone();

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.is_known_failure(), Some(true));
    assert_eq!(analysis.verdict(), Verdict::Known);
    assert_eq!(analysis.similar_failures().len(), 1);
    assert_eq!(analysis.similar_failures()[0].run_id, 1);
    assert_eq!(analysis.num_test_runs_checked(), 3);
    assert_eq!(analysis.num_test_runs_pass(), 2);
    assert_eq!(analysis.mode(), "regression");
    assert_eq!(
        analysis.messages()[0],
        "Checking regression on ci::main before run 4"
    );
}

#[tokio::test]
async fn test_new_failure_after_passing_history() {
    let repo = sqlite_repo().await;
    let history = seed_history(repo.as_ref(), "main", 1, "PPPF").await;

    let analysis = FailureAnalyser::new(repo, history[3].clone())
        .check_regression(8)
        .await
        .unwrap();

    assert_eq!(analysis.is_known_failure(), Some(false));
    assert!(analysis.similar_failures().is_empty());
    assert_eq!(analysis.num_test_runs_pass(), 3);
    assert_eq!(analysis.num_test_runs_fail(), 0);
}

#[tokio::test]
async fn test_earlier_unrelated_failure_is_not_similar() {
    let repo = sqlite_repo().await;
    let history = seed_history(repo.as_ref(), "main", 1, "TPPF").await;

    let analysis = FailureAnalyser::new(repo, history[3].clone())
        .check_regression(8)
        .await
        .unwrap();

    assert_eq!(analysis.is_known_failure(), Some(false));
    assert_eq!(analysis.num_test_runs_fail_different_way(), 1);
    assert_eq!(analysis.num_test_runs_fail_same_way(), 0);
}

#[tokio::test]
async fn test_topic_branch_failure_checked_against_upstream() {
    let repo = sqlite_repo().await;
    seed_history(repo.as_ref(), "main", 1, "FPPF").await;
    let failing = npe_failure(&suite_run("feature/flush-rework", 101));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing)
        .check_vs_upstream(SUITE, "main", 8)
        .await
        .unwrap();

    assert_eq!(analysis.is_known_failure(), Some(true));
    assert_eq!(analysis.num_test_runs_checked(), 4);
    let mut similar: Vec<i64> = analysis.similar_failures().iter().map(|e| e.run_id).collect();
    similar.sort_unstable();
    assert_eq!(similar, vec![1, 4]);
    assert_eq!(analysis.mode(), "upstream");
    assert!(analysis
        .message()
        .contains("Checking regression vs upstream ci::main"));
}

#[tokio::test]
async fn test_regression_window_excludes_failing_and_later_runs() {
    // storage ignores the window entirely; the analysis must still only see runs 1-3
    let repo = Arc::new(ScriptedRepository::with_history("main", "FPPFF"));
    let failing = repo.executions[3].clone();

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert!(analysis.suite_runs_checked().iter().all(|run| run.run_id < 4));
    assert!(analysis.test_runs_checked().iter().all(|run| run.run_id < 4));
    assert_eq!(analysis.num_test_runs_checked(), 3);
    assert_eq!(analysis.similar_failures().len(), 1);
    assert_eq!(analysis.similar_failures()[0].run_id, 1);
}

#[tokio::test]
async fn test_upstream_check_on_own_branch_skips_the_failure_itself() {
    let repo = Arc::new(ScriptedRepository::with_history("main", "PPPF"));
    let failing = repo.executions[3].clone();

    let analysis = FailureAnalyser::new(repo, failing)
        .check_vs_upstream(SUITE, "main", 8)
        .await
        .unwrap();

    assert_eq!(analysis.num_test_runs_checked(), 3);
    assert_eq!(analysis.is_known_failure(), Some(false));
}

#[tokio::test]
async fn test_depth_bounds_the_window_monotonically() {
    let repo = sqlite_repo().await;
    seed_history(repo.as_ref(), "main", 1, "FPFPFPFP").await;
    let failing = npe_failure(&suite_run("main", 9));
    record(repo.as_ref(), &failing).await;

    let mut previous = 0;
    for depth in 1..=10 {
        let analysis = FailureAnalyser::new(repo.clone(), failing.clone())
            .check_regression(depth)
            .await
            .unwrap();
        let checked = analysis.num_test_runs_checked();
        assert!(analysis.suite_runs_checked().len() <= depth as usize);
        assert!(checked >= previous, "depth {depth} checked {checked} < {previous}");
        assert_eq!(checked, (depth as usize).min(8));
        previous = checked;
    }
}

#[tokio::test]
async fn test_inconclusive_comparison_is_not_a_match() {
    let repo = sqlite_repo().await;
    let first = suite_run("main", 1);
    // same message, but no stack trace or output to confirm it
    let bare = TestCaseExecution::new(&first, identity(), TestResult::Fail).with_error_details(NPE_DETAILS);
    record(repo.as_ref(), &bare).await;
    seed_history(repo.as_ref(), "main", 2, "P").await;
    let failing = npe_failure(&suite_run("main", 3));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.verdict(), Verdict::New);
    assert_eq!(analysis.num_test_runs_fail_inconclusive(), 1);
    assert_eq!(analysis.num_test_runs_fail_different_way(), 1);

    let summary = FailureAnalysisSummary::from(&analysis);
    assert_eq!(summary.summary.num_unknown_fail, 1);
    assert_eq!(summary.summary.num_diff_fail, 1);
    assert_eq!(summary.is_known_failure, Some(false));
}

#[tokio::test]
async fn test_no_history_is_indeterminate() {
    let repo = sqlite_repo().await;
    let failing = npe_failure(&suite_run("main", 1));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.verdict(), Verdict::Indeterminate);
    assert_eq!(analysis.is_known_failure(), None);
    assert_eq!(analysis.num_test_runs_checked(), 0);
    assert!(analysis.message().ends_with("No suite runs for checking found."));
}

#[tokio::test]
async fn test_suite_runs_without_the_test_are_indeterminate() {
    let repo = sqlite_repo().await;
    repo.record_suite_run(&suite_run("main", 1)).await.unwrap();
    repo.record_suite_run(&suite_run("main", 2)).await.unwrap();
    let failing = npe_failure(&suite_run("main", 3));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.is_known_failure(), None);
    assert_eq!(analysis.suite_runs_checked().len(), 2);
    assert!(analysis
        .message()
        .contains("Got 2 suite runs but no test runs for the test under check."));
    assert!(analysis.message().contains("Builds considered: [2, 1]."));
}

#[tokio::test]
async fn test_ignored_suite_runs_are_skipped() {
    let repo = sqlite_repo().await;
    let ignored = suite_run("main", 1).ignored("agent ran out of disk");
    repo.record_suite_run(&ignored).await.unwrap();
    repo.record_test_case_execution(&npe_failure(&ignored)).await.unwrap();
    seed_history(repo.as_ref(), "main", 2, "P").await;
    let failing = npe_failure(&suite_run("main", 3));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.num_test_runs_checked(), 1);
    assert_eq!(analysis.is_known_failure(), Some(false));
}

#[tokio::test]
async fn test_other_configurations_are_compared_too() {
    let repo = sqlite_repo().await;
    let run = suite_run("main", 1);
    repo.record_suite_run(&run).await.unwrap();
    let mut other_config = npe_failure(&run);
    other_config.test_config = "jdk21".to_string();
    repo.record_test_case_execution(&other_config).await.unwrap();
    let failing = npe_failure(&suite_run("main", 2));
    record(repo.as_ref(), &failing).await;

    let analysis = FailureAnalyser::new(repo, failing).check_regression(8).await.unwrap();

    assert_eq!(analysis.is_known_failure(), Some(true));
    assert_eq!(analysis.similar_failures()[0].test_config, "jdk21");
}

#[tokio::test]
async fn test_invalid_depth_fails_before_any_query() {
    let repo = Arc::new(ScriptedRepository::with_history("main", "FPPF"));
    let failing = repo.executions[3].clone();

    for depth in [0, 129] {
        let result = FailureAnalyser::new(repo.clone(), failing.clone())
            .check_regression(depth)
            .await;
        assert!(matches!(result, Err(AnalysisError::InvalidDepth { .. })));
    }
    let result = FailureAnalyser::new(repo.clone(), failing.clone())
        .with_max_depth(4)
        .check_regression(5)
        .await;
    assert!(matches!(result, Err(AnalysisError::InvalidDepth { depth: 5, max: 4 })));

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_empty_upstream_target_fails_before_any_query() {
    let repo = Arc::new(ScriptedRepository::with_history("main", "FPPF"));
    let failing = repo.executions[3].clone();

    let result = FailureAnalyser::new(repo.clone(), failing.clone())
        .check_vs_upstream(SUITE, "", 8)
        .await;
    assert!(matches!(result, Err(AnalysisError::InvalidTarget(_))));

    let result = FailureAnalyser::new(repo.clone(), failing)
        .check_vs_upstream("  ", "main", 8)
        .await;
    assert!(matches!(result, Err(AnalysisError::InvalidTarget(_))));

    assert_eq!(repo.calls(), 0);
}

#[tokio::test]
async fn test_storage_errors_propagate() {
    let mut scripted = ScriptedRepository::with_history("main", "FPPF");
    scripted.fail_executions = true;
    let repo = Arc::new(scripted);
    let failing = repo.executions[3].clone();

    let result = FailureAnalyser::new(repo, failing).check_regression(8).await;
    assert!(matches!(
        result,
        Err(AnalysisError::Storage(DomainError::DatabaseError(ref msg))) if msg == "read timeout"
    ));

    let mut scripted = ScriptedRepository::with_history("main", "FPPF");
    scripted.fail_suite_runs = true;
    let repo = Arc::new(scripted);
    let failing = repo.executions[3].clone();

    let result = FailureAnalyser::new(repo, failing)
        .check_vs_upstream(SUITE, "main", 8)
        .await;
    assert!(matches!(result, Err(AnalysisError::Storage(DomainError::DatabaseError(_)))));
}

#[tokio::test]
async fn test_stages_can_be_driven_one_by_one() {
    let repo = Arc::new(ScriptedRepository::with_history("main", "FPPF"));
    let failing = repo.executions[3].clone();

    let Progress::Continue(builds) = FailureAnalyser::new(repo, failing)
        .collect_builds(&testrecall::domain::models::CheckMode::Regression, 8)
        .await
        .unwrap()
    else {
        panic!("expected suite runs to be collected");
    };
    assert_eq!(builds.suite_runs().len(), 3);

    let Progress::Continue(test_runs) = builds.collect_test_runs().await.unwrap() else {
        panic!("expected test runs to be collected");
    };
    assert_eq!(test_runs.failed_candidates().count(), 1);

    let result = test_runs.complete(Vec::new());
    assert!(matches!(result, Err(AnalysisError::Worker(_))));
}

#[tokio::test]
async fn test_summary_projection_attaches_suite_runs() {
    let repo = sqlite_repo().await;
    let history = seed_history(repo.as_ref(), "main", 1, "FSPF").await;

    let analysis = FailureAnalyser::new(repo, history[3].clone())
        .check_regression(8)
        .await
        .unwrap();
    let summary = FailureAnalysisSummary::from(analysis);

    assert_eq!(summary.verdict, Verdict::Known);
    assert_eq!(summary.summary.num_runs, 3);
    assert_eq!(summary.summary.num_skip, 1);
    assert_eq!(summary.summary.num_pass, 1);
    assert_eq!(summary.summary.num_same_fail, 1);
    assert_eq!(summary.similar_failures.len(), 1);
    let attached = summary.similar_failures[0].suite_run.as_ref().unwrap();
    assert_eq!(attached.run_id, 1);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["verdict"], "known");
    assert_eq!(json["is_known_failure"], true);
}
