//! Benchmarks for failure comparison and history analysis.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use testrecall::adapters::sqlite::{create_migrated_test_pool, SqliteTestHistoryRepository};
use testrecall::domain::models::{SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult};
use testrecall::domain::ports::TestHistoryRepository;
use testrecall::services::text_metrics::{cosine_ratio, sequence_ratio};
use testrecall::services::{FailureAnalyser, SimilarityChecker};
use tokio::runtime::Runtime;

fn stacktrace(shift: usize) -> String {
    let mut lines = vec!["java.lang.IllegalStateException: Pool closed".to_string()];
    for frame in 0..40 {
        lines.push(format!(
            "    at org.acme.storage.Frame{frame}.call(Frame{frame}.java:{})",
            10 + frame + shift
        ));
    }
    lines.join("\n")
}

fn failure(run: &SuiteRun, shift: usize) -> TestCaseExecution {
    TestCaseExecution::new(run, TestCaseIdentity::new("org.acme", "PoolTest", "take"), TestResult::Fail)
        .with_error_details("java.lang.IllegalStateException: Pool closed while 3 requests were pending")
        .with_stacktrace(stacktrace(shift))
        .with_stdout("INFO  [main] 2024-05-01 12:00:00,914 Pool.java:208 - Draining connections\n".repeat(20))
}

fn bench_is_similar(c: &mut Criterion) {
    let run = SuiteRun::new("acme", "db", "ci", "main", 1);
    let reference = failure(&run, 0);
    let shifted = failure(&run, 3);
    let checker = SimilarityChecker::default();

    c.bench_function("is_similar_shifted_stacktrace", |b| {
        b.iter(|| checker.is_similar(black_box(&reference), black_box(&shifted)))
    });
}

fn bench_text_metrics(c: &mut Criterion) {
    let a = stacktrace(0);
    let b = stacktrace(7);

    c.bench_function("cosine_ratio_stacktrace", |bench| {
        bench.iter(|| cosine_ratio(black_box(&a), black_box(&b)))
    });
    c.bench_function("sequence_ratio_stacktrace", |bench| {
        bench.iter(|| sequence_ratio(black_box(&a), black_box(&b)))
    });
}

fn bench_check_regression(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (repo, failing) = rt.block_on(async {
        let repo = Arc::new(SqliteTestHistoryRepository::new(create_migrated_test_pool().await.unwrap()));
        let mut failing = None;
        for run_id in 1..=32 {
            let run = SuiteRun::new("acme", "db", "ci", "main", run_id);
            repo.record_suite_run(&run).await.unwrap();
            let execution = failure(&run, run_id as usize % 3);
            repo.record_test_case_execution(&execution).await.unwrap();
            failing = Some(execution);
        }
        (repo, failing.unwrap())
    });

    c.bench_function("check_regression_depth_16", |b| {
        b.to_async(&rt).iter(|| {
            let analyser = FailureAnalyser::new(repo.clone(), failing.clone());
            async move { analyser.check_regression(16).await.unwrap() }
        })
    });
}

criterion_group!(benches, bench_is_similar, bench_text_metrics, bench_check_regression);
criterion_main!(benches);
