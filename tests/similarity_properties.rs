//! Property tests for the similarity checker and its text metrics.

use proptest::prelude::*;
use testrecall::domain::models::{Similarity, SuiteRun, TestCaseExecution, TestCaseIdentity, TestResult};
use testrecall::services::text_metrics::{cosine_ratio, levenshtein_ratio, sequence_ratio};
use testrecall::services::SimilarityChecker;

fn failure(
    details: Option<String>,
    stacktrace: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
) -> TestCaseExecution {
    let run = SuiteRun::new("acme", "db", "ci", "main", 1);
    let mut execution = TestCaseExecution::new(&run, TestCaseIdentity::new("org.acme", "T", "t"), TestResult::Fail);
    execution.error_details = details;
    execution.error_stacktrace = stacktrace;
    execution.stdout = stdout;
    execution.stderr = stderr;
    execution
}

fn text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z0-9 .:()\\n]{0,120}")
}

proptest! {
    /// Property: a failure is never different from itself
    #[test]
    fn prop_failure_never_differs_from_itself(
        details in text(),
        stacktrace in text(),
        stdout in text(),
        stderr in text(),
    ) {
        let execution = failure(details, stacktrace.clone(), stdout, stderr);
        let similarity = SimilarityChecker::default().is_similar(&execution, &execution);

        prop_assert_ne!(similarity, Similarity::Different);
        if stacktrace.is_some_and(|s| !s.is_empty()) {
            prop_assert_eq!(similarity, Similarity::Similar);
        }
    }

    /// Property: every ratio is within [0, 1] and 1 for identical input
    #[test]
    fn prop_ratios_are_bounded(a in "[a-z ]{0,60}", b in "[a-z ]{0,60}") {
        for ratio in [levenshtein_ratio(&a, &b), cosine_ratio(&a, &b), sequence_ratio(&a, &b)] {
            prop_assert!((0.0..=1.0 + 1e-9).contains(&ratio), "ratio {} out of range", ratio);
        }
        prop_assert!((levenshtein_ratio(&a, &a) - 1.0).abs() < 1e-9);
        prop_assert!((sequence_ratio(&a, &a) - 1.0).abs() < 1e-9);
    }

    /// Property: edit and cosine ratios do not depend on argument order
    #[test]
    fn prop_edit_and_cosine_ratios_are_symmetric(a in "[a-z]{0,40}", b in "[a-z]{0,40}") {
        prop_assert!((levenshtein_ratio(&a, &b) - levenshtein_ratio(&b, &a)).abs() < 1e-9);
        prop_assert!((cosine_ratio(&a, &b) - cosine_ratio(&b, &a)).abs() < 1e-9);
    }
}
