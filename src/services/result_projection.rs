//! Projection of a finished analysis into the summary handed to callers.

use crate::domain::models::{AnalysisCounts, FailureAnalysisSummary, TestRunWithSuite};
use crate::services::failure_analyser::FailureAnalysis;

impl From<&FailureAnalysis> for AnalysisCounts {
    fn from(analysis: &FailureAnalysis) -> Self {
        Self {
            num_runs: analysis.num_test_runs_checked(),
            num_same_fail: analysis.num_test_runs_fail_same_way(),
            num_diff_fail: analysis.num_test_runs_fail_different_way(),
            num_pass: analysis.num_test_runs_pass(),
            num_skip: analysis.num_test_runs_skip(),
            num_unknown_fail: analysis.num_test_runs_fail_inconclusive(),
        }
    }
}

impl From<&FailureAnalysis> for FailureAnalysisSummary {
    fn from(analysis: &FailureAnalysis) -> Self {
        Self {
            test_case: analysis.failing().clone(),
            mode: analysis.mode().to_string(),
            verdict: analysis.verdict(),
            is_known_failure: analysis.is_known_failure(),
            summary: AnalysisCounts::from(analysis),
            similar_failures: TestRunWithSuite::combine(
                analysis.similar_failures(),
                analysis.suite_runs_checked(),
            ),
            message: analysis.message(),
        }
    }
}

impl From<FailureAnalysis> for FailureAnalysisSummary {
    fn from(analysis: FailureAnalysis) -> Self {
        Self::from(&analysis)
    }
}
