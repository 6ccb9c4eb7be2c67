//! Pairwise comparison of two failed test case executions.
//!
//! Exact comparison is useless for CI output: timestamps, addresses and line numbers
//! drift between runs that fail for the same reason. Text fields must pass both an
//! edit-distance gate and a TF-IDF cosine gate; stack traces must have the same shape
//! line for line; stdout/stderr are a looser fallback signal.

use tracing::{debug, trace};

use crate::domain::models::{Similarity, SimilarityThresholds, TestCaseExecution};
use crate::services::text_metrics::{
    cosine_ratio, levenshtein_ratio, normalize_stacktrace_line, sequence_ratio, split_lines,
};

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Decides whether two failures represent the same underlying problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityChecker {
    thresholds: SimilarityThresholds,
}

impl SimilarityChecker {
    /// Checker using the given thresholds.
    pub fn new(thresholds: SimilarityThresholds) -> Self {
        Self { thresholds }
    }

    /// The thresholds this checker compares with.
    pub fn thresholds(&self) -> &SimilarityThresholds {
        &self.thresholds
    }

    /// Compare `candidate` against `reference`.
    ///
    /// The stack trace verdict wins when it is decisive and the error details do not
    /// disagree. Otherwise stdout and stderr decide together, and an inconclusive
    /// stream comparison makes the whole result inconclusive.
    pub fn is_similar(&self, reference: &TestCaseExecution, candidate: &TestCaseExecution) -> Similarity {
        let details = self.is_text_similar(
            reference.error_details.as_deref(),
            candidate.error_details.as_deref(),
        );
        let stacktrace = self.is_stacktrace_similar(
            reference.error_stacktrace.as_deref(),
            candidate.error_stacktrace.as_deref(),
        );

        if !stacktrace.is_unknown() && details != Similarity::Different {
            debug!(
                candidate = %candidate,
                %details,
                %stacktrace,
                "similarity decided by stack trace"
            );
            return stacktrace;
        }

        let stdout = self.is_out_stream_similar(reference.stdout.as_deref(), candidate.stdout.as_deref());
        let stderr = self.is_out_stream_similar(reference.stderr.as_deref(), candidate.stderr.as_deref());
        let result = stdout.and(stderr);
        debug!(
            candidate = %candidate,
            %details,
            %stacktrace,
            %stdout,
            %stderr,
            %result,
            "similarity decided by output streams"
        );
        result
    }

    /// Edit-distance and cosine gates over two short texts.
    pub fn is_text_similar(&self, a: Option<&str>, b: Option<&str>) -> Similarity {
        let (Some(a), Some(b)) = (non_empty(a), non_empty(b)) else {
            return Similarity::Unknown;
        };

        let levenshtein = levenshtein_ratio(a, b);
        if levenshtein < self.thresholds.levenshtein_ratio {
            trace!(levenshtein, "text rejected by edit distance");
            return Similarity::Different;
        }

        let cosine = cosine_ratio(a, b);
        if cosine < self.thresholds.cosine_ratio {
            trace!(levenshtein, cosine, "text rejected by cosine similarity");
            return Similarity::Different;
        }

        Similarity::Similar
    }

    /// Line-aligned comparison of two stack traces.
    ///
    /// A different number of lines means a different code path. Differing lines are
    /// normalised and must then be similar as text.
    pub fn is_stacktrace_similar(&self, a: Option<&str>, b: Option<&str>) -> Similarity {
        let (Some(a), Some(b)) = (non_empty(a), non_empty(b)) else {
            return Similarity::Unknown;
        };

        let lines_a = split_lines(a);
        let lines_b = split_lines(b);
        if lines_a.len() != lines_b.len() {
            trace!(left = lines_a.len(), right = lines_b.len(), "stack trace line counts differ");
            return Similarity::Different;
        }

        for (line_a, line_b) in lines_a.iter().zip(&lines_b) {
            if line_a == line_b {
                continue;
            }
            let norm_a = normalize_stacktrace_line(line_a);
            let norm_b = normalize_stacktrace_line(line_b);
            if !self.is_text_similar(Some(&norm_a), Some(&norm_b)).is_similar() {
                trace!(left = %line_a, right = %line_b, "stack trace lines differ");
                return Similarity::Different;
            }
        }

        Similarity::Similar
    }

    /// Character-level sequence ratio over two output streams.
    pub fn is_out_stream_similar(&self, a: Option<&str>, b: Option<&str>) -> Similarity {
        let (Some(a), Some(b)) = (non_empty(a), non_empty(b)) else {
            return Similarity::Unknown;
        };
        Similarity::from(sequence_ratio(a, b) >= self.thresholds.stream_ratio)
    }
}
