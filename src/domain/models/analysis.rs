//! Failure analysis domain models.
//!
//! Similarity comparisons and analysis verdicts are both three-valued: a comparison
//! can be inconclusive and an analysis can lack history. Both are modelled as enums so
//! "cannot tell" is never mistaken for "different" or "new".

use serde::{Deserialize, Serialize};
use std::fmt;

use super::results::{TestCaseExecution, TestRunWithSuite};

/// Hard cap on the number of suite runs a single analysis may examine.
pub const MAX_ANALYSIS_DEPTH: u32 = 128;

/// Outcome of comparing two failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Similar enough to count as the same failure
    Similar,
    /// Not the same failure
    Different,
    /// Not enough signal on one side or the other
    Unknown,
}

impl Similarity {
    /// `Some(true)` similar, `Some(false)` different, `None` unknown.
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Similar,
            Some(false) => Self::Different,
            None => Self::Unknown,
        }
    }

    /// Inverse of [`from_option`](Self::from_option).
    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::Similar => Some(true),
            Self::Different => Some(false),
            Self::Unknown => None,
        }
    }

    /// Whether the comparison found the failures similar.
    pub fn is_similar(self) -> bool {
        matches!(self, Self::Similar)
    }

    /// Whether the comparison was inconclusive.
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// `Unknown` if either side is unknown, otherwise the logical AND.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Similar, Self::Similar) => Self::Similar,
            _ => Self::Different,
        }
    }
}

impl From<bool> for Similarity {
    fn from(value: bool) -> Self {
        if value {
            Self::Similar
        } else {
            Self::Different
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Similar => "similar",
            Self::Different => "different",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Whether a failure has been seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// A similar failure exists in the examined window
    Known,
    /// History exists but no similar failure was found
    New,
    /// No comparable history was available
    Indeterminate,
}

impl Verdict {
    /// Lower-case name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Known => "known",
            Self::New => "new",
            Self::Indeterminate => "indeterminate",
        }
    }

    /// `Some(true)` for known, `Some(false)` for new, `None` when indeterminate.
    pub fn is_known_failure(self) -> Option<bool> {
        match self {
            Self::Known => Some(true),
            Self::New => Some(false),
            Self::Indeterminate => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which history a failure is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckMode {
    /// Earlier runs of the same suite on the same branch
    Regression,
    /// Any runs of the given suite and branch, including later ones
    Upstream {
        /// Suite to check against
        suite: String,
        /// Branch to check against
        branch: String,
    },
}

impl CheckMode {
    /// `regression` or `upstream`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Upstream { .. } => "upstream",
        }
    }
}

/// A failed execution together with how and how deep to check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnalysisRequest {
    /// The failed execution
    pub failing: TestCaseExecution,
    /// History to check against
    pub mode: CheckMode,
    /// Number of suite runs to examine
    pub depth: u32,
}

impl FailureAnalysisRequest {
    /// Check `failing` against earlier runs of its own suite and branch.
    pub fn regression(failing: TestCaseExecution, depth: u32) -> Self {
        Self {
            failing,
            mode: CheckMode::Regression,
            depth,
        }
    }

    /// Check `failing` against runs of `suite` on `branch`.
    pub fn upstream(
        failing: TestCaseExecution,
        suite: impl Into<String>,
        branch: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            failing,
            mode: CheckMode::Upstream {
                suite: suite.into(),
                branch: branch.into(),
            },
            depth,
        }
    }
}

/// Counts over the executions examined by one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisCounts {
    /// Total number of executions found and checked
    pub num_runs: usize,
    /// Failures similar to the one under check
    pub num_same_fail: usize,
    /// Other failures
    pub num_diff_fail: usize,
    /// Passing executions
    pub num_pass: usize,
    /// Skipped executions
    pub num_skip: usize,
    /// Failures whose comparison was inconclusive; included in `num_diff_fail`
    pub num_unknown_fail: usize,
}

/// Externally consumed projection of a finished analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnalysisSummary {
    /// The failed execution that was checked
    pub test_case: TestCaseExecution,
    /// `regression` or `upstream`
    pub mode: String,
    /// Known, new or indeterminate
    pub verdict: Verdict,
    /// `true` known failure, `false` new failure, `null` cannot say
    pub is_known_failure: Option<bool>,
    /// Counts over the examined executions
    pub summary: AnalysisCounts,
    /// Similar failures with their suite runs, newest first
    pub similar_failures: Vec<TestRunWithSuite>,
    /// Analysis trace, one step per line
    pub message: String,
}
