//! Domain errors for testrecall.

use thiserror::Error;

use super::models::MAX_ANALYSIS_DEPTH;

/// Errors raised by storage and history operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Suite run not found: {suite}::{run_id}")]
    SuiteRunNotFound { suite: String, run_id: i64 },

    #[error("Suite run {key} exists on several branches ({branches}); name the branch")]
    AmbiguousSuiteRun { key: String, branches: String },

    #[error("Test case execution not found: {0}")]
    TestCaseExecutionNotFound(String),

    #[error("Exactly one test case execution expected for {identity} but found {count}")]
    AmbiguousTestCaseExecution { identity: String, count: usize },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for storage and validation.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors raised by a failure analysis.
///
/// Precondition errors are returned before any query is issued. Storage errors are
/// passed through unchanged and leave no partial result behind.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid depth {depth}: must be between 1 and {max}")]
    InvalidDepth { depth: u32, max: u32 },

    #[error("Invalid check target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Storage(#[from] DomainError),

    #[error("Comparison worker failed: {0}")]
    Worker(String),
}

impl AnalysisError {
    /// Check `depth` against `1..=max`, where `max` never exceeds the hard cap.
    pub fn check_depth(depth: u32, max: u32) -> Result<(), Self> {
        let max = max.min(MAX_ANALYSIS_DEPTH);
        if depth == 0 || depth > max {
            return Err(Self::InvalidDepth { depth, max });
        }
        Ok(())
    }
}

/// Result type for failure analysis.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
