//! Port trait definitions (Hexagonal Architecture)
//!
//! - TestHistoryRepository: storage of suite runs and test case executions, including
//!   the windowed queries the failure analysis depends on
//!
//! These traits keep the analysis independent of the storage engine.

pub mod test_history_repository;

pub use test_history_repository::{SuiteRunKey, SuiteRunWindow, TestCaseQuery, TestHistoryRepository};
