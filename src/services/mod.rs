//! Service layer: similarity comparison, history collection, failure analysis and
//! the history use cases built on them.

pub mod batch_analyser;
pub mod failure_analyser;
pub mod history_collector;
pub mod result_projection;
pub mod results_service;
pub mod similarity_checker;
pub mod text_metrics;

pub use batch_analyser::BatchAnalyser;
pub use failure_analyser::{
    CollectedBuilds, CollectedTestRuns, FailureAnalyser, FailureAnalysis, Progress,
};
pub use history_collector::HistoryWindowCollector;
pub use results_service::{CheckRequest, ImportOutcome, ResultsService, TestFilter};
pub use similarity_checker::SimilarityChecker;
