//! Domain layer for testrecall
//!
//! This module contains the test result models, the analysis models and the port
//! traits the storage layer implements.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AnalysisError, DomainError, DomainResult};
