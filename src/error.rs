//! Error types for workitem-batch

use crate::types::SubmissionSummary;
use thiserror::Error;

/// Crate-wide error type
///
/// Per-record remote failures are not errors at this level: they are carried
/// as [`crate::types::FailureCause`] inside each outcome. Only conditions that
/// stop a whole batch (or never let it start) surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unparseable configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed TOML config file
    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction failure
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Input rows that could not be turned into records
    #[error("{count} input row(s) could not be parsed")]
    InputRows {
        /// Number of rejected rows
        count: usize,
    },

    /// Records failed validation and the batch was not allowed to continue
    #[error("{invalid} record(s) failed validation")]
    Validation {
        /// Number of invalid records
        invalid: usize,
        /// One line per problem, prefixed with the record's row
        details: Vec<String>,
    },

    /// Batch was handed no records
    #[error("record batch is empty")]
    EmptyBatch,

    /// Every record was filtered out before submission
    #[error("no eligible records left to submit")]
    NoEligibleRecords,

    /// Some records failed and continue-on-error is off
    #[error("batch failed: {} of {} record(s) failed", .0.failed, .0.total)]
    BatchFailed(Box<SubmissionSummary>),

    /// Invariant violation inside the engine
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
