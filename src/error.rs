//! Error types for schedule generation and run persistence.

use crate::runs::store::StoreError;
use crate::runs::types::NewRun;
use crate::schedule::rule::RuleError;

/// Top-level error type for the run-tracking core.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A template's schedule rule is incomplete or inconsistent for its kind.
    #[error("rule validation error: {0}")]
    Rule(#[from] RuleError),

    /// The run store rejected a read or write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Inverted, empty, or oversized date range.
    #[error("range error: {0}")]
    Range(String),

    /// A batch insert failed part-way through a generation pass.
    ///
    /// Batches submitted before the failure stay committed. `remaining`
    /// holds every run that was not committed, starting with the failed
    /// batch, so the caller can retry or abort.
    #[error("batch insert failed after {committed} run(s), {} pending: {source}", .remaining.len())]
    BatchInsert {
        /// Runs committed by earlier batches in the same pass.
        committed: usize,
        /// Runs from the failed batch onwards.
        remaining: Vec<NewRun>,
        /// Store error reported for the failed batch.
        source: StoreError,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed data at the ingestion boundary.
    #[error("import error: {0}")]
    Import(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ControlError>;
