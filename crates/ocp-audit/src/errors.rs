use ocp_core::SchemaError;
use thiserror::Error;

/// Errors returned by a [`DataSource`](crate::DataSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No source holds the entry.
    #[error("entry not found: {0}")]
    NotFound(String),
    /// The source could not be reached or read.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The source does not implement the operation.
    #[error("operation not supported by source: {0}")]
    Unsupported(&'static str),
}

/// Errors raised by auditor construction and batch setup.
///
/// Per-entry failures never surface here; they are recorded on the
/// [`EntryReport`](crate::EntryReport).
#[derive(Error, Debug)]
pub enum AuditError {
    /// Listing entry ids for a batch failed.
    #[error("listing failed: {0}")]
    Source(#[from] SourceError),
    /// The compliance schema could not be compiled.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// The signature pattern is not a valid regular expression.
    #[error("invalid signature pattern: {0}")]
    SignaturePattern(#[from] regex::Error),
    /// Audit window name not one of `7d`, `30d`, `90d`, `1y`.
    #[error("unknown audit window: {0}")]
    UnknownWindow(String),
    /// A report sink rejected output.
    #[error("report sink error: {0}")]
    Sink(String),
}
