use thiserror::Error;

/// Errors raised while loading or compiling a schema.
///
/// Record-level findings are never errors; they are
/// [`Violation`](crate::Violation)s collected into a
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A declared pattern is not a valid regular expression.
    #[error("invalid pattern for {field}: {source}")]
    InvalidPattern {
        /// Field the pattern applies to.
        field: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
    /// A range rule with `min > max` or a non-finite bound.
    #[error("invalid range for {field}: [{min}, {max}]")]
    InvalidRange {
        /// Field the range applies to.
        field: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// No schema is declared for the record type.
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),
    /// Schema configuration could not be parsed.
    #[error("schema parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Schema configuration could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
