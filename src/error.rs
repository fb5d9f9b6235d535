//! Crate-wide error types.
//!
//! Every error here is a synchronous, non-retryable contract violation
//! raised at the offending call. The core performs no I/O of its own;
//! engine failures pass through unchanged via [`SqlFrameError::Engine`].

use crate::dtype::DType;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SqlFrameError>;

/// Errors raised by expression construction, compilation and frame operations.
#[derive(Debug, thiserror::Error)]
pub enum SqlFrameError {
    /// Placeholder/argument count mismatch in `Expression::construct`.
    #[error("template has {expected} placeholder(s) but {provided} argument(s) were provided")]
    ArgumentCount { expected: usize, provided: usize },

    /// Rendering reached a token that should have been resolved or
    /// substituted earlier. Always a bug in the calling layer.
    #[error("unresolved reference during rendering: {0}")]
    UnresolvedReference(String),

    /// Requested dtype conversion is not in the allow-list of the target type.
    #[error("cannot convert {from} to {to}")]
    TypeConversion { from: DType, to: DType },

    /// An aggregate function was applied to an already-aggregated column.
    #[error(
        "cannot apply aggregate function '{function}' to column '{column}': \
         the column is already aggregated; call materialize() first"
    )]
    AlreadyAggregated { column: String, function: String },

    /// Columns from two frames with differing lineage cannot be recombined.
    #[error("cannot combine frames: {reason}")]
    IncompatibleFrame { reason: String },

    /// A well-defined but deliberately unimplemented operation or parameter.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A named column does not exist in the frame.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Operator applied to a dtype outside its whitelist.
    #[error("operation '{operation}' not supported between {left} and {right}")]
    InvalidOperand {
        operation: String,
        left: DType,
        right: DType,
    },

    /// Failure reported by the external engine while executing SQL.
    #[error("engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Canonical serialization for content hashing failed. Internal.
    #[error("internal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
