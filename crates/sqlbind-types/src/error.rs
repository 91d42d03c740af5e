//! Type conversion error types.

use thiserror::Error;

use crate::value::ValueKind;

/// Errors that can occur when reading, parsing or converting a [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// The value is not of the kind the caller asked for.
    #[error("type mismatch: expected {expected}, value is of kind {actual}")]
    TypeMismatch {
        /// Kind (or kinds) the accessor accepts.
        expected: &'static str,
        /// Kind actually stored.
        actual: ValueKind,
    },

    /// Text could not be parsed under the requested kind.
    #[error("cannot parse '{text}' as {kind}")]
    Parse {
        /// Target kind.
        kind: ValueKind,
        /// The offending text.
        text: String,
    },

    /// No column with this index or name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A NULL was read where a value was required.
    #[error("unexpected null value")]
    UnexpectedNull,
}
