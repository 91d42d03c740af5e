//! Template-level error types.

use thiserror::Error;

/// Errors that can occur while rewriting a SQL template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RewriteError {
    /// A placeholder has no binding.
    #[error("bind variable '{name}' not bound")]
    Unbound {
        /// Placeholder name without the leading `:`.
        name: String,
    },

    /// A sequence binding has no elements, so no marker can be emitted.
    #[error("bind variable '{name}' is bound to an empty sequence")]
    EmptySequence {
        /// Placeholder name without the leading `:`.
        name: String,
    },

    /// A name that can never appear as a placeholder.
    #[error("invalid bind variable name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}
