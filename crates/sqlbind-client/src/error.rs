//! Client error types.

use sqlbind_template::RewriteError;
use sqlbind_types::TypeError;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::connection::DriverError;

/// Errors raised while binding, preparing or executing a statement, or while
/// looking one up in a catalog.
///
/// Every variant that concerns a statement carries its id; bind errors carry
/// the variable name and driver errors the fully rewritten SQL.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A placeholder has no binding.
    #[error("statement '{statement}': bind variable '{name}' not bound")]
    UnboundVariable {
        /// Statement id.
        statement: String,
        /// Variable name.
        name: String,
    },

    /// A value of a kind the binder cannot handle.
    #[error("statement '{statement}': cannot bind '{name}': {source}")]
    TypeMismatch {
        /// Statement id.
        statement: String,
        /// Variable name.
        name: String,
        /// Underlying type error.
        #[source]
        source: TypeError,
    },

    /// Attempt to bind a null value.
    #[error("statement '{statement}': attempt to bind null value to '{name}'")]
    NullBindRejected {
        /// Statement id.
        statement: String,
        /// Variable name.
        name: String,
    },

    /// A sequence binding with no elements.
    #[error("statement '{statement}': bind variable '{name}' is bound to an empty sequence")]
    EmptySequence {
        /// Statement id.
        statement: String,
        /// Variable name.
        name: String,
    },

    /// A bind or literal name that can never match the template.
    #[error("statement '{statement}': invalid bind name '{name}'")]
    InvalidBindName {
        /// Statement id.
        statement: String,
        /// The rejected name.
        name: String,
    },

    /// The template could not be rewritten for a reason not covered by the
    /// bind errors above.
    #[error("statement '{statement}': {source}")]
    Rewrite {
        /// Statement id.
        statement: String,
        /// Rewrite error.
        #[source]
        source: RewriteError,
    },

    /// The driver failed to prepare or execute the statement.
    #[error("statement '{statement}' failed: {source} [SQL: {sql}]")]
    Driver {
        /// Statement id.
        statement: String,
        /// SQL text as sent to the driver.
        sql: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// No statement with this id in the caller's catalog.
    #[error("statement '{statement}' not found in catalog '{catalog}'")]
    UnknownStatement {
        /// Catalog (caller) name.
        catalog: String,
        /// Requested statement id.
        statement: String,
    },

    /// The caller's catalog could not be loaded (strict registries only).
    #[error("catalog '{catalog}' could not be loaded: {source}")]
    Catalog {
        /// Catalog (caller) name.
        catalog: String,
        /// Load error.
        #[source]
        source: CatalogError,
    },
}

impl Error {
    /// The statement id this error concerns, if any.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::UnboundVariable { statement, .. }
            | Self::TypeMismatch { statement, .. }
            | Self::NullBindRejected { statement, .. }
            | Self::EmptySequence { statement, .. }
            | Self::InvalidBindName { statement, .. }
            | Self::Rewrite { statement, .. }
            | Self::Driver { statement, .. }
            | Self::UnknownStatement { statement, .. } => Some(statement),
            Self::Catalog { .. } => None,
        }
    }

    /// The bind variable this error concerns, if any.
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::UnboundVariable { name, .. }
            | Self::TypeMismatch { name, .. }
            | Self::NullBindRejected { name, .. }
            | Self::EmptySequence { name, .. }
            | Self::InvalidBindName { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The rewritten SQL, for driver failures.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Driver { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Whether the error came from the driver rather than from binding.
    #[must_use]
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

/// Result type for client operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
