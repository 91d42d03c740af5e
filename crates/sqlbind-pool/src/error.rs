//! Pool error types.

use std::path::PathBuf;
use std::time::Duration;

use sqlbind_client::DriverError;
use thiserror::Error;

/// Errors that can occur while configuring a pool or checking out a
/// connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool has been closed.
    #[error("connection pool is closed")]
    PoolClosed,

    /// No connection became available in time.
    #[error("timed out after {timeout:?} waiting for a connection to '{datasource}'")]
    Timeout {
        /// Datasource name.
        datasource: String,
        /// The configured acquisition timeout.
        timeout: Duration,
    },

    /// No pool is configured under this name.
    #[error("unknown datasource '{0}'")]
    UnknownDataSource(String),

    /// The factory failed to open a connection.
    #[error("cannot connect to '{datasource}': {source}")]
    Connection {
        /// Datasource name.
        datasource: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// Invalid or incomplete configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// A configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl PoolError {
    /// Whether waiting and trying again may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}
