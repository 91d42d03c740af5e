//! The driver connection seam.
//!
//! The statement layer never opens, pools or owns connections. It borrows a
//! `&mut dyn Connection` (or any `C: Connection`) for the duration of a single
//! execute call and remembers only the connection's [`ConnectionId`] and the
//! driver's opaque [`StatementHandle`] between calls.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sqlbind_template::PlaceholderStyle;
use sqlbind_types::Value;

use crate::row::ResultSet;

/// Opaque error returned by a driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process-unique identity of a connection.
///
/// Two handles are the same connection exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Driver-assigned handle of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub u64);

/// Cursor scrollability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scroll {
    /// Forward only.
    ForwardOnly,
    /// Scrollable, not sensitive to concurrent changes.
    Insensitive,
    /// Scrollable, sensitive to concurrent changes.
    Sensitive,
}

/// Cursor concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concurrency {
    /// Read only.
    ReadOnly,
    /// Updatable.
    Updatable,
}

/// Result-set mode requested when preparing a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultSetMode {
    /// Driver default.
    #[default]
    Unspecified,
    /// Explicit scrollability and concurrency.
    Explicit {
        /// Scrollability.
        scroll: Scroll,
        /// Concurrency.
        concurrency: Concurrency,
    },
}

impl ResultSetMode {
    /// Explicit mode.
    #[must_use]
    pub fn new(scroll: Scroll, concurrency: Concurrency) -> Self {
        Self::Explicit {
            scroll,
            concurrency,
        }
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteResult {
    /// Number of rows inserted, updated or deleted.
    pub rows_affected: u64,
}

/// A live database connection as seen by the statement layer.
///
/// Parameters are always passed positionally, in marker order, and are never
/// null.
#[async_trait]
pub trait Connection: Send {
    /// Identity of this connection.
    fn id(&self) -> ConnectionId;

    /// The positional marker syntax this driver expects.
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    /// Prepare `sql` and return a handle valid until [`unprepare`](Self::unprepare)
    /// or until the connection is closed.
    async fn prepare(
        &mut self,
        sql: &str,
        mode: ResultSetMode,
    ) -> Result<StatementHandle, DriverError>;

    /// Release a prepared statement.
    async fn unprepare(&mut self, _handle: StatementHandle) -> Result<(), DriverError> {
        Ok(())
    }

    /// Execute a prepared statement that does not return rows.
    async fn execute(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ExecuteResult, DriverError>;

    /// Execute a prepared statement and collect its rows.
    async fn query(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ResultSet, DriverError>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), DriverError>;

    /// Cheap liveness check, used by pools before handing a connection out.
    async fn is_valid(&mut self) -> bool {
        true
    }
}

/// Close a connection, logging instead of returning any failure.
pub async fn close_quietly<C: Connection + ?Sized>(conn: &mut C) {
    if let Err(e) = conn.close().await {
        tracing::warn!(connection = %conn.id(), error = %e, "failed to close connection");
    }
}

/// Commit and close a connection, logging instead of returning any failure.
///
/// The connection is closed even if the commit fails.
pub async fn commit_and_close<C: Connection + ?Sized>(conn: &mut C) {
    if let Err(e) = conn.commit().await {
        tracing::warn!(connection = %conn.id(), error = %e, "commit failed");
    }
    close_quietly(conn).await;
}

/// Roll back and close a connection, logging instead of returning any failure.
pub async fn rollback_and_close<C: Connection + ?Sized>(conn: &mut C) {
    if let Err(e) = conn.rollback().await {
        tracing::warn!(connection = %conn.id(), error = %e, "rollback failed");
    }
    close_quietly(conn).await;
}
