//! # sqlbind-testing
//!
//! Test infrastructure for the sqlbind workspace.
//!
//! [`MockConnection`] implements [`Connection`](sqlbind_client::Connection)
//! in memory and records every call; [`MockFactory`] hands such connections
//! to a pool. The integration tests of the workspace live in this crate's
//! `tests/` directory.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlbind_client::BoundStatement;
//! use sqlbind_testing::MockConnection;
//!
//! let mut conn = MockConnection::new();
//! let recorder = conn.recorder();
//!
//! let mut stmt = BoundStatement::from_sql("find", "select * from t where id = :id");
//! stmt.bind("id", 7)?;
//! stmt.execute_query(&mut conn).await?;
//!
//! assert_eq!(recorder.prepared_sql(), ["select * from t where id = ?"]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::{MockConnection, MockError, MockEvent, MockFactory, MockRecorder};

/// Install a `tracing` subscriber writing to the test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}
