//! # sqlbind-client
//!
//! Named-parameter SQL statements over any driver that speaks positional
//! markers.
//!
//! Statements are written with `:name` placeholders and `$token` literal
//! sites, kept in per-caller catalogs, and prepared lazily against a
//! [`Connection`]. The rewritten SQL and driver handle are cached per
//! connection, so rebinding scalar values and executing again costs one round
//! trip.
//!
//! ## Features
//!
//! - **Named placeholders**: `:id` may appear any number of times
//! - **Collection binds**: `in (:ids)` expands to one marker per element
//! - **Literal substitution**: `$orderclause` and friends, applied before binding
//! - **Statement catalogs**: JSON documents loaded once per caller type
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlbind_client::{DirectorySource, StatementRegistry};
//!
//! struct OrderDao;
//!
//! let registry = StatementRegistry::new(DirectorySource::new("sql"));
//!
//! let mut stmt = registry.lookup::<OrderDao>("openOrders")?;
//! stmt.bind("customer", 42)?
//!     .bind_seq("status", ["NEW", "HELD"])?
//!     .bind_literal("orderclause", "created desc")?;
//!
//! for row in stmt.execute_query(&mut conn).await? {
//!     let id: i64 = row.get_by_name("id")?;
//!     println!("order {id}");
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod binding;
pub mod catalog;
pub mod connection;
pub mod error;
pub mod instrumentation;
pub mod row;
pub mod statement;

// Re-export commonly used types
pub use binding::{BindMap, Binding};
pub use catalog::{
    CatalogDocument, CatalogError, CatalogSource, DirectorySource, MemorySource, RegistryConfig,
    StatementCatalog, StatementRegistry, Template, caller_name,
};
pub use connection::{
    Concurrency, Connection, ConnectionId, DriverError, ExecuteResult, ResultSetMode, Scroll,
    StatementHandle, close_quietly, commit_and_close, rollback_and_close,
};
pub use error::{Error, Result};
pub use row::{Column, ResultSet, Row};
pub use sqlbind_template::{PlaceholderStyle, tokens};
pub use sqlbind_types::{DateFormat, FromValue, TypeError, Value, ValueKind};
pub use statement::BoundStatement;
