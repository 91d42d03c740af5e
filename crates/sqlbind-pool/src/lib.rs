//! # sqlbind-pool
//!
//! Async connection pooling per named datasource.
//!
//! ## Features
//!
//! - Configurable min/max pool sizes
//! - Connection timeout and idle timeout
//! - Validation of idle connections on checkout
//! - Datasources configured from a properties file
//! - Metrics for observability
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlbind_pool::{DataSources, DataSourcesConfig};
//!
//! let config = DataSourcesConfig::from_file("jdbc.properties")?;
//! let datasources = DataSources::new(config, MyDriverFactory::default()).await?;
//!
//! let mut stmt = registry.lookup::<OrderDao>("openOrders")?;
//! stmt.bind("customer", 42)?;
//!
//! // Picks the pool named by the statement's catalog entry
//! let mut conn = datasources.acquire_for(&stmt).await?;
//! let rows = stmt.execute_query(&mut conn).await?;
//!
//! // Check pool status
//! let status = datasources.pool("main").map(|p| p.status());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod datasource;
pub mod error;
pub mod pool;

// Configuration
pub use config::PoolConfig;
pub use datasource::{ConnectionFactory, DataSourceConfig, DataSources, DataSourcesConfig};

// Error types
pub use error::PoolError;

// Pool types
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus, PooledConnection};
