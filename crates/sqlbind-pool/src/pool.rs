//! Connection pool implementation.
//!
//! One [`Pool`] serves one datasource. A semaphore with `max_connections`
//! permits bounds the connections in use; each [`PooledConnection`] holds a
//! permit and gives it back, together with the connection, when dropped.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlbind_client::{
    Connection, ConnectionId, DriverError, ExecuteResult, PlaceholderStyle, ResultSet,
    ResultSetMode, StatementHandle, Value,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::config::PoolConfig;
use crate::datasource::{ConnectionFactory, DataSourceConfig};
use crate::error::PoolError;

/// A connection pool for one datasource.
///
/// # Example
///
/// ```rust,ignore
/// use sqlbind_pool::{Pool, PoolConfig};
///
/// let pool = Pool::builder(factory, datasource)
///     .min_connections(2)
///     .max_connections(20)
///     .build()
///     .await?;
///
/// let mut conn = pool.get().await?;
/// stmt.execute(&mut *conn).await?;
/// // Connection returns to the pool on drop
/// ```
pub struct Pool<F: ConnectionFactory> {
    factory: Arc<F>,
    inner: Arc<PoolInner<F::Connection>>,
}

struct PoolInner<C> {
    /// Pool configuration.
    config: PoolConfig,

    /// Datasource this pool connects to.
    datasource: DataSourceConfig,

    /// Whether the pool is closed.
    closed: AtomicBool,

    /// One permit per connection that may be checked out.
    slots: Arc<Semaphore>,

    /// Connections waiting to be reused, oldest first.
    idle: Mutex<VecDeque<IdleConnection<C>>>,

    /// Open connections, idle and checked out.
    open: AtomicU32,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

struct IdleConnection<C> {
    conn: C,
    since: Instant,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Total connections created.
    connections_created: u64,
    /// Total connections closed.
    connections_closed: u64,
    /// Total successful checkouts.
    checkouts_successful: u64,
    /// Total failed checkouts (timeouts, errors).
    checkouts_failed: u64,
    /// Total health checks performed.
    health_checks_performed: u64,
    /// Total health check failures.
    health_checks_failed: u64,
}

impl<C> PoolInner<C> {
    fn name(&self) -> &str {
        &self.datasource.name
    }

    fn checkout_failed(&self) {
        self.metrics.lock().checkouts_failed += 1;
    }

    fn health_checked(&self, valid: bool) {
        let mut metrics = self.metrics.lock();
        metrics.health_checks_performed += 1;
        if !valid {
            metrics.health_checks_failed += 1;
        }
    }

    fn forget(&self, count: u32) {
        self.open.fetch_sub(count, Ordering::AcqRel);
        self.metrics.lock().connections_closed += u64::from(count);
    }

    /// Take the freshest idle connection that has not outlived the idle
    /// timeout. Expired ones are returned for closing.
    fn take_idle(&self) -> (Option<C>, Vec<C>) {
        let mut idle = self.idle.lock();
        let mut expired = Vec::new();
        while let Some(entry) = idle.pop_back() {
            if entry.since.elapsed() > self.config.idle_timeout {
                expired.push(entry.conn);
            } else {
                return (Some(entry.conn), expired);
            }
        }
        (None, expired)
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder(factory: Arc<F>, datasource: DataSourceConfig) -> PoolBuilder<F> {
        PoolBuilder::new(factory, datasource)
    }

    /// Create a pool and open `min_connections` connections.
    ///
    /// Failing to open the initial connections is logged, not fatal: the pool
    /// opens connections on demand afterwards.
    pub async fn new(
        config: PoolConfig,
        factory: Arc<F>,
        datasource: DataSourceConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            slots: Arc::new(Semaphore::new(config.max_connections as usize)),
            config,
            datasource,
            closed: AtomicBool::new(false),
            idle: Mutex::new(VecDeque::new()),
            open: AtomicU32::new(0),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
        });
        let pool = Self { factory, inner };

        for _ in 0..pool.inner.config.min_connections {
            match pool.open_connection().await {
                Ok(conn) => pool.inner.idle.lock().push_back(IdleConnection {
                    conn,
                    since: Instant::now(),
                }),
                Err(error) => {
                    tracing::warn!(datasource = %pool.inner.name(), %error, "could not open initial connection");
                    break;
                }
            }
        }

        tracing::info!(
            datasource = %pool.inner.name(),
            min = pool.inner.config.min_connections,
            max = pool.inner.config.max_connections,
            open = pool.inner.open.load(Ordering::Acquire),
            "connection pool created"
        );

        Ok(pool)
    }

    /// Get a connection from the pool.
    ///
    /// Waits up to `connection_timeout` for a free slot, then reuses an idle
    /// connection or opens a new one.
    pub async fn get(&self) -> Result<PooledConnection<F::Connection>, PoolError> {
        if self.is_closed() {
            self.inner.checkout_failed();
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!(datasource = %self.inner.name(), "acquiring connection from pool");

        let timeout = self.inner.config.connection_timeout;
        let permit =
            match tokio::time::timeout(timeout, Arc::clone(&self.inner.slots).acquire_owned())
                .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    self.inner.checkout_failed();
                    return Err(PoolError::PoolClosed);
                }
                Err(_) => {
                    self.inner.checkout_failed();
                    tracing::warn!(datasource = %self.inner.name(), ?timeout, "timed out waiting for a connection");
                    return Err(PoolError::Timeout {
                        datasource: self.inner.name().to_string(),
                        timeout,
                    });
                }
            };

        self.checkout(permit).await
    }

    /// Get an idle connection without waiting.
    ///
    /// Returns `None` when every slot is taken or no idle connection is
    /// available. Never opens a connection and skips the checkout test.
    pub fn try_get(&self) -> Result<Option<PooledConnection<F::Connection>>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let permit = match Arc::clone(&self.inner.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Ok(None),
            Err(TryAcquireError::Closed) => return Err(PoolError::PoolClosed),
        };

        let (conn, expired) = self.inner.take_idle();
        if !expired.is_empty() {
            // Dropped without a close round trip.
            self.inner.forget(expired.len() as u32);
        }

        Ok(conn.map(|conn| {
            self.inner.metrics.lock().checkouts_successful += 1;
            PooledConnection::new(conn, permit, Arc::clone(&self.inner))
        }))
    }

    async fn checkout(
        &self,
        permit: OwnedSemaphorePermit,
    ) -> Result<PooledConnection<F::Connection>, PoolError> {
        loop {
            let (candidate, expired) = self.inner.take_idle();
            self.discard(expired, "idle timeout").await;

            let Some(mut conn) = candidate else {
                break;
            };

            if self.inner.config.test_on_checkout {
                let valid = conn.is_valid().await;
                self.inner.health_checked(valid);
                if !valid {
                    self.discard(vec![conn], "failed validation").await;
                    continue;
                }
            }

            self.inner.metrics.lock().checkouts_successful += 1;
            tracing::trace!(datasource = %self.inner.name(), connection = %conn.id(), "reusing idle connection");
            return Ok(PooledConnection::new(conn, permit, Arc::clone(&self.inner)));
        }

        match self.open_connection().await {
            Ok(conn) => {
                self.inner.metrics.lock().checkouts_successful += 1;
                Ok(PooledConnection::new(conn, permit, Arc::clone(&self.inner)))
            }
            Err(error) => {
                self.inner.checkout_failed();
                Err(error)
            }
        }
    }

    async fn open_connection(&self) -> Result<F::Connection, PoolError> {
        let conn = self
            .factory
            .connect(&self.inner.datasource)
            .await
            .map_err(|source| PoolError::Connection {
                datasource: self.inner.name().to_string(),
                source,
            })?;

        self.inner.open.fetch_add(1, Ordering::AcqRel);
        self.inner.metrics.lock().connections_created += 1;
        tracing::debug!(datasource = %self.inner.name(), connection = %conn.id(), "connection opened");
        Ok(conn)
    }

    async fn discard(&self, conns: Vec<F::Connection>, reason: &str) {
        if conns.is_empty() {
            return;
        }
        let count = conns.len() as u32;
        for mut conn in conns {
            tracing::debug!(datasource = %self.inner.name(), connection = %conn.id(), reason, "closing connection");
            sqlbind_client::close_quietly(&mut conn).await;
        }
        self.inner.forget(count);
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let available = self.inner.idle.lock().len() as u32;
        let total = self.inner.open.load(Ordering::Acquire);
        PoolStatus {
            available,
            in_use: total.saturating_sub(available),
            total,
            max: self.inner.config.max_connections,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            health_checks_performed: inner.health_checks_performed,
            health_checks_failed: inner.health_checks_failed,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Close the pool and every idle connection.
    ///
    /// Checked-out connections are dropped when they come back.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.slots.close();

        let idle: Vec<_> = self.inner.idle.lock().drain(..).map(|e| e.conn).collect();
        self.discard(idle, "pool closed").await;
        tracing::info!(datasource = %self.inner.name(), "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the datasource this pool serves.
    #[must_use]
    pub fn datasource(&self) -> &DataSourceConfig {
        &self.inner.datasource
    }
}

impl<F: ConnectionFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("datasource", &self.inner.name())
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder(factory, datasource)
///     .pool_config(pool_config)
///     .build()
///     .await?;
/// ```
pub struct PoolBuilder<F: ConnectionFactory> {
    factory: Arc<F>,
    datasource: DataSourceConfig,
    pool_config: PoolConfig,
}

impl<F: ConnectionFactory> PoolBuilder<F> {
    /// Create a builder starting from the datasource's own pool settings.
    pub fn new(factory: Arc<F>, datasource: DataSourceConfig) -> Self {
        Self {
            factory,
            pool_config: datasource.pool.clone(),
            datasource,
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = timeout;
        self
    }

    /// Enable or disable validation on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_checkout = enabled;
        self
    }

    /// Build the pool.
    pub async fn build(self) -> Result<Pool<F>, PoolError> {
        Pool::new(self.pool_config, self.factory, self.datasource).await
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (f64::from(self.in_use) / f64::from(self.max)) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful connection checkouts.
    pub checkouts_successful: u64,
    /// Failed connection checkouts (timeouts, pool closed, etc.).
    pub checkouts_failed: u64,
    /// Health checks performed.
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}

/// A connection retrieved from the pool.
///
/// Derefs to the underlying connection and implements [`Connection`] itself,
/// so it can be passed straight to a statement. When dropped, the connection
/// is returned to the pool. Use [`detach()`](PooledConnection::detach) to
/// keep it.
pub struct PooledConnection<C> {
    conn: Option<C>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<C>>,
    checked_out_at: Instant,
    /// Set once the caller closed the connection; it is not requeued.
    closed: bool,
}

impl<C: Connection> PooledConnection<C> {
    fn new(conn: C, permit: OwnedSemaphorePermit, pool: Arc<PoolInner<C>>) -> Self {
        Self {
            conn: Some(conn),
            permit: Some(permit),
            pool,
            checked_out_at: Instant::now(),
            closed: false,
        }
    }

    /// Name of the datasource the connection belongs to.
    #[must_use]
    pub fn datasource(&self) -> &str {
        self.pool.name()
    }

    /// How long the connection has been checked out.
    #[must_use]
    pub fn checked_out_for(&self) -> Duration {
        self.checked_out_at.elapsed()
    }

    /// Detach the connection from the pool.
    ///
    /// The pool forgets the connection and frees its slot; the caller owns
    /// and must close it.
    #[must_use]
    pub fn detach(mut self) -> Option<C> {
        let conn = self.conn.take();
        if conn.is_some() {
            self.pool.forget(1);
        }
        conn
    }

    fn conn_ref(&self) -> &C {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }

    fn conn_mut(&mut self) -> &mut C {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn_ref()
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn_mut()
    }
}

#[async_trait]
impl<C: Connection> Connection for PooledConnection<C> {
    fn id(&self) -> ConnectionId {
        self.conn_ref().id()
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.conn_ref().placeholder_style()
    }

    async fn prepare(
        &mut self,
        sql: &str,
        mode: ResultSetMode,
    ) -> Result<StatementHandle, DriverError> {
        self.conn_mut().prepare(sql, mode).await
    }

    async fn unprepare(&mut self, handle: StatementHandle) -> Result<(), DriverError> {
        self.conn_mut().unprepare(handle).await
    }

    async fn execute(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ExecuteResult, DriverError> {
        self.conn_mut().execute(handle, params).await
    }

    async fn query(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ResultSet, DriverError> {
        self.conn_mut().query(handle, params).await
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.conn_mut().commit().await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn_mut().rollback().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.conn_mut().close().await
    }

    async fn is_valid(&mut self) -> bool {
        self.conn_mut().is_valid().await
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.closed {
            tracing::trace!(datasource = %self.pool.name(), "connection closed by caller, not requeued");
            self.pool.forget(1);
            drop(conn);
        } else if self.pool.closed.load(Ordering::Acquire) {
            tracing::trace!(datasource = %self.pool.name(), "pool closed, dropping returned connection");
            self.pool.forget(1);
            drop(conn);
        } else {
            tracing::trace!(datasource = %self.pool.name(), "returning connection to pool");
            self.pool.idle.lock().push_back(IdleConnection {
                conn,
                since: Instant::now(),
            });
        }

        // Release the slot only once the connection is back in the queue.
        self.permit.take();
    }
}

impl<C: Connection> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("datasource", &self.pool.name())
            .field("connection", &self.conn.as_ref().map(Connection::id))
            .finish_non_exhaustive()
    }
}
