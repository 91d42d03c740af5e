//! In-memory driver that records every call.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlbind_client::{
    Connection, ConnectionId, DriverError, ExecuteResult, PlaceholderStyle, ResultSet,
    ResultSetMode, StatementHandle, Value,
};
use sqlbind_pool::{ConnectionFactory, DataSourceConfig};
use thiserror::Error;

/// Errors raised by the mock driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MockError {
    /// A failure queued by the test.
    #[error("injected failure: {0}")]
    Injected(String),

    /// The connection was closed.
    #[error("connection is closed")]
    Closed,

    /// A handle that was never prepared or already released.
    #[error("unknown statement handle {0}")]
    UnknownHandle(u64),
}

/// One driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    /// `prepare`
    Prepare {
        /// SQL as received.
        sql: String,
        /// Result-set mode.
        mode: ResultSetMode,
        /// Handle handed back.
        handle: StatementHandle,
    },
    /// `unprepare`
    Unprepare(StatementHandle),
    /// `execute`
    Execute {
        /// Handle executed.
        handle: StatementHandle,
        /// Positional parameters.
        params: Vec<Value>,
    },
    /// `query`
    Query {
        /// Handle executed.
        handle: StatementHandle,
        /// Positional parameters.
        params: Vec<Value>,
    },
    /// `commit`
    Commit,
    /// `rollback`
    Rollback,
    /// `close`
    Close,
}

#[derive(Debug)]
struct MockState {
    events: Vec<MockEvent>,
    live: HashSet<u64>,
    next_handle: u64,
    fail_prepare: VecDeque<String>,
    fail_execute: VecDeque<String>,
    fail_commit: Option<String>,
    results: VecDeque<ResultSet>,
    rows_affected: u64,
    valid: bool,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            live: HashSet::new(),
            next_handle: 1,
            fail_prepare: VecDeque::new(),
            fail_execute: VecDeque::new(),
            fail_commit: None,
            results: VecDeque::new(),
            rows_affected: 0,
            valid: true,
            closed: false,
        }
    }
}

impl MockState {
    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(MockError::Closed.into());
        }
        Ok(())
    }

    fn check_handle(&self, handle: StatementHandle) -> Result<(), DriverError> {
        if !self.live.contains(&handle.0) {
            return Err(MockError::UnknownHandle(handle.0).into());
        }
        Ok(())
    }

    fn injected(queue: &mut VecDeque<String>) -> Result<(), DriverError> {
        match queue.pop_front() {
            Some(message) => Err(MockError::Injected(message).into()),
            None => Ok(()),
        }
    }
}

/// Shared view of a [`MockConnection`]'s state.
///
/// Tests keep a recorder to inspect calls and queue failures after the
/// connection has been handed to a pool or statement.
#[derive(Debug, Clone, Default)]
pub struct MockRecorder {
    state: Arc<Mutex<MockState>>,
}

impl MockRecorder {
    /// Every call so far.
    #[must_use]
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    /// SQL of every `prepare`, in order.
    #[must_use]
    pub fn prepared_sql(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Prepare { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `prepare` calls.
    #[must_use]
    pub fn prepare_count(&self) -> usize {
        self.prepared_sql().len()
    }

    /// Parameters of every `execute` and `query`, in order.
    #[must_use]
    pub fn executions(&self) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Execute { params, .. } | MockEvent::Query { params, .. } => {
                    Some(params.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Handles released with `unprepare`, in order.
    #[must_use]
    pub fn unprepared(&self) -> Vec<StatementHandle> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Unprepare(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Fail the next `prepare`.
    pub fn fail_next_prepare(&self, message: impl Into<String>) {
        self.state.lock().fail_prepare.push_back(message.into());
    }

    /// Fail the next `execute` or `query`.
    pub fn fail_next_execute(&self, message: impl Into<String>) {
        self.state.lock().fail_execute.push_back(message.into());
    }

    /// Fail every `commit` from now on.
    pub fn fail_commit(&self, message: impl Into<String>) {
        self.state.lock().fail_commit = Some(message.into());
    }

    /// Queue the rows returned by the next `query`.
    pub fn push_result(&self, rows: ResultSet) {
        self.state.lock().results.push_back(rows);
    }

    /// Rows affected reported by `execute`.
    pub fn set_rows_affected(&self, rows: u64) {
        self.state.lock().rows_affected = rows;
    }

    /// What `is_valid` reports.
    pub fn set_valid(&self, valid: bool) {
        self.state.lock().valid = valid;
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.state.lock().events.clear();
    }
}

/// A [`Connection`] that keeps everything in memory.
#[derive(Debug)]
pub struct MockConnection {
    id: ConnectionId,
    style: PlaceholderStyle,
    recorder: MockRecorder,
}

impl MockConnection {
    /// A new connection with `?` markers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_style(PlaceholderStyle::Question)
    }

    /// A new connection with the given marker style.
    #[must_use]
    pub fn with_style(style: PlaceholderStyle) -> Self {
        Self {
            id: ConnectionId::next(),
            style,
            recorder: MockRecorder::default(),
        }
    }

    /// The connection's recorder.
    #[must_use]
    pub fn recorder(&self) -> MockRecorder {
        self.recorder.clone()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    async fn prepare(
        &mut self,
        sql: &str,
        mode: ResultSetMode,
    ) -> Result<StatementHandle, DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        MockState::injected(&mut state.fail_prepare)?;

        let handle = StatementHandle(state.next_handle);
        state.next_handle += 1;
        state.live.insert(handle.0);
        state.events.push(MockEvent::Prepare {
            sql: sql.to_string(),
            mode,
            handle,
        });
        Ok(handle)
    }

    async fn unprepare(&mut self, handle: StatementHandle) -> Result<(), DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.check_handle(handle)?;
        state.live.remove(&handle.0);
        state.events.push(MockEvent::Unprepare(handle));
        Ok(())
    }

    async fn execute(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ExecuteResult, DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.check_handle(handle)?;
        state.events.push(MockEvent::Execute {
            handle,
            params: params.to_vec(),
        });
        MockState::injected(&mut state.fail_execute)?;
        Ok(ExecuteResult {
            rows_affected: state.rows_affected,
        })
    }

    async fn query(
        &mut self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<ResultSet, DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.check_handle(handle)?;
        state.events.push(MockEvent::Query {
            handle,
            params: params.to_vec(),
        });
        MockState::injected(&mut state.fail_execute)?;
        Ok(state.results.pop_front().unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.events.push(MockEvent::Commit);
        match &state.fail_commit {
            Some(message) => Err(MockError::Injected(message.clone()).into()),
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.events.push(MockEvent::Rollback);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.recorder.state.lock();
        state.check_open()?;
        state.events.push(MockEvent::Close);
        state.closed = true;
        Ok(())
    }

    async fn is_valid(&mut self) -> bool {
        let state = self.recorder.state.lock();
        state.valid && !state.closed
    }
}

/// A [`ConnectionFactory`] producing [`MockConnection`]s.
#[derive(Debug, Default)]
pub struct MockFactory {
    style: PlaceholderStyle,
    opened: Mutex<Vec<(String, MockRecorder)>>,
    fail_connect: Mutex<Option<String>>,
}

impl MockFactory {
    /// A factory producing `?`-style connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory producing connections with the given marker style.
    #[must_use]
    pub fn with_style(style: PlaceholderStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Fail every connect from now on, or stop failing with `None`.
    pub fn fail_connect(&self, message: Option<&str>) {
        *self.fail_connect.lock() = message.map(str::to_string);
    }

    /// Number of connections opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    /// Number of connections opened for one datasource.
    #[must_use]
    pub fn opened_for(&self, datasource: &str) -> usize {
        self.opened
            .lock()
            .iter()
            .filter(|(name, _)| name == datasource)
            .count()
    }

    /// Recorders of every connection opened, in order.
    #[must_use]
    pub fn recorders(&self) -> Vec<MockRecorder> {
        self.opened.lock().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn connect(&self, datasource: &DataSourceConfig) -> Result<MockConnection, DriverError> {
        if let Some(message) = self.fail_connect.lock().clone() {
            return Err(MockError::Injected(message).into());
        }

        let conn = MockConnection::with_style(self.style);
        tracing::debug!(datasource = %datasource.name, connection = %conn.id(), "mock connection opened");
        self.opened
            .lock()
            .push((datasource.name.clone(), conn.recorder()));
        Ok(conn)
    }
}
