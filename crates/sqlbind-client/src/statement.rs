//! Named-parameter statements.
//!
//! A [`BoundStatement`] wraps one shared [`Template`] and owns everything a
//! single caller needs to run it: bind values, literal substitutions and a
//! cache of the rewritten SQL and driver handle.
//!
//! ```text
//!   bind / bind_seq / bind_literal
//!            |
//!            v
//!   +-------------+   execute(conn)   +-----------------------------+
//!   | Unprepared  | ----------------> | Prepared(conn id, mode)     |
//!   +-------------+                   +-----------------------------+
//!         ^   any shape-changing bind, reset,  |
//!         +--- failure, other conn or mode ----+
//! ```
//!
//! Scalar rebinds that keep the marker count leave the cache alone; only the
//! positional values change.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use sqlbind_template::{
    LiteralMap, PlaceholderStyle, RewriteError, Rewritten, is_valid_name, rewrite, substitute,
};
use sqlbind_types::{DateFormat, TypeError, Value, ValueKind};
use tracing::Instrument;

use crate::binding::{BindMap, Binding};
use crate::catalog::Template;
use crate::connection::{
    Connection, ConnectionId, DriverError, ExecuteResult, ResultSetMode, StatementHandle,
};
use crate::error::{Error, Result};
use crate::instrumentation::{self, MAX_LOGGED_SQL, span_names};
use crate::row::ResultSet;

/// Rewritten SQL and driver handle for one connection and result-set mode.
#[derive(Debug, Clone)]
struct PreparedCache {
    rewritten: Rewritten,
    handle: StatementHandle,
    connection: ConnectionId,
    mode: ResultSetMode,
}

/// A SQL statement with `:name` placeholders and `$token` literal sites.
///
/// # Example
///
/// ```rust,ignore
/// let mut stmt = registry.lookup::<UserDao>("findUsers")?;
/// stmt.bind("tenant", 7)?
///     .bind_seq("status", ["active", "locked"])?
///     .bind_literal("orderclause", "name")?;
///
/// let rows = stmt.execute_query(&mut conn).await?;
/// ```
#[derive(Debug)]
pub struct BoundStatement {
    template: Arc<Template>,
    bindings: BindMap,
    literals: LiteralMap,
    cache: Option<PreparedCache>,
    /// Handles from invalidated caches, each released on the next prepare
    /// against its own connection.
    retired: Vec<(ConnectionId, StatementHandle)>,
}

impl BoundStatement {
    /// Create a statement over a shared template.
    #[must_use]
    pub fn new(template: Arc<Template>) -> Self {
        Self {
            template,
            bindings: BindMap::new(),
            literals: LiteralMap::new(),
            cache: None,
            retired: Vec::new(),
        }
    }

    /// Create a statement from ad-hoc SQL, outside any catalog.
    #[must_use]
    pub fn from_sql(id: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::new(Arc::new(Template::new(id, sql)))
    }

    /// Statement id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.template.id()
    }

    /// The template this statement was created from.
    #[must_use]
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Default datasource of the statement, if the catalog named one.
    #[must_use]
    pub fn datasource(&self) -> Option<&str> {
        self.template.datasource()
    }

    /// Current bindings.
    #[must_use]
    pub fn bindings(&self) -> &BindMap {
        &self.bindings
    }

    /// Current literal substitutions.
    #[must_use]
    pub fn literals(&self) -> &LiteralMap {
        &self.literals
    }

    /// Whether a prepared form is cached.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.cache.is_some()
    }

    /// The cached rewritten SQL, if prepared.
    #[must_use]
    pub fn prepared_sql(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.rewritten.sql.as_str())
    }

    /// The cached placeholder ordering, if prepared.
    #[must_use]
    pub fn prepared_ordering(&self) -> Option<&[String]> {
        self.cache.as_ref().map(|c| c.rewritten.ordering.as_slice())
    }

    /// Bind a single value to every occurrence of `:name`.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.set_binding(name, Binding::Scalar(value.into()))
    }

    /// Bind an optional value. `None` is recorded and rejected when the
    /// statement executes.
    pub fn bind_opt<T: Into<Value>>(&mut self, name: &str, value: Option<T>) -> Result<&mut Self> {
        let binding = match value {
            Some(v) => Binding::Scalar(v.into()),
            None => Binding::Null,
        };
        self.set_binding(name, binding)
    }

    /// Bind an ordered collection. Each occurrence of `:name` expands to one
    /// marker per element.
    pub fn bind_seq<I, T>(&mut self, name: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.set_binding(name, Binding::Sequence(values))
    }

    /// Bind a timestamp as its database string (`YYYYMMDD`, `hhmmss` or
    /// `YYYYMMDDhhmmss`).
    pub fn bind_date(
        &mut self,
        name: &str,
        value: &NaiveDateTime,
        format: DateFormat,
    ) -> Result<&mut Self> {
        self.bind(name, format.format(value))
    }

    /// Substitute literal text for every `$name` token before placeholders
    /// are rewritten. Always discards the prepared form.
    pub fn bind_literal(&mut self, name: &str, text: impl Into<String>) -> Result<&mut Self> {
        if name.trim_start_matches('$').is_empty() {
            return Err(self.invalid_name(name));
        }
        self.literals.insert(name, text);
        self.invalidate();
        Ok(self)
    }

    /// Substitute a list of fragments joined by `", "`.
    pub fn bind_literal_list<I, S>(&mut self, name: &str, items: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.bind_literal(name, joined)
    }

    /// Clear all bindings and literals. The prepared form is discarded.
    pub fn reset_bindings(&mut self) {
        self.bindings.clear();
        self.literals.clear();
        self.invalidate();
    }

    /// The SQL after literal substitution, before placeholder rewriting.
    #[must_use]
    pub fn substituted_sql(&self) -> String {
        substitute(self.template.sql(), &self.literals)
    }

    /// Rewrite the statement with the current bindings without touching a
    /// connection.
    pub fn render(&self, style: PlaceholderStyle) -> Result<Rewritten> {
        let sql = self.substituted_sql();
        rewrite(&sql, style, |name| self.bindings.get(name).map(Binding::arity))
            .map_err(|e| self.rewrite_error(e))
    }

    /// Execute a statement that returns no rows.
    pub async fn execute<C>(&mut self, conn: &mut C) -> Result<ExecuteResult>
    where
        C: Connection + ?Sized,
    {
        self.execute_with_mode(conn, ResultSetMode::Unspecified)
            .await
    }

    /// Execute a statement that returns no rows, preparing it with an
    /// explicit result-set mode.
    pub async fn execute_with_mode<C>(
        &mut self,
        conn: &mut C,
        mode: ResultSetMode,
    ) -> Result<ExecuteResult>
    where
        C: Connection + ?Sized,
    {
        let span = self.span(span_names::EXECUTE);
        async {
            let started = Instant::now();
            let (handle, params) = self.prepare(conn, mode).await?;
            let outcome = conn.execute(handle, &params).await;
            let result = self.complete(outcome, started, params.len())?;
            tracing::debug!(rows_affected = result.rows_affected, "statement executed");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Execute a query and collect its rows.
    pub async fn execute_query<C>(&mut self, conn: &mut C) -> Result<ResultSet>
    where
        C: Connection + ?Sized,
    {
        self.execute_query_with_mode(conn, ResultSetMode::Unspecified)
            .await
    }

    /// Execute a query with an explicit result-set mode.
    pub async fn execute_query_with_mode<C>(
        &mut self,
        conn: &mut C,
        mode: ResultSetMode,
    ) -> Result<ResultSet>
    where
        C: Connection + ?Sized,
    {
        let span = self.span(span_names::QUERY);
        async {
            let started = Instant::now();
            let (handle, params) = self.prepare(conn, mode).await?;
            let outcome = conn.query(handle, &params).await;
            let rows = self.complete(outcome, started, params.len())?;
            tracing::debug!(rows = rows.len(), "query executed");
            Ok(rows)
        }
        .instrument(span)
        .await
    }

    /// Make sure a prepared form exists for `(conn, mode)` and build the
    /// positional parameter list.
    async fn prepare<C>(
        &mut self,
        conn: &mut C,
        mode: ResultSetMode,
    ) -> Result<(StatementHandle, Vec<Value>)>
    where
        C: Connection + ?Sized,
    {
        let connection = conn.id();
        let reusable = self
            .cache
            .as_ref()
            .filter(|c| c.connection == connection && c.mode == mode)
            .map(|c| c.handle);
        let handle = match reusable {
            Some(handle) => {
                tracing::trace!(%connection, "reusing prepared statement");
                handle
            }
            None => self.prepare_fresh(conn, mode).await?,
        };

        let ordering = self
            .cache
            .as_ref()
            .map(|c| c.rewritten.ordering.as_slice())
            .unwrap_or_default();
        match positional_params(self.template.id(), ordering, &self.bindings) {
            Ok(params) => Ok((handle, params)),
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn prepare_fresh<C>(&mut self, conn: &mut C, mode: ResultSetMode) -> Result<StatementHandle>
    where
        C: Connection + ?Sized,
    {
        self.invalidate();
        let connection = conn.id();

        let (owned, others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|(owner, _)| *owner == connection);
        self.retired = others;
        for (_, handle) in owned {
            if let Err(e) = conn.unprepare(handle).await {
                tracing::warn!(%connection, error = %e, "failed to release prepared statement");
            }
        }

        let rewritten = self.render(conn.placeholder_style())?;
        tracing::debug!(
            %connection,
            sql = instrumentation::truncate_sql(&rewritten.sql, MAX_LOGGED_SQL),
            "preparing statement"
        );

        let handle = conn
            .prepare(&rewritten.sql, mode)
            .await
            .map_err(|source| Error::Driver {
                statement: self.template.id().to_string(),
                sql: rewritten.sql.clone(),
                source,
            })?;

        self.cache = Some(PreparedCache {
            rewritten,
            handle,
            connection,
            mode,
        });
        Ok(handle)
    }

    /// Map a driver outcome, dropping the prepared form on failure.
    fn complete<T>(
        &mut self,
        outcome: std::result::Result<T, DriverError>,
        started: Instant,
        params: usize,
    ) -> Result<T> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                tracing::debug!(elapsed_ms, params, "statement completed");
                Ok(value)
            }
            Err(source) => {
                let sql = self
                    .prepared_sql()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.substituted_sql());
                tracing::debug!(elapsed_ms, params, error = %source, "statement failed");
                self.invalidate();
                Err(Error::Driver {
                    statement: self.template.id().to_string(),
                    sql,
                    source,
                })
            }
        }
    }

    fn set_binding(&mut self, name: &str, binding: Binding) -> Result<&mut Self> {
        if !is_valid_name(name) {
            return Err(self.invalid_name(name));
        }

        let reshapes = match (&binding, self.bindings.get(name)) {
            (Binding::Sequence(_), _) => true,
            (_, Some(previous)) => previous.arity().markers() != binding.arity().markers(),
            (_, None) => false,
        };

        self.bindings.insert(name, binding);
        if reshapes {
            self.invalidate();
        }
        Ok(self)
    }

    fn invalidate(&mut self) {
        if let Some(cache) = self.cache.take() {
            self.retired.push((cache.connection, cache.handle));
        }
    }

    fn span(&self, name: &'static str) -> tracing::Span {
        instrumentation::statement_span(name, self.id(), self.template.sql(), self.datasource())
    }

    fn invalid_name(&self, name: &str) -> Error {
        Error::InvalidBindName {
            statement: self.template.id().to_string(),
            name: name.to_string(),
        }
    }

    fn rewrite_error(&self, error: RewriteError) -> Error {
        let statement = self.template.id().to_string();
        match error {
            RewriteError::Unbound { name } => Error::UnboundVariable { statement, name },
            RewriteError::EmptySequence { name } => Error::EmptySequence { statement, name },
            RewriteError::InvalidName { name } => Error::InvalidBindName { statement, name },
            source => Error::Rewrite { statement, source },
        }
    }
}

/// Flatten the bindings into positional order.
fn positional_params(statement: &str, ordering: &[String], bindings: &BindMap) -> Result<Vec<Value>> {
    let mut params = Vec::with_capacity(ordering.len());

    for name in ordering {
        match bindings.get(name) {
            Some(Binding::Scalar(value)) => params.push(bindable(statement, name, value)?),
            Some(Binding::Sequence(values)) => {
                for value in values {
                    params.push(bindable(statement, name, value)?);
                }
            }
            Some(Binding::Null) => {
                return Err(Error::NullBindRejected {
                    statement: statement.to_string(),
                    name: name.clone(),
                });
            }
            None => {
                return Err(Error::UnboundVariable {
                    statement: statement.to_string(),
                    name: name.clone(),
                });
            }
        }
    }

    Ok(params)
}

fn bindable(statement: &str, name: &str, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Err(Error::NullBindRejected {
            statement: statement.to_string(),
            name: name.to_string(),
        });
    }
    if value.kind() == ValueKind::Object {
        return Err(Error::TypeMismatch {
            statement: statement.to_string(),
            name: name.to_string(),
            source: TypeError::TypeMismatch {
                expected: "a scalar kind",
                actual: ValueKind::Object,
            },
        });
    }
    Ok(value.clone())
}

impl fmt::Display for BoundStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SQL ID: {}", self.id())?;
        writeln!(f, "SQL Statement: {}", self.substituted_sql())?;
        write!(f, "Parameters: {}", self.bindings)
    }
}
