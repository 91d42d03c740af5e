//! Tracing instrumentation for statement execution.
//!
//! Every execution runs inside a [`statement_span`] whose fields follow the
//! OpenTelemetry database conventions where one exists:
//!
//! - `db.statement_id`: catalog id of the statement
//! - `db.operation`: leading SQL verb (SELECT, INSERT, ...)
//! - `db.datasource`: datasource the statement belongs to, if known
//!
//! Completion is logged at `debug` with the elapsed time in milliseconds and
//! the number of positional parameters.

use tracing::Span;

/// Span names for statement operations.
pub mod span_names {
    /// Span name for statements executed without a result set.
    pub const EXECUTE: &str = "sqlbind.execute";
    /// Span name for statements returning rows.
    pub const QUERY: &str = "sqlbind.query";
}

/// Longest SQL text written to a log record.
pub const MAX_LOGGED_SQL: usize = 2048;

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let sql_upper = sql.trim_start().to_uppercase();

    if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
        "SELECT"
    } else if sql_upper.starts_with("INSERT") {
        "INSERT"
    } else if sql_upper.starts_with("UPDATE") {
        "UPDATE"
    } else if sql_upper.starts_with("DELETE") {
        "DELETE"
    } else if sql_upper.starts_with("MERGE") {
        "MERGE"
    } else if sql_upper.starts_with("EXEC") || sql_upper.starts_with("CALL") {
        "EXECUTE"
    } else if sql_upper.starts_with("CREATE") {
        "CREATE"
    } else if sql_upper.starts_with("ALTER") {
        "ALTER"
    } else if sql_upper.starts_with("DROP") {
        "DROP"
    } else {
        "OTHER"
    }
}

/// Truncate SQL text for logging, on a character boundary.
#[must_use]
pub fn truncate_sql(sql: &str, max_len: usize) -> &str {
    if sql.len() <= max_len {
        return sql;
    }
    let mut end = max_len;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Create the span an execution runs in.
pub fn statement_span(
    name: &'static str,
    statement_id: &str,
    sql: &str,
    datasource: Option<&str>,
) -> Span {
    let operation = extract_operation(sql);
    match name {
        span_names::QUERY => tracing::debug_span!(
            "sqlbind.query",
            db.statement_id = %statement_id,
            db.operation = operation,
            db.datasource = datasource.unwrap_or(""),
        ),
        _ => tracing::debug_span!(
            "sqlbind.execute",
            db.statement_id = %statement_id,
            db.operation = operation,
            db.datasource = datasource.unwrap_or(""),
        ),
    }
}
