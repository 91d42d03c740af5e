//! Positional marker styles.

use std::fmt::Write;

/// The positional marker syntax a driver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaceholderStyle {
    /// `?` for every position (ODBC/JDBC, MySQL, SQLite).
    #[default]
    Question,
    /// `@p1`, `@p2`, ... (SQL Server `sp_executesql`).
    AtNumbered,
    /// `$1`, `$2`, ... (PostgreSQL).
    DollarNumbered,
}

impl PlaceholderStyle {
    /// Append the marker for the 1-based `position` to `out`.
    pub fn write_marker(&self, out: &mut String, position: usize) {
        match self {
            Self::Question => out.push('?'),
            // Writing to a String cannot fail.
            Self::AtNumbered => {
                let _ = write!(out, "@p{position}");
            }
            Self::DollarNumbered => {
                let _ = write!(out, "${position}");
            }
        }
    }

    /// The marker for the 1-based `position`.
    #[must_use]
    pub fn marker(&self, position: usize) -> String {
        let mut out = String::new();
        self.write_marker(&mut out, position);
        out
    }
}
