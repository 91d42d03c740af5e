//! Literal text substitution.
//!
//! Some fragments of a statement cannot be parameterised: column lists,
//! `ORDER BY` clauses, optional `WHERE` conditions. Templates mark these with
//! `$token` sites which are replaced verbatim before placeholder rewriting.
//! Replacement is a blind substring match: a token inside a string literal or
//! a comment is replaced too.

use std::collections::BTreeMap;

/// Standard literal tokens.
pub mod tokens {
    /// Select list.
    pub const SELECT_CLAUSE: &str = "$selectclause";
    /// From clause.
    pub const FROM_CLAUSE: &str = "$fromclause";
    /// Join clause.
    pub const JOIN_CLAUSE: &str = "$joinclause";
    /// Where clause.
    pub const WHERE_CLAUSE: &str = "$whereclause";
    /// Order by clause.
    pub const ORDER_BY_CLAUSE: &str = "$orderclause";
}

/// Literal token -> replacement text.
///
/// Keys are stored in their `$token` form; see [`token_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralMap {
    entries: BTreeMap<String, String>,
}

impl LiteralMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replacement for a token. `"ord"` and `"$ord"` name the same
    /// token. Returns the previous replacement.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.entries.insert(token_text(name), value.into())
    }

    /// Replacement text for a token, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&token_text(name)).map(String::as_str)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in substitution order: longest token first, ties broken
    /// lexicographically.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        entries.into_iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for LiteralMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

/// The token text for a literal name: the name itself if it already starts
/// with `$`, otherwise `$name`.
#[must_use]
pub fn token_text(name: &str) -> String {
    if name.starts_with('$') {
        name.to_string()
    } else {
        format!("${name}")
    }
}

/// Replace every occurrence of every token in `sql` with its text.
///
/// Longer tokens are replaced first so that `$ord` never eats the front of
/// `$orderclause`. Replacement text is not rescanned for other tokens that
/// were already processed.
#[must_use]
pub fn substitute(sql: &str, literals: &LiteralMap) -> String {
    let mut out = sql.to_string();
    for (token, value) in literals.iter() {
        if out.contains(token) {
            out = out.replace(token, value);
        }
    }
    out
}
