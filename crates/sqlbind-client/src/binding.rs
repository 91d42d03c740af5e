//! Named bind values.

use std::collections::BTreeMap;
use std::fmt;

use sqlbind_template::Arity;
use sqlbind_types::Value;

/// What a bind name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// One value, one marker per occurrence.
    Scalar(Value),
    /// An ordered collection, one marker per element per occurrence.
    Sequence(Vec<Value>),
    /// An explicit null. Rejected when the statement executes.
    Null,
}

impl Binding {
    /// How many markers this binding expands to at each occurrence.
    #[must_use]
    pub fn arity(&self) -> Arity {
        match self {
            Self::Scalar(_) | Self::Null => Arity::Scalar,
            Self::Sequence(values) => Arity::Sequence(values.len()),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{}({v})", v.kind()),
            Self::Sequence(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}({v})", v.kind())?;
                }
                f.write_str("]")
            }
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// Bind name -> binding. The last bind of a name wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindMap {
    entries: BTreeMap<String, Binding>,
}

impl BindMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, returning the previous binding.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.entries.insert(name.into(), binding)
    }

    /// The binding for a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    /// Remove every binding.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for BindMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, binding)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={binding}")?;
        }
        f.write_str("}")
    }
}
