//! Named placeholder rewriting.
//!
//! A placeholder starts at a `:` that is immediately followed by an ASCII
//! letter and runs over ASCII letters, digits and `_`:
//!
//! ```text
//! select * from T where a = :id and b in (:codes)
//!                           ^^^              ^^^^^
//! ```
//!
//! Everything else, including a `:` before a digit or another `:`, is copied
//! through untouched. The character that ends a placeholder is always copied
//! as text, even a `:`. There is no awareness of string literals or comments,
//! so a `::type` cast is only safe after something other than a name: `x::int`
//! holds the placeholder `int`.
//!
//! Rewriting replaces every placeholder with one positional marker, or with
//! `n` comma separated markers when the name is bound to an `n` element
//! sequence, and records the names in the order their markers appear.

use crate::error::RewriteError;
use crate::style::PlaceholderStyle;

/// How many positional markers a binding expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// A single value: exactly one marker.
    Scalar,
    /// A sequence of the given length: one marker per element.
    Sequence(usize),
}

impl Arity {
    /// Number of positional markers emitted at each occurrence.
    #[must_use]
    pub fn markers(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Sequence(n) => *n,
        }
    }
}

/// Output of [`rewrite`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rewritten {
    /// SQL text with positional markers.
    pub sql: String,
    /// Placeholder names in marker order. A name appears once per occurrence
    /// in the template, regardless of how many markers it expanded to.
    pub ordering: Vec<String>,
    /// Total number of positional markers emitted.
    pub positions: usize,
}

/// Scanner state.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Copying plain text.
    Scanning,
    /// Collecting a placeholder name that starts at byte offset `start`.
    InPlaceholder { start: usize },
}

trait Visitor<'a> {
    type Error;

    fn text(&mut self, c: char);

    fn placeholder(&mut self, name: &'a str) -> Result<(), Self::Error>;
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn starts_placeholder(sql: &str, colon: usize) -> bool {
    sql.as_bytes()
        .get(colon + 1)
        .is_some_and(|b| b.is_ascii_alphabetic())
}

fn scan<'a, V: Visitor<'a>>(sql: &'a str, visitor: &mut V) -> Result<(), V::Error> {
    let mut state = State::Scanning;

    for (i, c) in sql.char_indices() {
        if let State::InPlaceholder { start } = state {
            if is_name_char(c) {
                continue;
            }
            visitor.placeholder(&sql[start..i])?;
            state = State::Scanning;
            // The character that ends a placeholder never starts another one,
            // so `:a:b` holds the single placeholder `a`.
            visitor.text(c);
            continue;
        }

        if c == ':' && starts_placeholder(sql, i) {
            state = State::InPlaceholder { start: i + 1 };
        } else {
            visitor.text(c);
        }
    }

    if let State::InPlaceholder { start } = state {
        visitor.placeholder(&sql[start..])?;
    }

    Ok(())
}

struct Rewriter<F> {
    style: PlaceholderStyle,
    arity: F,
    out: Rewritten,
}

impl<'a, F> Visitor<'a> for Rewriter<F>
where
    F: FnMut(&str) -> Option<Arity>,
{
    type Error = RewriteError;

    fn text(&mut self, c: char) {
        self.out.sql.push(c);
    }

    fn placeholder(&mut self, name: &'a str) -> Result<(), RewriteError> {
        self.out.ordering.push(name.to_string());

        let arity = (self.arity)(name).ok_or_else(|| RewriteError::Unbound {
            name: name.to_string(),
        })?;

        let count = arity.markers();
        if count == 0 {
            return Err(RewriteError::EmptySequence {
                name: name.to_string(),
            });
        }

        for k in 0..count {
            if k > 0 {
                self.out.sql.push(',');
            }
            self.out.positions += 1;
            self.style.write_marker(&mut self.out.sql, self.out.positions);
        }

        Ok(())
    }
}

/// Rewrite `:name` placeholders into positional markers.
///
/// `arity` reports how each name is bound; `None` means unbound and fails the
/// rewrite with [`RewriteError::Unbound`]. A zero-length sequence fails with
/// [`RewriteError::EmptySequence`].
///
/// # Example
///
/// ```
/// use sqlbind_template::{Arity, PlaceholderStyle, rewrite};
///
/// let out = rewrite(
///     "select * from T where a = :v and b in (:ids)",
///     PlaceholderStyle::Question,
///     |name| match name {
///         "v" => Some(Arity::Scalar),
///         "ids" => Some(Arity::Sequence(3)),
///         _ => None,
///     },
/// )
/// .unwrap();
///
/// assert_eq!(out.sql, "select * from T where a = ? and b in (?,?,?)");
/// assert_eq!(out.ordering, ["v", "ids"]);
/// assert_eq!(out.positions, 4);
/// ```
pub fn rewrite<F>(sql: &str, style: PlaceholderStyle, arity: F) -> Result<Rewritten, RewriteError>
where
    F: FnMut(&str) -> Option<Arity>,
{
    let mut rewriter = Rewriter {
        style,
        arity,
        out: Rewritten {
            sql: String::with_capacity(sql.len()),
            ..Rewritten::default()
        },
    };
    scan(sql, &mut rewriter)?;
    Ok(rewriter.out)
}

struct NameCollector<'a> {
    names: Vec<&'a str>,
}

impl<'a> Visitor<'a> for NameCollector<'a> {
    type Error = std::convert::Infallible;

    fn text(&mut self, _c: char) {}

    fn placeholder(&mut self, name: &'a str) -> Result<(), Self::Error> {
        self.names.push(name);
        Ok(())
    }
}

/// List the placeholder names of a template in order of appearance, without
/// requiring any bindings. Repeated names are repeated.
#[must_use]
pub fn scan_names(sql: &str) -> Vec<&str> {
    let mut collector = NameCollector { names: Vec::new() };
    match scan(sql, &mut collector) {
        Ok(()) => collector.names,
        Err(never) => match never {},
    }
}

/// Whether `name` is a valid placeholder name (`[A-Za-z][A-Za-z0-9_]*`).
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(is_name_char)
}
