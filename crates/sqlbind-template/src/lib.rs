//! # sqlbind-template
//!
//! Pure SQL template processing for named-parameter statements.
//!
//! This crate has no I/O and no driver knowledge. It provides the two text
//! passes a statement goes through before it reaches a driver:
//!
//! 1. [`substitute`]: blind replacement of `$token` literal sites with text.
//! 2. [`rewrite`]: `:name` placeholders to positional markers, expanding
//!    sequence bindings to comma separated marker lists.
//!
//! Literal substitution always runs first, so substituted text may itself
//! introduce placeholders.
//!
//! ## Example
//!
//! ```
//! use sqlbind_template::{Arity, LiteralMap, PlaceholderStyle, rewrite, substitute};
//!
//! let mut literals = LiteralMap::new();
//! literals.insert("ord", "name");
//!
//! let sql = substitute("select * from T where a=:v and b=:v order by $ord", &literals);
//! let out = rewrite(&sql, PlaceholderStyle::Question, |_| Some(Arity::Scalar)).unwrap();
//!
//! assert_eq!(out.sql, "select * from T where a=? and b=? order by name");
//! assert_eq!(out.ordering, ["v", "v"]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod literal;
pub mod rewrite;
pub mod style;

pub use error::RewriteError;
pub use literal::{LiteralMap, substitute, token_text, tokens};
pub use rewrite::{Arity, Rewritten, is_valid_name, rewrite, scan_names};
pub use style::PlaceholderStyle;
