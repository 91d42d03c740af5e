//! # sqlbind-types
//!
//! Typed values carried through the sqlbind statement layer.
//!
//! A [`Value`] is a small tagged union holding exactly one scalar. It is the
//! unit of bind data handed to a driver and the cell type of result rows.
//!
//! ## Type Mappings
//!
//! | kind       | Rust type                  |
//! |------------|----------------------------|
//! | `STRING`   | `String`                   |
//! | `INT`      | `i32`                      |
//! | `LONG`     | `i64`                      |
//! | `DOUBLE`   | `f64`                      |
//! | `FLOAT`    | `f32`                      |
//! | `BOOLEAN`  | `bool`                     |
//! | `DATE`     | `chrono::NaiveDate`        |
//! | `TIME`     | `chrono::NaiveTime`        |
//! | `DATETIME` | `chrono::NaiveDateTime`    |
//! | `OBJECT`   | `serde_json::Value`        |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod date;
pub mod error;
pub mod from_value;
pub mod value;

pub use date::DateFormat;
pub use error::TypeError;
pub use from_value::FromValue;
pub use value::{Value, ValueKind};
