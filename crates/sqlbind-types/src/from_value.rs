//! Extraction of Rust types from result values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::TypeError;
use crate::value::Value;

/// Convert a [`Value`] into a Rust type.
///
/// Conversions are strict in the same way as the [`Value`] accessors: an
/// `i64` can only be read from a `Long`. `String` is the exception and reads
/// the textual form of any value.
pub trait FromValue: Sized {
    /// Convert a non-null value.
    fn from_value(value: &Value) -> Result<Self, TypeError>;

    /// Convert a nullable value, mapping SQL NULL to `None`.
    fn from_value_nullable(value: Option<&Value>) -> Result<Option<Self>, TypeError> {
        match value {
            None => Ok(None),
            Some(v) if v.is_null() => Ok(None),
            Some(v) => Self::from_value(v).map(Some),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_int()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_long()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_double()
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_float()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        Ok(value.to_text())
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_date()
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            other => Err(TypeError::TypeMismatch {
                expected: "DATE or DATETIME",
                actual: other.kind(),
            }),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::DateTime(dt) => Ok(dt.time()),
            other => Err(TypeError::TypeMismatch {
                expected: "TIME or DATETIME",
                actual: other.kind(),
            }),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        value.as_object().cloned()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}
