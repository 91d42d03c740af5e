//! The tagged bind value.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::date::{self, DateFormat};
use crate::error::TypeError;

/// The kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Text.
    String,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time of day.
    DateTime,
    /// Opaque structured payload.
    Object,
}

impl ValueKind {
    /// Upper-case name of the kind, as used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Object => "OBJECT",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value used as the unit of bind data.
///
/// The payload always matches the kind, and the typed accessors refuse to
/// coerce: asking an `Int` for [`as_long`](Value::as_long) is a
/// [`TypeError::TypeMismatch`]. [`to_text`](Value::to_text) is the only total
/// accessor.
///
/// Equality compares the kind and the textual form, so `Double(NAN)` equals
/// itself and `Int(5)` does not equal `Long(5)`.
#[derive(Debug, Clone)]
pub enum Value {
    /// Text.
    String(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 64-bit float.
    Double(f64),
    /// 32-bit float.
    Float(f32),
    /// Boolean.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time of day.
    DateTime(NaiveDateTime),
    /// Opaque structured payload. A JSON `null` here is the only way to carry
    /// a null through the bind layer, and binders reject it.
    Object(serde_json::Value),
}

impl Value {
    /// Wrap an opaque JSON payload.
    #[must_use]
    pub fn object(value: serde_json::Value) -> Self {
        Self::Object(value)
    }

    /// Convert text into a value of the requested kind.
    ///
    /// Numeric kinds must parse or a [`TypeError::Parse`] is returned.
    /// Booleans accept `true`, `yes`, `y`, `on` and `1` (any case) as true and
    /// treat everything else as false. Temporal kinds use the compact database
    /// formats from [`DateFormat`]; text that does not parse is kept verbatim as
    /// a `String`. `String` and `Object` targets store the text as a `String`.
    pub fn parse(kind: ValueKind, text: &str) -> Result<Self, TypeError> {
        let parse_err = || TypeError::Parse {
            kind,
            text: text.to_string(),
        };

        let value = match kind {
            ValueKind::Int => Self::Int(text.trim().parse().map_err(|_| parse_err())?),
            ValueKind::Long => Self::Long(text.trim().parse().map_err(|_| parse_err())?),
            ValueKind::Double => Self::Double(text.trim().parse().map_err(|_| parse_err())?),
            ValueKind::Float => Self::Float(text.trim().parse().map_err(|_| parse_err())?),
            ValueKind::Boolean => Self::Boolean(parse_bool(text)),
            ValueKind::Date => date::parse_date(text)
                .map(Self::Date)
                .unwrap_or_else(|| Self::String(text.to_string())),
            ValueKind::Time => date::parse_time(text)
                .map(Self::Time)
                .unwrap_or_else(|| Self::String(text.to_string())),
            ValueKind::DateTime => date::parse_datetime(text)
                .map(Self::DateTime)
                .unwrap_or_else(|| Self::String(text.to_string())),
            ValueKind::String | ValueKind::Object => Self::String(text.to_string()),
        };

        Ok(value)
    }

    /// The kind tag of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Float(_) => ValueKind::Float,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Object(_) => ValueKind::Object,
        }
    }

    /// Whether this is a null object payload.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Object(serde_json::Value::Null))
    }

    /// Get the `Int` payload.
    pub fn as_int(&self) -> Result<i32, TypeError> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(other.mismatch("INT")),
        }
    }

    /// Get the `Long` payload.
    pub fn as_long(&self) -> Result<i64, TypeError> {
        match self {
            Self::Long(v) => Ok(*v),
            other => Err(other.mismatch("LONG")),
        }
    }

    /// Get the `Double` payload.
    pub fn as_double(&self) -> Result<f64, TypeError> {
        match self {
            Self::Double(v) => Ok(*v),
            other => Err(other.mismatch("DOUBLE")),
        }
    }

    /// Get the `Float` payload.
    pub fn as_float(&self) -> Result<f32, TypeError> {
        match self {
            Self::Float(v) => Ok(*v),
            other => Err(other.mismatch("FLOAT")),
        }
    }

    /// Get the `Boolean` payload.
    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(other.mismatch("BOOLEAN")),
        }
    }

    /// Get any temporal payload as a timestamp.
    ///
    /// Dates are placed at midnight, times on 1970-01-01.
    pub fn as_date(&self) -> Result<NaiveDateTime, TypeError> {
        match self {
            Self::Date(d) => Ok(d.and_time(NaiveTime::default())),
            Self::Time(t) => Ok(NaiveDate::default().and_time(*t)),
            Self::DateTime(dt) => Ok(*dt),
            other => Err(other.mismatch("DATE, TIME or DATETIME")),
        }
    }

    /// Get the `Object` payload.
    pub fn as_object(&self) -> Result<&serde_json::Value, TypeError> {
        match self {
            Self::Object(v) => Ok(v),
            other => Err(other.mismatch("OBJECT")),
        }
    }

    /// Borrow the `String` payload without conversion.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of any kind.
    ///
    /// Temporal kinds are rendered in their compact database format.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(v) => v.to_string(),
            Self::Long(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Date(d) => d.format(DateFormat::DateOnly.pattern()).to_string(),
            Self::Time(t) => t.format(DateFormat::TimeOnly.pattern()).to_string(),
            Self::DateTime(dt) => DateFormat::DateAndTime.format(dt),
            Self::Object(v) => v.to_string(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeError {
        TypeError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }
}

fn parse_bool(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("true")
        || text.eq_ignore_ascii_case("yes")
        || text.eq_ignore_ascii_case("y")
        || text.eq_ignore_ascii_case("on")
        || text == "1"
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.to_text() == other.to_text()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

macro_rules! impl_from {
    ($ty:ty => $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    };
}

impl_from!(String => String);
impl_from!(i32 => Int);
impl_from!(i64 => Long);
impl_from!(f64 => Double);
impl_from!(f32 => Float);
impl_from!(bool => Boolean);
impl_from!(NaiveDate => Date);
impl_from!(NaiveTime => Time);
impl_from!(NaiveDateTime => DateTime);
impl_from!(serde_json::Value => Object);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::String(v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_kind() {
        assert_eq!(Value::from(7).as_int().unwrap(), 7);
        assert_eq!(Value::from(7_i64).as_long().unwrap(), 7);
        assert!((Value::from(1.5_f64).as_double().unwrap() - 1.5).abs() < f64::EPSILON);
        assert!((Value::from(1.5_f32).as_float().unwrap() - 1.5).abs() < f32::EPSILON);
        assert!(Value::from(true).as_bool().unwrap());
    }

    #[test]
    fn test_accessor_mismatch_does_not_coerce() {
        let err = Value::from(7).as_long().unwrap_err();
        assert_eq!(
            err,
            TypeError::TypeMismatch {
                expected: "LONG",
                actual: ValueKind::Int,
            }
        );

        assert!(Value::from("12").as_int().is_err());
        assert!(Value::from(1.0_f32).as_double().is_err());
        assert!(Value::from(1).as_bool().is_err());
        assert!(Value::from("20240101").as_date().is_err());
    }

    #[test]
    fn test_to_text_is_total() {
        assert_eq!(Value::from(42).to_text(), "42");
        assert_eq!(Value::from(false).to_text(), "false");
        assert_eq!(Value::from("abc").to_text(), "abc");
        assert_eq!(
            Value::from(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).to_text(),
            "20240309"
        );
        assert_eq!(
            Value::from(NaiveTime::from_hms_opt(8, 0, 30).unwrap()).to_text(),
            "080030"
        );
        assert_eq!(Value::object(serde_json::json!({"a": 1})).to_text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(Value::parse(ValueKind::Int, "12").unwrap(), Value::Int(12));
        assert_eq!(Value::parse(ValueKind::Long, " 9000000000 ").unwrap(), Value::Long(9_000_000_000));
        assert_eq!(Value::parse(ValueKind::Double, "2.5").unwrap(), Value::Double(2.5));
        assert_eq!(Value::parse(ValueKind::Float, "2.5").unwrap(), Value::Float(2.5));

        let err = Value::parse(ValueKind::Int, "twelve").unwrap_err();
        assert!(matches!(err, TypeError::Parse { kind: ValueKind::Int, .. }));
    }

    #[test]
    fn test_parse_boolean() {
        for text in ["true", "TRUE", "yes", "Y", "on", "1"] {
            assert_eq!(Value::parse(ValueKind::Boolean, text).unwrap(), Value::Boolean(true));
        }
        for text in ["false", "no", "0", "", "maybe"] {
            assert_eq!(Value::parse(ValueKind::Boolean, text).unwrap(), Value::Boolean(false));
        }
    }

    #[test]
    fn test_parse_temporal() {
        let date = Value::parse(ValueKind::Date, "20240131").unwrap();
        assert_eq!(date.kind(), ValueKind::Date);

        let time = Value::parse(ValueKind::Time, "133000").unwrap();
        assert_eq!(time.kind(), ValueKind::Time);
        assert_eq!(time.as_date().unwrap().to_string(), "1970-01-01 13:30:00");

        let dt = Value::parse(ValueKind::DateTime, "20240131133000").unwrap();
        assert_eq!(dt.kind(), ValueKind::DateTime);
        assert_eq!(dt.to_text(), "20240131133000");
    }

    #[test]
    fn test_parse_temporal_falls_back_to_string() {
        let value = Value::parse(ValueKind::Date, "31/01/2024").unwrap();
        assert_eq!(value, Value::String("31/01/2024".into()));

        let value = Value::parse(ValueKind::DateTime, "20240131").unwrap();
        assert_eq!(value.kind(), ValueKind::String);
    }

    #[test]
    fn test_parse_object_stores_text() {
        let value = Value::parse(ValueKind::Object, "{}").unwrap();
        assert_eq!(value, Value::String("{}".into()));
    }

    #[test]
    fn test_equality_uses_kind_and_text() {
        assert_eq!(Value::from(5), Value::from(5));
        assert_ne!(Value::from(5), Value::from(5_i64));
        assert_ne!(Value::from(5), Value::from("5"));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_null_object() {
        assert!(Value::object(serde_json::Value::Null).is_null());
        assert!(!Value::object(serde_json::json!(1)).is_null());
        assert!(!Value::from("").is_null());
    }
}
