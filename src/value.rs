//! Parameter values for prepared statements.

use crate::protocol::types::{oid, FormatCode, Oid};

/// A single bind parameter value.
///
/// Scalars travel in text format, which every server type accepts for its
/// declared OID; `Bytea` travels binary to avoid the text escape formats.
/// `Null` encodes as the protocol's -1 length.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    #[cfg(feature = "with-chrono")]
    Date(chrono::NaiveDate),
    #[cfg(feature = "with-chrono")]
    Timestamp(chrono::NaiveDateTime),
}

impl Value {
    /// The OID this value naturally carries; 0 for `Null` lets the server
    /// infer the type from context.
    pub fn type_oid(&self) -> Oid {
        match self {
            Value::Null => 0,
            Value::Bool(_) => oid::BOOL,
            Value::Int2(_) => oid::INT2,
            Value::Int4(_) => oid::INT4,
            Value::Int8(_) => oid::INT8,
            Value::Float4(_) => oid::FLOAT4,
            Value::Float8(_) => oid::FLOAT8,
            Value::Text(_) => oid::TEXT,
            Value::Bytea(_) => oid::BYTEA,
            #[cfg(feature = "with-chrono")]
            Value::Date(_) => oid::DATE,
            #[cfg(feature = "with-chrono")]
            Value::Timestamp(_) => oid::TIMESTAMP,
        }
    }

    /// Wire format and encoded body for a Bind message; `None` is NULL.
    pub(crate) fn encode(&self) -> (FormatCode, Option<Vec<u8>>) {
        match self {
            Value::Null => (FormatCode::Text, None),
            Value::Bool(v) => (
                FormatCode::Text,
                Some(if *v { b"t".to_vec() } else { b"f".to_vec() }),
            ),
            Value::Int2(v) => (FormatCode::Text, Some(v.to_string().into_bytes())),
            Value::Int4(v) => (FormatCode::Text, Some(v.to_string().into_bytes())),
            Value::Int8(v) => (FormatCode::Text, Some(v.to_string().into_bytes())),
            Value::Float4(v) => (FormatCode::Text, Some(v.to_string().into_bytes())),
            Value::Float8(v) => (FormatCode::Text, Some(v.to_string().into_bytes())),
            Value::Text(v) => (FormatCode::Text, Some(v.clone().into_bytes())),
            Value::Bytea(v) => (FormatCode::Binary, Some(v.clone())),
            #[cfg(feature = "with-chrono")]
            Value::Date(v) => (
                FormatCode::Text,
                Some(v.format("%Y-%m-%d").to_string().into_bytes()),
            ),
            #[cfg(feature = "with-chrono")]
            Value::Timestamp(v) => (
                FormatCode::Text,
                Some(v.format("%Y-%m-%d %H:%M:%S%.f").to_string().into_bytes()),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int2(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int4(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int8(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float4(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float8(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytea(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
