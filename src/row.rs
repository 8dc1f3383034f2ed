//! Decoding result rows into Rust types.

use crate::error::{Error, Result};
use crate::protocol::backend::{Column, DataRow};
use crate::protocol::types::{oid, FormatCode, Oid};

/// Decodes one field value into a Rust type.
///
/// Simple queries deliver text format; binary arrives when a result format
/// was negotiated. The OID lets implementations reject fields they cannot
/// represent instead of producing garbage.
pub trait FromWireValue<'a>: Sized {
    /// Decode a NULL field. Errors unless the type can represent NULL.
    fn from_null() -> Result<Self> {
        Err(Error::Decode("unexpected NULL value".into()))
    }

    /// Decode from text-format bytes.
    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self>;

    /// Decode from binary-format bytes.
    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self>;
}

fn text_str<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("invalid UTF-8 in {what} field: {e}")))
}

macro_rules! from_text_parse {
    ($ty:ty, $($accepted:pat_param)|+) => {
        impl FromWireValue<'_> for $ty {
            fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
                if !matches!(oid, $($accepted)|+) {
                    return Err(Error::Decode(format!(
                        concat!("cannot decode oid {} as ", stringify!($ty)),
                        oid
                    )));
                }
                text_str(bytes, stringify!($ty))?.parse().map_err(|e| {
                    Error::Decode(format!(concat!("invalid ", stringify!($ty), ": {}"), e))
                })
            }

            fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
                if !matches!(oid, $($accepted)|+) {
                    return Err(Error::Decode(format!(
                        concat!("cannot decode oid {} as ", stringify!($ty)),
                        oid
                    )));
                }
                let arr = bytes.try_into().map_err(|_| {
                    Error::Decode(format!(
                        concat!("invalid ", stringify!($ty), " length: {}"),
                        bytes.len()
                    ))
                })?;
                Ok(<$ty>::from_be_bytes(arr))
            }
        }
    };
}

from_text_parse!(i16, oid::INT2);
from_text_parse!(i32, oid::INT4);
from_text_parse!(i64, oid::INT8);
from_text_parse!(f32, oid::FLOAT4);
from_text_parse!(f64, oid::FLOAT8);

impl FromWireValue<'_> for bool {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOOL {
            return Err(Error::Decode(format!("cannot decode oid {oid} as bool")));
        }
        match bytes {
            b"t" | b"true" => Ok(true),
            b"f" | b"false" => Ok(false),
            other => Err(Error::Decode(format!(
                "invalid boolean: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOOL {
            return Err(Error::Decode(format!("cannot decode oid {oid} as bool")));
        }
        match bytes {
            [b] => Ok(*b != 0),
            _ => Err(Error::Decode(format!("invalid boolean length: {}", bytes.len()))),
        }
    }
}

impl FromWireValue<'_> for String {
    fn from_text(_oid: Oid, bytes: &[u8]) -> Result<Self> {
        Ok(text_str(bytes, "string")?.to_string())
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        match oid {
            oid::TEXT | oid::VARCHAR | oid::CHAR => Ok(text_str(bytes, "string")?.to_string()),
            other => Err(Error::Decode(format!("cannot decode oid {other} as String"))),
        }
    }
}

impl FromWireValue<'_> for Vec<u8> {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BYTEA {
            return Ok(bytes.to_vec());
        }
        // Text-format bytea uses the \x hex encoding.
        let s = text_str(bytes, "bytea")?;
        let hex = s
            .strip_prefix("\\x")
            .ok_or_else(|| Error::Decode(format!("unsupported bytea text encoding: {s:?}")))?;
        if hex.len() % 2 != 0 {
            return Err(Error::Decode("odd-length bytea hex string".into()));
        }
        (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|e| Error::Decode(format!("invalid bytea hex: {e}")))
            })
            .collect()
    }

    fn from_binary(_oid: Oid, bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl<'a, T: FromWireValue<'a>> FromWireValue<'a> for Option<T> {
    fn from_null() -> Result<Self> {
        Ok(None)
    }

    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        T::from_text(oid, bytes).map(Some)
    }

    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        T::from_binary(oid, bytes).map(Some)
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impls {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    impl FromWireValue<'_> for NaiveDate {
        fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
            if oid != oid::DATE {
                return Err(Error::Decode(format!("cannot decode oid {oid} as date")));
            }
            NaiveDate::parse_from_str(text_str(bytes, "date")?, "%Y-%m-%d")
                .map_err(|e| Error::Decode(format!("invalid date: {e}")))
        }

        fn from_binary(_oid: Oid, _bytes: &[u8]) -> Result<Self> {
            Err(Error::Decode("binary date decoding not supported".into()))
        }
    }

    impl FromWireValue<'_> for NaiveDateTime {
        fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
            if oid != oid::TIMESTAMP {
                return Err(Error::Decode(format!(
                    "cannot decode oid {oid} as timestamp"
                )));
            }
            NaiveDateTime::parse_from_str(text_str(bytes, "timestamp")?, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| Error::Decode(format!("invalid timestamp: {e}")))
        }

        fn from_binary(_oid: Oid, _bytes: &[u8]) -> Result<Self> {
            Err(Error::Decode("binary timestamp decoding not supported".into()))
        }
    }
}

/// Decodes a whole row into a Rust type; implemented for value tuples.
pub trait FromRow<'a>: Sized {
    fn from_row(columns: &[Column], row: DataRow<'a>) -> Result<Self>;
}

fn decode_field<'a, T: FromWireValue<'a>>(
    column: &Column,
    value: Option<&'a [u8]>,
) -> Result<T> {
    match value {
        None => T::from_null(),
        Some(bytes) => match column.format {
            FormatCode::Text => T::from_text(column.type_oid, bytes),
            FormatCode::Binary => T::from_binary(column.type_oid, bytes),
        },
    }
}

macro_rules! impl_from_row_tuple {
    ($count:literal; $($ty:ident => $idx:tt),+) => {
        impl<'a, $($ty: FromWireValue<'a>),+> FromRow<'a> for ($($ty,)+) {
            fn from_row(columns: &[Column], row: DataRow<'a>) -> Result<Self> {
                if columns.len() < $count {
                    return Err(Error::Decode(format!(
                        "row has {} columns, destination needs {}",
                        columns.len(),
                        $count
                    )));
                }
                let mut fields = row.iter();
                Ok(($(
                    decode_field::<$ty>(&columns[$idx], fields.next().flatten())?,
                )+))
            }
        }
    };
}

impl_from_row_tuple!(1; T1 => 0);
impl_from_row_tuple!(2; T1 => 0, T2 => 1);
impl_from_row_tuple!(3; T1 => 0, T2 => 1, T3 => 2);
impl_from_row_tuple!(4; T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_from_row_tuple!(5; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
impl_from_row_tuple!(6; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5);
