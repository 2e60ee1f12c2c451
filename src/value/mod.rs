//! Bindable parameter values.
//!
//! Every value the server's binary protocol accepts is a variant of [`Value`].
//! Each variant knows how to:
//! - render itself as a text-protocol literal (`write_text`)
//! - pack itself for `COM_STMT_EXECUTE` / `COM_STMT_BULK_EXECUTE` (`write_binary`)
//! - report NULL (`is_null`)
//! - estimate its text length so buffers can be sized up front
//!   (`approximate_text_length`)
//!
//! Execution code never inspects variants; it only goes through these methods.

mod temporal;

#[cfg(feature = "with-rust-decimal")]
mod decimal;
#[cfg(feature = "with-time")]
mod time;
#[cfg(feature = "with-uuid")]
mod uuid;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::protocol::codec::{write_lenenc_bytes, write_u8, write_u16, write_u32, write_u64};
use crate::protocol::types::{ColumnType, PARAMETER_FLAG_UNSIGNED};

pub use temporal::{DateTimeParameter, TimeParameter};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UnsignedBigInt(u64),
    Float(f32),
    Double(f64),
    /// Exact decimal, as its canonical digit string
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(TimeParameter),
    DateTime(DateTimeParameter),
}

impl Value {
    /// True for SQL NULL.
    ///
    /// NaN and infinite floats have no SQL representation and are sent as NULL.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => !v.is_finite(),
            Value::Double(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Type code and unsigned flag sent in the execute parameter header.
    pub fn binary_type(&self) -> (ColumnType, u8) {
        if self.is_null() {
            return (ColumnType::Null, 0);
        }
        match self {
            Value::Null => (ColumnType::Null, 0),
            Value::Bool(_) | Value::TinyInt(_) => (ColumnType::Tiny, 0),
            Value::SmallInt(_) => (ColumnType::Short, 0),
            Value::Int(_) => (ColumnType::Long, 0),
            Value::BigInt(_) => (ColumnType::LongLong, 0),
            Value::UnsignedBigInt(_) => (ColumnType::LongLong, PARAMETER_FLAG_UNSIGNED),
            Value::Float(_) => (ColumnType::Float, 0),
            Value::Double(_) => (ColumnType::Double, 0),
            Value::Decimal(_) => (ColumnType::NewDecimal, 0),
            Value::String(_) => (ColumnType::VarString, 0),
            Value::Bytes(_) => (ColumnType::Blob, 0),
            Value::Date(_) => (ColumnType::Date, 0),
            Value::Time(_) => (ColumnType::Time, 0),
            Value::DateTime(_) => (ColumnType::DateTime, 0),
        }
    }

    /// Upper-bound estimate of the text literal length.
    ///
    /// Underestimates only cost a reallocation; output is never truncated.
    pub fn approximate_text_length(&self) -> usize {
        match self {
            Value::Null => 4,
            Value::Bool(_) => 1,
            Value::TinyInt(_) => 4,
            Value::SmallInt(_) => 6,
            Value::Int(_) => 11,
            Value::BigInt(_) | Value::UnsignedBigInt(_) => 20,
            Value::Float(_) | Value::Double(_) => 25,
            Value::Decimal(digits) => digits.len() + 2,
            Value::String(s) => s.len() * 2 + 2,
            Value::Bytes(b) => b.len() * 2 + 9,
            Value::Date(_) => temporal::DATE_APPROXIMATE_TEXT_LENGTH,
            Value::Time(_) => TimeParameter::APPROXIMATE_TEXT_LENGTH,
            Value::DateTime(_) => DateTimeParameter::APPROXIMATE_TEXT_LENGTH,
        }
    }

    /// Append the text-protocol literal.
    pub fn write_text(&self, out: &mut Vec<u8>) {
        if self.is_null() {
            out.extend_from_slice(b"NULL");
            return;
        }
        match self {
            Value::Null => out.extend_from_slice(b"NULL"),
            Value::Bool(v) => out.push(if *v { b'1' } else { b'0' }),
            Value::TinyInt(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::SmallInt(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Int(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::BigInt(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::UnsignedBigInt(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Float(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Double(v) => out.extend_from_slice(v.to_string().as_bytes()),
            // quoted: the digit string is not checked, and the server casts it
            Value::Decimal(digits) => write_quoted(out, digits.as_bytes()),
            Value::String(s) => write_quoted(out, s.as_bytes()),
            Value::Bytes(b) => {
                out.extend_from_slice(b"_binary");
                write_quoted(out, b);
            }
            Value::Date(d) => temporal::write_date_text(d, out),
            Value::Time(t) => t.write_text(out),
            Value::DateTime(dt) => dt.write_text(out),
        }
    }

    /// Append the binary-protocol value. NULL writes nothing; it travels in
    /// the null bitmap or indicator byte instead.
    pub fn write_binary(&self, out: &mut Vec<u8>) {
        if self.is_null() {
            return;
        }
        match self {
            Value::Null => {}
            Value::Bool(v) => write_u8(out, u8::from(*v)),
            Value::TinyInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::SmallInt(v) => write_u16(out, *v as u16),
            Value::Int(v) => write_u32(out, *v as u32),
            Value::BigInt(v) => write_u64(out, *v as u64),
            Value::UnsignedBigInt(v) => write_u64(out, *v),
            Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Decimal(digits) => write_lenenc_bytes(out, digits.as_bytes()),
            Value::String(s) => write_lenenc_bytes(out, s.as_bytes()),
            Value::Bytes(b) => write_lenenc_bytes(out, b),
            Value::Date(d) => temporal::write_date_binary(d, out),
            Value::Time(t) => t.write_binary(out),
            Value::DateTime(dt) => dt.write_binary(out),
        }
    }

    /// Return a copy with fractional seconds turned off for temporal values.
    pub fn without_fractional_seconds(self) -> Self {
        match self {
            Value::Time(t) => Value::Time(t.with_fractional_seconds(false)),
            Value::DateTime(dt) => Value::DateTime(dt.with_fractional_seconds(false)),
            other => other,
        }
    }
}

/// Single-quote and backslash-escape a literal.
fn write_quoted(out: &mut Vec<u8>, data: &[u8]) {
    out.reserve(data.len() + 2);
    out.push(b'\'');
    for &byte in data {
        match byte {
            b'\0' => out.extend_from_slice(b"\\0"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(byte),
        }
    }
    out.push(b'\'');
}

// === Conversions ===

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

impl_from!(
    bool => Bool,
    i8 => TinyInt,
    i16 => SmallInt,
    u8 => SmallInt,
    i32 => Int,
    u16 => Int,
    i64 => BigInt,
    u32 => BigInt,
    u64 => UnsignedBigInt,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    TimeParameter => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTime,
    DateTimeParameter => DateTime,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
