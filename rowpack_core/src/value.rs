use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::type_codec::TypeCodec;
use crate::window::CharWindow;

/// One decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    UByte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Date(NaiveDate),
    Instant(DateTime<Utc>),
    String(String),
    Chars(CharWindow),
    Bytes(Vec<u8>),
    Nothing,
}

impl Value {
    /// The codec that naturally describes this value.
    pub fn codec(&self) -> TypeCodec {
        match self {
            Value::Bool(_) => TypeCodec::Boolean,
            Value::Byte(_) => TypeCodec::Byte,
            Value::UByte(_) => TypeCodec::UByte,
            Value::Short(_) => TypeCodec::Short,
            Value::UShort(_) => TypeCodec::UShort,
            Value::Int(_) => TypeCodec::Int,
            Value::UInt(_) => TypeCodec::UInt,
            Value::Long(_) => TypeCodec::Long,
            Value::ULong(_) => TypeCodec::ULong,
            Value::Float(_) => TypeCodec::Float,
            Value::Double(_) => TypeCodec::Double,
            Value::Date(_) => TypeCodec::Date,
            Value::Instant(_) => TypeCodec::Instant,
            Value::String(_) => TypeCodec::String,
            Value::Chars(_) => TypeCodec::Chars,
            Value::Bytes(_) => TypeCodec::Bytes,
            Value::Nothing => TypeCodec::Nothing,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.codec().name()
    }

    /// Integral payload widened to i128, for lossless cross-width moves.
    pub(crate) fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::Bool(b) => b as i128,
            Value::Byte(v) => v as i128,
            Value::UByte(v) => v as i128,
            Value::Short(v) => v as i128,
            Value::UShort(v) => v as i128,
            Value::Int(v) => v as i128,
            Value::UInt(v) => v as i128,
            Value::Long(v) => v as i128,
            Value::ULong(v) => v as i128,
            _ => return None,
        })
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::UByte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::UShort(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::ULong(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Instant(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::String(s) => f.write_str(s),
            Value::Chars(w) => write!(f, "{w}"),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Nothing => Ok(()),
        }
    }
}

macro_rules! from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

from_primitive! {
    bool => Bool,
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    NaiveDate => Date,
    String => String,
    Vec<u8> => Bytes,
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Instant(t)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
