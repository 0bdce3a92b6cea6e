use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::endian::EndianCodec;
use crate::error::{Error, Result};
use crate::text;
use crate::utf8;
use crate::value::Value;
use crate::window::CharWindow;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// One logical value type with its binary and text encodings.
///
/// Codecs are plain `Copy` tags: they carry no state, so the registry is the
/// enum itself and every entry can be shared freely across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCodec {
    Boolean,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Date,
    Instant,
    String,
    Chars,
    Bytes,
    Nothing,
}

impl TypeCodec {
    pub const ALL: [TypeCodec; 17] = [
        TypeCodec::Boolean,
        TypeCodec::Byte,
        TypeCodec::UByte,
        TypeCodec::Short,
        TypeCodec::UShort,
        TypeCodec::Int,
        TypeCodec::UInt,
        TypeCodec::Long,
        TypeCodec::ULong,
        TypeCodec::Float,
        TypeCodec::Double,
        TypeCodec::Date,
        TypeCodec::Instant,
        TypeCodec::String,
        TypeCodec::Chars,
        TypeCodec::Bytes,
        TypeCodec::Nothing,
    ];

    /// Stable id persisted in row-file schemas.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeCodec::Boolean => "bool",
            TypeCodec::Byte => "i8",
            TypeCodec::UByte => "u8",
            TypeCodec::Short => "i16",
            TypeCodec::UShort => "u16",
            TypeCodec::Int => "i32",
            TypeCodec::UInt => "u32",
            TypeCodec::Long => "i64",
            TypeCodec::ULong => "u64",
            TypeCodec::Float => "f32",
            TypeCodec::Double => "f64",
            TypeCodec::Date => "date",
            TypeCodec::Instant => "instant",
            TypeCodec::String => "string",
            TypeCodec::Chars => "chars",
            TypeCodec::Bytes => "bytes",
            TypeCodec::Nothing => "none",
        }
    }

    /// Fixed encoded width in bytes; `None` for variable-length codecs.
    pub fn network_size(self) -> Option<u32> {
        match self {
            TypeCodec::Boolean | TypeCodec::Byte | TypeCodec::UByte => Some(1),
            TypeCodec::Short | TypeCodec::UShort => Some(2),
            TypeCodec::Int | TypeCodec::UInt | TypeCodec::Float => Some(4),
            TypeCodec::Long | TypeCodec::ULong | TypeCodec::Double | TypeCodec::Date => Some(8),
            TypeCodec::Instant => Some(12),
            TypeCodec::String | TypeCodec::Chars | TypeCodec::Bytes | TypeCodec::Nothing => None,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeCodec::Byte
                | TypeCodec::UByte
                | TypeCodec::Short
                | TypeCodec::UShort
                | TypeCodec::Int
                | TypeCodec::UInt
                | TypeCodec::Long
                | TypeCodec::ULong
        )
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral() || matches!(self, TypeCodec::Float | TypeCodec::Double)
    }

    /// Encode with the process-wide platform byte order.
    pub fn encode(self, value: &Value) -> Result<Vec<u8>> {
        self.encode_with(EndianCodec::platform(), value)
    }

    pub fn encode_with(self, endian: &EndianCodec, value: &Value) -> Result<Vec<u8>> {
        let bytes = match (self, value) {
            (TypeCodec::Boolean, Value::Bool(b)) => vec![*b as u8],
            (TypeCodec::Byte, Value::Byte(v)) => vec![*v as u8],
            (TypeCodec::UByte, Value::UByte(v)) => vec![*v],
            (TypeCodec::Short, Value::Short(v)) => endian.write_i16(*v).to_vec(),
            (TypeCodec::UShort, Value::UShort(v)) => endian.write_u16(*v).to_vec(),
            (TypeCodec::Int, Value::Int(v)) => endian.write_i32(*v).to_vec(),
            (TypeCodec::UInt, Value::UInt(v)) => endian.write_u32(*v).to_vec(),
            (TypeCodec::Long, Value::Long(v)) => endian.write_i64(*v).to_vec(),
            (TypeCodec::ULong, Value::ULong(v)) => endian.write_u64(*v).to_vec(),
            (TypeCodec::Float, Value::Float(v)) => endian.write_f32(*v).to_vec(),
            (TypeCodec::Double, Value::Double(v)) => endian.write_f64(*v).to_vec(),
            (TypeCodec::Date, Value::Date(d)) => endian.write_i64(epoch_days(d)).to_vec(),
            (TypeCodec::Date, Value::Instant(t)) => {
                endian.write_i64(epoch_days(&t.date_naive())).to_vec()
            }
            (TypeCodec::Instant, Value::Instant(t)) => {
                let mut out = Vec::with_capacity(12);
                out.extend_from_slice(&endian.write_i64(t.timestamp()));
                out.extend_from_slice(&endian.write_i32(t.timestamp_subsec_nanos() as i32));
                out
            }
            (TypeCodec::String, Value::String(s)) => s.as_bytes().to_vec(),
            (TypeCodec::String, Value::Chars(w)) => w.as_string().into_bytes(),
            (TypeCodec::Chars, Value::Chars(w)) => utf8::encode_utf8(w.as_slice())?,
            (TypeCodec::Chars, Value::String(s)) => {
                utf8::encode_utf8(&s.chars().collect::<Vec<_>>())?
            }
            (TypeCodec::Bytes, Value::Bytes(b)) => b.clone(),
            (TypeCodec::Nothing, _) => Vec::new(),
            (codec, other) => {
                return Err(Error::TypeMismatch {
                    codec,
                    found: other.kind(),
                })
            }
        };
        Ok(bytes)
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Value> {
        self.decode_with(EndianCodec::platform(), bytes)
    }

    pub fn decode_with(self, endian: &EndianCodec, bytes: &[u8]) -> Result<Value> {
        Ok(match self {
            TypeCodec::Boolean => match first(bytes, "bool")? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                b => return Err(Error::InvalidBoolean(format!("{b:#04x}"))),
            },
            TypeCodec::Byte => Value::Byte(first(bytes, "i8")? as i8),
            TypeCodec::UByte => Value::UByte(first(bytes, "u8")?),
            TypeCodec::Short => Value::Short(endian.read_i16(bytes)?),
            TypeCodec::UShort => Value::UShort(endian.read_u16(bytes)?),
            TypeCodec::Int => Value::Int(endian.read_i32(bytes)?),
            TypeCodec::UInt => Value::UInt(endian.read_u32(bytes)?),
            TypeCodec::Long => Value::Long(endian.read_i64(bytes)?),
            TypeCodec::ULong => Value::ULong(endian.read_u64(bytes)?),
            TypeCodec::Float => Value::Float(endian.read_f32(bytes)?),
            TypeCodec::Double => Value::Double(endian.read_f64(bytes)?),
            TypeCodec::Date => Value::Date(date_from_epoch_days(endian.read_i64(bytes)?)?),
            TypeCodec::Instant => {
                if bytes.len() < 12 {
                    return Err(Error::ShortBuffer {
                        codec: "instant",
                        expected: 12,
                        found: bytes.len(),
                    });
                }
                let secs = endian.read_i64(&bytes[..8])?;
                let nanos = endian.read_i32(&bytes[8..12])?;
                Value::Instant(instant_from_parts(secs, nanos)?)
            }
            TypeCodec::String => match std::str::from_utf8(bytes) {
                Ok(s) => Value::String(s.to_string()),
                Err(e) => {
                    return Err(Error::InvalidUtf8 {
                        offset: e.valid_up_to(),
                    })
                }
            },
            TypeCodec::Chars => Value::Chars(CharWindow::new(utf8::decode_utf8(bytes)?)),
            TypeCodec::Bytes => Value::Bytes(bytes.to_vec()),
            TypeCodec::Nothing => Value::Nothing,
        })
    }

    /// Parse CSV field text. Surrounding whitespace is ignored for every
    /// codec except `String` and `Chars`, which keep the text verbatim.
    pub fn parse_text(self, text: &[char]) -> Result<Value> {
        let trimmed = trim(text);
        Ok(match self {
            TypeCodec::String => Value::String(text.iter().collect()),
            TypeCodec::Chars => Value::Chars(CharWindow::new(text.to_vec())),
            TypeCodec::Boolean => Value::Bool(text::parse_bool(trimmed)?),
            TypeCodec::Byte => Value::Byte(text::parse_long(trimmed)? as i8),
            TypeCodec::UByte => Value::UByte(text::parse_long(trimmed)? as u8),
            TypeCodec::Short => Value::Short(text::parse_long(trimmed)? as i16),
            TypeCodec::UShort => Value::UShort(text::parse_long(trimmed)? as u16),
            TypeCodec::Int => Value::Int(text::parse_long(trimmed)? as i32),
            TypeCodec::UInt => Value::UInt(text::parse_long(trimmed)? as u32),
            TypeCodec::Long => Value::Long(text::parse_long(trimmed)?),
            TypeCodec::ULong => Value::ULong(text::parse_long(trimmed)? as u64),
            TypeCodec::Float => Value::Float(text::parse_double(trimmed)? as f32),
            TypeCodec::Double => Value::Double(text::parse_double(trimmed)?),
            TypeCodec::Date => {
                let s: String = trimmed.iter().collect();
                match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                    Ok(date) => Value::Date(date),
                    Err(_) => return Err(Error::InvalidTemporal { kind: "date", text: s }),
                }
            }
            TypeCodec::Instant => {
                let s: String = trimmed.iter().collect();
                match DateTime::parse_from_rfc3339(&s) {
                    Ok(t) => Value::Instant(t.with_timezone(&Utc)),
                    Err(_) => return Err(Error::InvalidTemporal { kind: "instant", text: s }),
                }
            }
            TypeCodec::Bytes => Value::Bytes(parse_hex(trimmed)?),
            TypeCodec::Nothing => Value::Nothing,
        })
    }

    pub fn parse_str(self, text: &str) -> Result<Value> {
        self.parse_text(&text.chars().collect::<Vec<_>>())
    }

    /// Convert `value` into the representation of `to`.
    ///
    /// Numbers move through their natural width and must fit the target.
    /// Text parses with the target's grammar. Every value renders to text.
    pub fn convert(value: &Value, to: TypeCodec) -> Result<Value> {
        if value.codec() == to {
            return Ok(value.clone());
        }
        match (to, value) {
            (TypeCodec::String, v) => Ok(Value::String(v.to_string())),
            (TypeCodec::Chars, v) => Ok(Value::Chars(CharWindow::from(v.to_string().as_str()))),
            (TypeCodec::Nothing, _) => Ok(Value::Nothing),
            (to, Value::String(s)) => to.parse_str(s),
            (to, Value::Chars(w)) => to.parse_text(w.as_slice()),
            (TypeCodec::Bytes, v) => Ok(Value::Bytes(v.codec().encode(v)?)),
            (TypeCodec::Boolean, v) => match v.as_f64() {
                Some(n) if n == 0.0 => Ok(Value::Bool(false)),
                Some(n) if n == 1.0 => Ok(Value::Bool(true)),
                _ => Err(Error::InvalidBoolean(v.to_string())),
            },
            (to, v) if to.is_integral() => {
                let wide = match (v.as_i128(), v.as_f64()) {
                    (Some(i), _) => Some(i),
                    (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1.8e19 => Some(f as i128),
                    (None, _) => match v {
                        Value::Date(d) => Some(epoch_days(d) as i128),
                        Value::Instant(t) => Some(t.timestamp() as i128),
                        _ => None,
                    },
                };
                match wide {
                    Some(i) => narrow(to, i).ok_or_else(|| Error::MalformedNumber {
                        text: v.to_string(),
                        reason: "out of range for target codec",
                    }),
                    None => Err(mismatch(to, v)),
                }
            }
            (TypeCodec::Float, v) => match (v, v.as_f64()) {
                (Value::Double(wide), _) => {
                    let cast = *wide as f32;
                    if (cast as f64 - wide).abs() > 1e-6 {
                        return Err(Error::MalformedNumber {
                            text: v.to_string(),
                            reason: "precision lost converting to f32",
                        });
                    }
                    Ok(Value::Float(cast))
                }
                (_, Some(wide)) => Ok(Value::Float(wide as f32)),
                (_, None) => Err(mismatch(TypeCodec::Float, v)),
            },
            (TypeCodec::Double, v) => v
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| mismatch(TypeCodec::Double, v)),
            (TypeCodec::Date, Value::Instant(t)) => Ok(Value::Date(t.date_naive())),
            (TypeCodec::Date, v) => {
                let days = v
                    .as_i128()
                    .and_then(|d| i64::try_from(d).ok())
                    .ok_or_else(|| mismatch(TypeCodec::Date, v))?;
                Ok(Value::Date(date_from_epoch_days(days)?))
            }
            (TypeCodec::Instant, Value::Date(d)) => {
                Ok(Value::Instant(instant_from_parts(epoch_days(d) * 86_400, 0)?))
            }
            (TypeCodec::Instant, v) => {
                let secs = v
                    .as_i128()
                    .and_then(|s| i64::try_from(s).ok())
                    .ok_or_else(|| mismatch(TypeCodec::Instant, v))?;
                Ok(Value::Instant(instant_from_parts(secs, 0)?))
            }
            (to, v) => Err(mismatch(to, v)),
        }
    }
}

impl fmt::Display for TypeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let codec = match lower.as_str() {
            "bool" | "boolean" => TypeCodec::Boolean,
            "i8" | "byte" => TypeCodec::Byte,
            "u8" | "ubyte" => TypeCodec::UByte,
            "i16" | "short" => TypeCodec::Short,
            "u16" | "ushort" => TypeCodec::UShort,
            "i32" | "int" => TypeCodec::Int,
            "u32" | "uint" => TypeCodec::UInt,
            "i64" | "long" => TypeCodec::Long,
            "u64" | "ulong" => TypeCodec::ULong,
            "f32" | "float" => TypeCodec::Float,
            "f64" | "double" => TypeCodec::Double,
            "date" => TypeCodec::Date,
            "instant" | "timestamp" => TypeCodec::Instant,
            "string" | "str" | "text" => TypeCodec::String,
            "chars" => TypeCodec::Chars,
            "bytes" => TypeCodec::Bytes,
            "none" | "nothing" => TypeCodec::Nothing,
            _ => return Err(Error::UnknownCodec(s.to_string())),
        };
        Ok(codec)
    }
}

fn first(bytes: &[u8], codec: &'static str) -> Result<u8> {
    bytes.first().copied().ok_or(Error::ShortBuffer {
        codec,
        expected: 1,
        found: 0,
    })
}

fn mismatch(codec: TypeCodec, value: &Value) -> Error {
    Error::TypeMismatch {
        codec,
        found: value.kind(),
    }
}

fn trim(text: &[char]) -> &[char] {
    let start = text.iter().position(|c| !c.is_whitespace()).unwrap_or(text.len());
    let end = text.iter().rposition(|c| !c.is_whitespace()).map_or(start, |i| i + 1);
    &text[start..end]
}

fn epoch_days(date: &NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE
}

fn date_from_epoch_days(days: i64) -> Result<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(|ce| i32::try_from(ce).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or(Error::InvalidTemporal {
            kind: "date",
            text: days.to_string(),
        })
}

fn instant_from_parts(secs: i64, nanos: i32) -> Result<DateTime<Utc>> {
    u32::try_from(nanos)
        .ok()
        .and_then(|n| DateTime::from_timestamp(secs, n))
        .ok_or(Error::InvalidTemporal {
            kind: "instant",
            text: format!("{secs}s+{nanos}ns"),
        })
}

fn narrow(to: TypeCodec, v: i128) -> Option<Value> {
    match to {
        TypeCodec::Byte => i8::try_from(v).ok().map(Value::Byte),
        TypeCodec::UByte => u8::try_from(v).ok().map(Value::UByte),
        TypeCodec::Short => i16::try_from(v).ok().map(Value::Short),
        TypeCodec::UShort => u16::try_from(v).ok().map(Value::UShort),
        TypeCodec::Int => i32::try_from(v).ok().map(Value::Int),
        TypeCodec::UInt => u32::try_from(v).ok().map(Value::UInt),
        TypeCodec::Long => i64::try_from(v).ok().map(Value::Long),
        TypeCodec::ULong => u64::try_from(v).ok().map(Value::ULong),
        _ => None,
    }
}

fn parse_hex(text: &[char]) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::malformed(text, "odd number of hex digits"));
    }
    text.chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(h), Some(l)) => Ok((h * 16 + l) as u8),
                _ => Err(Error::malformed(text, "invalid hex digit")),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_dense() {
        for (i, codec) in TypeCodec::ALL.iter().enumerate() {
            assert_eq!(codec.id() as usize, i);
            assert_eq!(TypeCodec::from_id(codec.id()), Some(*codec));
            assert_eq!(codec.name().parse::<TypeCodec>().unwrap(), *codec);
        }
        assert_eq!(TypeCodec::from_id(17), None);
    }

    #[test]
    fn epoch_day_zero_is_1970() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_days(&epoch), 0);
        assert_eq!(date_from_epoch_days(0).unwrap(), epoch);
        assert_eq!(date_from_epoch_days(-1).unwrap().year(), 1969);
    }

    #[test]
    fn epoch_days_beyond_the_calendar_fail() {
        for days in [i64::MAX, i64::MIN, i64::MAX - UNIX_EPOCH_DAYS_FROM_CE + 1] {
            assert!(matches!(
                date_from_epoch_days(days),
                Err(Error::InvalidTemporal { kind: "date", .. })
            ));
        }
        assert!(matches!(
            TypeCodec::Date.decode(&i64::MAX.to_ne_bytes()),
            Err(Error::InvalidTemporal { .. })
        ));
    }

    #[test]
    fn hex_text() {
        assert_eq!(TypeCodec::Bytes.parse_str("00ff10").unwrap(), Value::Bytes(vec![0, 255, 16]));
        assert!(TypeCodec::Bytes.parse_str("abc").is_err());
    }
}
