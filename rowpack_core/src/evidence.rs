//! Per-column type inference from streamed CSV text.
//!
//! A [`TypeEvidence`] is fed one char at a time by the tokenizer and told
//! where each field ends. It never keeps the text itself: only flags, a
//! magnitude rank and counters survive a field. [`TypeEvidence::deduce`]
//! then picks the narrowest codec that holds every value seen.

use serde::{Deserialize, Serialize};

use crate::type_codec::TypeCodec;
use crate::utf8;

/// How large an integer field got, as the narrowest signed width that holds
/// it. Ranks only ever increase.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum MagnitudeRank {
    #[default]
    Byte,
    Short,
    Int,
    Long,
    /// Beyond i64; no integral codec is lossless.
    Overflow,
}

impl MagnitudeRank {
    fn of(magnitude: u128, negative: bool) -> Self {
        // Negative ranges reach one further than positive ones.
        let bound = |max: i64| max as u128 + negative as u128;
        if magnitude <= bound(i8::MAX as i64) {
            MagnitudeRank::Byte
        } else if magnitude <= bound(i16::MAX as i64) {
            MagnitudeRank::Short
        } else if magnitude <= bound(i32::MAX as i64) {
            MagnitudeRank::Int
        } else if magnitude <= bound(i64::MAX) {
            MagnitudeRank::Long
        } else {
            MagnitudeRank::Overflow
        }
    }

    pub fn codec(self) -> Option<TypeCodec> {
        match self {
            MagnitudeRank::Byte => Some(TypeCodec::Byte),
            MagnitudeRank::Short => Some(TypeCodec::Short),
            MagnitudeRank::Int => Some(TypeCodec::Int),
            MagnitudeRank::Long => Some(TypeCodec::Long),
            MagnitudeRank::Overflow => None,
        }
    }
}

/// Scan state of the field currently being fed.
#[derive(Debug, Clone, Default, PartialEq)]
struct FieldScan {
    chars: usize,
    /// UTF-8 bytes the field's chars take once decoded and re-encoded.
    encoded: usize,
    magnitude: u128,
    negative: bool,
    mantissa_digits: u32,
    dots: u32,
    in_exponent: bool,
    last: Option<char>,
}

/// Running classification of one column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEvidence {
    pub saw_non_digit: bool,
    pub saw_sign: bool,
    pub saw_dot: bool,
    pub saw_exponent: bool,
    pub magnitude: MagnitudeRank,
    /// Widest field seen, in bytes.
    pub column_length: u16,
    pub empty_count: u32,
    pub non_empty: u32,
    field: FieldScan,
}

/// Result of [`TypeEvidence::deduce`]: the codec and the slot width it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub codec: TypeCodec,
    pub width: u16,
}

impl TypeEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next char of the current field.
    pub fn push(&mut self, c: char) {
        let f = &mut self.field;
        f.chars += 1;
        f.encoded += utf8::encoded_len(c);
        match c {
            '0'..='9' => {
                if !f.in_exponent {
                    f.mantissa_digits += 1;
                    if f.dots == 0 {
                        let d = c as u128 - '0' as u128;
                        f.magnitude = f.magnitude.saturating_mul(10).saturating_add(d);
                    }
                }
            }
            '+' | '-' => {
                let after_exponent = matches!(f.last, Some('e' | 'E'));
                if f.chars == 1 {
                    f.negative = c == '-';
                    self.saw_sign = true;
                } else if after_exponent {
                    self.saw_sign = true;
                } else {
                    self.saw_non_digit = true;
                }
            }
            '.' => {
                if f.dots > 0 || f.in_exponent {
                    self.saw_non_digit = true;
                }
                f.dots += 1;
                self.saw_dot = true;
            }
            'e' | 'E' => {
                if f.in_exponent || f.mantissa_digits == 0 {
                    self.saw_non_digit = true;
                }
                f.in_exponent = true;
                self.saw_exponent = true;
            }
            _ => self.saw_non_digit = true,
        }
        f.last = Some(c);
    }

    /// Close the current field, `width` bytes wide in its source.
    ///
    /// The recorded length is the larger of `width` and the UTF-8 size of
    /// the chars fed, so a Latin-1 byte that decodes to a two-byte char
    /// still fits its slot.
    pub fn end_field(&mut self, width: usize) {
        let f = std::mem::take(&mut self.field);
        if width == 0 && f.chars == 0 {
            self.empty_count += 1;
            return;
        }
        self.non_empty += 1;
        let width = width.max(f.encoded);
        self.column_length = self.column_length.max(width.min(u16::MAX as usize) as u16);

        if f.chars == 0 {
            return;
        }
        let dangling = matches!(f.last, Some('+' | '-' | 'e' | 'E'));
        if dangling || f.mantissa_digits == 0 {
            self.saw_non_digit = true;
        } else if f.dots == 0 && !f.in_exponent {
            self.magnitude = self.magnitude.max(MagnitudeRank::of(f.magnitude, f.negative));
        }
    }

    /// Convenience for feeding a whole field at once.
    pub fn observe(&mut self, field: &str) {
        field.chars().for_each(|c| self.push(c));
        self.end_field(field.len());
    }

    /// Pick the narrowest codec that represents every observed value.
    ///
    /// Never fails: anything unrepresentable falls back to `String`, and a
    /// column with no content deduces to a zero-width `String`.
    pub fn deduce(&self) -> Deduction {
        let string = Deduction {
            codec: TypeCodec::String,
            width: self.column_length,
        };
        if self.non_empty == 0 {
            return Deduction {
                codec: TypeCodec::String,
                width: 0,
            };
        }
        if self.saw_non_digit || self.empty_count > 0 {
            return string;
        }
        let codec = if self.saw_dot || self.saw_exponent {
            Some(TypeCodec::Double)
        } else {
            self.magnitude.codec()
        };
        match codec {
            Some(codec) => Deduction {
                codec,
                width: codec.network_size().unwrap_or_default() as u16,
            },
            None => string,
        }
    }

    /// Fold another pass over the same column into this one.
    ///
    /// Flags OR, ranks and widths take the max, counters add up.
    pub fn merge(&mut self, other: &TypeEvidence) {
        self.saw_non_digit |= other.saw_non_digit;
        self.saw_sign |= other.saw_sign;
        self.saw_dot |= other.saw_dot;
        self.saw_exponent |= other.saw_exponent;
        self.magnitude = self.magnitude.max(other.magnitude);
        self.column_length = self.column_length.max(other.column_length);
        self.empty_count += other.empty_count;
        self.non_empty += other.non_empty;
    }

    /// Merge one line's per-column evidence into the file-level evidence,
    /// growing it when the line is wider.
    pub fn merge_all(file: &mut Vec<TypeEvidence>, line: &[TypeEvidence]) {
        if file.len() < line.len() {
            file.resize_with(line.len(), TypeEvidence::default);
        }
        for (acc, ev) in file.iter_mut().zip(line) {
            acc.merge(ev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deduce(fields: &[&str]) -> Deduction {
        let mut ev = TypeEvidence::new();
        fields.iter().for_each(|f| ev.observe(f));
        ev.deduce()
    }

    #[test]
    fn magnitude_thresholds() {
        assert_eq!(MagnitudeRank::of(127, false), MagnitudeRank::Byte);
        assert_eq!(MagnitudeRank::of(128, false), MagnitudeRank::Short);
        assert_eq!(MagnitudeRank::of(128, true), MagnitudeRank::Byte);
        assert_eq!(MagnitudeRank::of(1 << 63, true), MagnitudeRank::Long);
        assert_eq!(MagnitudeRank::of(1 << 63, false), MagnitudeRank::Overflow);
    }

    #[test]
    fn sign_only_leads_or_follows_exponent() {
        assert_eq!(deduce(&["-5", "+7"]).codec, TypeCodec::Byte);
        assert_eq!(deduce(&["1e-5"]).codec, TypeCodec::Double);
        assert_eq!(deduce(&["1-5"]).codec, TypeCodec::String);
        assert_eq!(deduce(&["-"]).codec, TypeCodec::String);
        assert_eq!(deduce(&["1e"]).codec, TypeCodec::String);
    }

    #[test]
    fn empty_fields() {
        assert_eq!(deduce(&["", ""]), Deduction { codec: TypeCodec::String, width: 0 });
        assert_eq!(deduce(&["12", ""]).codec, TypeCodec::String);
    }

    #[test]
    fn width_covers_reencoded_chars() {
        let mut ev = TypeEvidence::new();
        "caf\u{e9}".chars().for_each(|c| ev.push(c));
        ev.end_field(4);
        assert_eq!(ev.deduce(), Deduction { codec: TypeCodec::String, width: 5 });
    }

    #[test]
    fn merge_takes_widest() {
        let mut a = TypeEvidence::new();
        a.observe("12");
        let mut b = TypeEvidence::new();
        b.observe("40000");
        let mut file = vec![a];
        TypeEvidence::merge_all(&mut file, &[b, TypeEvidence::new()]);
        assert_eq!(file.len(), 2);
        assert_eq!(file[0].deduce().codec, TypeCodec::Int);
        assert_eq!(file[0].non_empty, 2);
    }
}
