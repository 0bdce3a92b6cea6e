//! Text grammars used to ingest CSV fields.

use crate::error::{Error, Result};

/// `t`/`1` are true and `f`/`0` are false, judged on the first char,
/// case-insensitively.
pub fn parse_bool(text: &[char]) -> Result<bool> {
    match text.first().map(|c| c.to_ascii_lowercase()) {
        Some('t') | Some('1') => Ok(true),
        Some('f') | Some('0') => Ok(false),
        _ => Err(Error::InvalidBoolean(text.iter().collect())),
    }
}

/// Optional sign then digits, accumulated as `value * 10 + digit`.
///
/// Accumulation wraps instead of checking overflow; picking a codec wide
/// enough for the column is the job of evidence deduction.
pub fn parse_long(text: &[char]) -> Result<i64> {
    let (negative, digits) = split_sign(text);
    if digits.is_empty() {
        return Err(Error::malformed(text, "no digits"));
    }
    let mut value: i64 = 0;
    for &c in digits {
        let d = c
            .to_digit(10)
            .ok_or_else(|| Error::malformed(text, "unexpected character"))?;
        value = value.wrapping_mul(10).wrapping_add(d as i64);
    }
    Ok(if negative { value.wrapping_neg() } else { value })
}

/// `[sign] digits [. digits] [(E|e) [sign] digits]`.
///
/// The result is `sign * mantissa * 10^(exponent - digits_after_dot)`. A
/// negative sign on a zero mantissa yields `-0.0`.
pub fn parse_double(text: &[char]) -> Result<f64> {
    let (negative, body) = split_sign(text);
    let mut mantissa = 0f64;
    let mut mantissa_digits = 0usize;
    let mut after_dot: i32 = 0;
    let mut seen_dot = false;
    let mut exponent: Option<(bool, i32, usize)> = None;

    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if let Some((exp_negative, exp, exp_digits)) = exponent.as_mut() {
            match c {
                '+' | '-' if *exp_digits == 0 && matches!(body[i - 1], 'e' | 'E') => {
                    *exp_negative = c == '-';
                }
                '0'..='9' => {
                    *exp = exp.saturating_mul(10).saturating_add(c as i32 - '0' as i32);
                    *exp_digits += 1;
                }
                '.' => return Err(Error::malformed(text, "decimal point in exponent")),
                'e' | 'E' => return Err(Error::malformed(text, "second exponent")),
                _ => return Err(Error::malformed(text, "unexpected character")),
            }
        } else {
            match c {
                '0'..='9' => {
                    mantissa = mantissa * 10.0 + (c as u32 - '0' as u32) as f64;
                    mantissa_digits += 1;
                    if seen_dot {
                        after_dot += 1;
                    }
                }
                '.' if seen_dot => return Err(Error::malformed(text, "second decimal point")),
                '.' => seen_dot = true,
                'e' | 'E' => exponent = Some((false, 0, 0)),
                _ => return Err(Error::malformed(text, "unexpected character")),
            }
        }
        i += 1;
    }

    if mantissa_digits == 0 {
        return Err(Error::malformed(text, "no digits"));
    }
    let exp = match exponent {
        Some((_, _, 0)) => return Err(Error::malformed(text, "exponent without digits")),
        Some((true, e, _)) => -e,
        Some((false, e, _)) => e,
        None => 0,
    };
    let scale = exp.saturating_sub(after_dot);
    let magnitude = if scale < 0 {
        mantissa / 10f64.powi(-scale)
    } else {
        mantissa * 10f64.powi(scale)
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn split_sign(text: &[char]) -> (bool, &[char]) {
    match text.first() {
        Some('-') => (true, &text[1..]),
        Some('+') => (false, &text[1..]),
        _ => (false, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn long_grammar() {
        assert_eq!(parse_long(&chars("-42")).unwrap(), -42);
        assert_eq!(parse_long(&chars("+7")).unwrap(), 7);
        assert!(matches!(parse_long(&chars("-")), Err(Error::MalformedNumber { .. })));
        assert!(matches!(parse_long(&chars("4x")), Err(Error::MalformedNumber { .. })));
    }

    #[test]
    fn double_grammar() {
        assert_eq!(parse_double(&chars("12.5")).unwrap(), 12.5);
        assert_eq!(parse_double(&chars("-3.25e2")).unwrap(), -325.0);
        assert_eq!(parse_double(&chars("1E-3")).unwrap(), 0.001);
        assert_eq!(parse_double(&chars(".5")).unwrap(), 0.5);
        assert!(parse_double(&chars("-0.0")).unwrap().is_sign_negative());
    }

    #[test]
    fn double_rejects_repeated_markers() {
        for bad in ["1.2.3", "1e2e3", "1e2.5", "e5", "1e", "--1", "1-2"] {
            assert!(
                matches!(parse_double(&chars(bad)), Err(Error::MalformedNumber { .. })),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn bool_first_char() {
        assert!(parse_bool(&chars("TRUE")).unwrap());
        assert!(!parse_bool(&chars("0")).unwrap());
        assert_eq!(
            parse_bool(&chars("yes")),
            Err(Error::InvalidBoolean("yes".into()))
        );
    }
}
