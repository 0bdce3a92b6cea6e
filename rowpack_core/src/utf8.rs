//! Manual UTF-8 transcoding between bytes and chars.
//!
//! Only 1-3 byte sequences are handled, i.e. code points of the Basic
//! Multilingual Plane. Four-byte sequences and supplementary chars are
//! rejected rather than mangled.

use crate::error::{Error, Result};

/// Number of bytes `c` occupies: 1 up to U+007F, 2 up to U+07FF, else 3.
#[inline]
pub fn encoded_len(c: char) -> usize {
    match c as u32 {
        0..=0x7F => 1,
        0x80..=0x7FF => 2,
        _ => 3,
    }
}

pub fn encode_utf8(chars: &[char]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(chars.len());
    for &c in chars {
        let code = c as u32;
        match code {
            0..=0x7F => out.push(code as u8),
            0x80..=0x7FF => {
                out.push(0xC0 | (code >> 6) as u8);
                out.push(0x80 | (code & 0x3F) as u8);
            }
            0x800..=0xFFFF => {
                out.push(0xE0 | (code >> 12) as u8);
                out.push(0x80 | ((code >> 6) & 0x3F) as u8);
                out.push(0x80 | (code & 0x3F) as u8);
            }
            _ => return Err(Error::NonBmp { code_point: code }),
        }
    }
    Ok(out)
}

/// True when any two-byte or three-byte lead is followed by a continuation
/// byte, meaning a byte-per-char reading would be wrong.
pub fn is_dirty_utf8(bytes: &[u8]) -> bool {
    bytes
        .windows(2)
        .any(|w| matches!(w[0] >> 4, 0x0C..=0x0E) && w[1] >> 6 == 0x02)
}

/// Decode `bytes` into chars.
///
/// Input without any well-formed multi-byte sequence is read one char per
/// byte (ASCII and Latin-1 pass through). Otherwise decoding is strict.
pub fn decode_utf8(bytes: &[u8]) -> Result<Vec<char>> {
    if !is_dirty_utf8(bytes) {
        // No multi-byte sequence present: every byte is its own char.
        return Ok(bytes.iter().map(|&b| b as char).collect());
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut y = 0;
    while y < bytes.len() {
        let lead = bytes[y] as u32;
        let (code, width) = match lead >> 4 {
            0x0..=0x7 => (lead, 1),
            0xC | 0xD => {
                let c2 = continuation(bytes, y + 1)?;
                (((lead & 0x1F) << 6) | c2, 2)
            }
            0xE => {
                let c2 = continuation(bytes, y + 1)?;
                let c3 = continuation(bytes, y + 2)?;
                (((lead & 0x0F) << 12) | (c2 << 6) | c3, 3)
            }
            _ => return Err(Error::InvalidUtf8 { offset: y }),
        };
        let c = char::from_u32(code).ok_or(Error::InvalidUtf8 { offset: y })?;
        out.push(c);
        y += width;
    }
    Ok(out)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u32> {
    match bytes.get(at) {
        Some(&b) if b >> 6 == 0x02 => Ok((b & 0x3F) as u32),
        _ => Err(Error::InvalidUtf8 { offset: at }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_classes() {
        assert_eq!(encode_utf8(&['\u{7F}']).unwrap().len(), 1);
        assert_eq!(encode_utf8(&['\u{80}']).unwrap().len(), 2);
        assert_eq!(encode_utf8(&['\u{7FF}']).unwrap().len(), 2);
        assert_eq!(encode_utf8(&['\u{800}']).unwrap().len(), 3);
        assert_eq!(encode_utf8(&['\u{FFFF}']).unwrap().len(), 3);
    }

    #[test]
    fn rejects_supplementary_and_truncated() {
        assert_eq!(
            encode_utf8(&['\u{1F600}']),
            Err(Error::NonBmp { code_point: 0x1F600 })
        );
        assert_eq!(decode_utf8(&[0xE2, 0x82]), Err(Error::InvalidUtf8 { offset: 2 }));
        assert_eq!(
            decode_utf8(&[0xC3, 0xA9, 0xF0, 0x9F, 0x98, 0x80]),
            Err(Error::InvalidUtf8 { offset: 2 })
        );
    }

    #[test]
    fn dirty_detection() {
        assert!(!is_dirty_utf8(b"plain ascii"));
        assert!(is_dirty_utf8("caf\u{e9}".as_bytes()));
        assert_eq!(decode_utf8(&[b'c', 0xE9]).unwrap(), vec!['c', '\u{e9}']);
    }
}
