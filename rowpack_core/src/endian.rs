use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Byte order of fixed-width values inside a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Stable id stored in the RPAK1 header.
    pub fn id(self) -> u8 {
        match self {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ByteOrder::Little),
            1 => Some(ByteOrder::Big),
            _ => None,
        }
    }

    /// Write a known multi-byte pattern and inspect its low byte.
    fn detect() -> Self {
        let probe: u32 = 0x0102_0304;
        if probe.to_ne_bytes()[0] == 0x04 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// Fixed-size encode/decode of integers and IEEE floats in one byte order.
///
/// Floats go through their integer bit patterns, so every pair below is a
/// mirror image: `read_x(&write_x(v)) == v` for every representable `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndianCodec {
    order: ByteOrder,
}

static PLATFORM: OnceLock<EndianCodec> = OnceLock::new();

macro_rules! int_pair {
    ($write:ident, $read:ident, $ty:ty, $n:expr) => {
        pub fn $write(&self, v: $ty) -> [u8; $n] {
            match self.order {
                ByteOrder::Little => v.to_le_bytes(),
                ByteOrder::Big => v.to_be_bytes(),
            }
        }

        pub fn $read(&self, bytes: &[u8]) -> Result<$ty> {
            let buf: [u8; $n] = fixed(bytes, stringify!($ty))?;
            Ok(match self.order {
                ByteOrder::Little => <$ty>::from_le_bytes(buf),
                ByteOrder::Big => <$ty>::from_be_bytes(buf),
            })
        }
    };
}

impl EndianCodec {
    pub const fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    /// The process-wide codec for the detected platform order, resolved once.
    pub fn platform() -> &'static EndianCodec {
        PLATFORM.get_or_init(|| EndianCodec::new(ByteOrder::detect()))
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    int_pair!(write_i16, read_i16, i16, 2);
    int_pair!(write_u16, read_u16, u16, 2);
    int_pair!(write_i32, read_i32, i32, 4);
    int_pair!(write_u32, read_u32, u32, 4);
    int_pair!(write_i64, read_i64, i64, 8);
    int_pair!(write_u64, read_u64, u64, 8);

    pub fn write_f32(&self, v: f32) -> [u8; 4] {
        self.write_u32(v.to_bits())
    }

    pub fn read_f32(&self, bytes: &[u8]) -> Result<f32> {
        self.read_u32(bytes).map(f32::from_bits)
    }

    pub fn write_f64(&self, v: f64) -> [u8; 8] {
        self.write_u64(v.to_bits())
    }

    pub fn read_f64(&self, bytes: &[u8]) -> Result<f64> {
        self.read_u64(bytes).map(f64::from_bits)
    }
}

/// First `N` bytes of `bytes` as an array.
fn fixed<const N: usize>(bytes: &[u8], codec: &'static str) -> Result<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::ShortBuffer {
            codec,
            expected: N,
            found: bytes.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_matches_native_layout() {
        let codec = EndianCodec::platform();
        assert_eq!(codec.write_u32(0x0102_0304), 0x0102_0304u32.to_ne_bytes());
        assert!(std::ptr::eq(codec, EndianCodec::platform()));
    }

    #[test]
    fn big_endian_is_network_order() {
        let be = EndianCodec::new(ByteOrder::Big);
        assert_eq!(be.write_i16(0x0102), [0x01, 0x02]);
        assert_eq!(be.read_i64(&be.write_i64(i64::MIN)).unwrap(), i64::MIN);
    }

    #[test]
    fn short_input_is_reported() {
        let le = EndianCodec::new(ByteOrder::Little);
        assert_eq!(
            le.read_u32(&[1, 2]),
            Err(Error::ShortBuffer { codec: "u32", expected: 4, found: 2 })
        );
    }
}
