//! Fuse two small fixed-width values into one 64-bit word.
//!
//! Every packable primitive has a fixed bit width (8/16/32/64) and a
//! total encode/decode to an unsigned bit pattern. Two values share a word
//! only when their widths add up to at most 64.

use std::marker::PhantomData;

use crate::error::{Error, Result};

/// A primitive with a fixed bit allocation. Booleans are deliberately not
/// packable.
pub trait BitAllocation: Copy {
    const BITS: u32;

    /// Bit pattern masked to `BITS`.
    fn to_bits(self) -> u64;

    /// Inverse of [`to_bits`](BitAllocation::to_bits); bits above `BITS`
    /// are ignored.
    fn from_bits(raw: u64) -> Self;
}

macro_rules! allocation {
    ($($ty:ty => $bits:expr, via $unsigned:ty;)*) => {$(
        impl BitAllocation for $ty {
            const BITS: u32 = $bits;

            #[inline]
            fn to_bits(self) -> u64 {
                (self as $unsigned) as u64 & mask($bits)
            }

            #[inline]
            fn from_bits(raw: u64) -> Self {
                (raw as $unsigned) as $ty
            }
        }
    )*};
}

allocation! {
    i8 => 8, via u8;
    u8 => 8, via u8;
    i16 => 16, via u16;
    u16 => 16, via u16;
    i32 => 32, via u32;
    u32 => 32, via u32;
    i64 => 64, via u64;
    u64 => 64, via u64;
}

impl BitAllocation for f32 {
    const BITS: u32 = 32;

    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    fn from_bits(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }
}

impl BitAllocation for f64 {
    const BITS: u32 = 64;

    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    fn from_bits(raw: u64) -> Self {
        f64::from_bits(raw)
    }
}

/// Chars take a full 32-bit slot; an invalid scalar decodes as U+FFFD.
impl BitAllocation for char {
    const BITS: u32 = 32;

    fn to_bits(self) -> u64 {
        self as u64
    }

    fn from_bits(raw: u64) -> Self {
        char::from_u32(raw as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// Low `width` bits set.
#[inline]
pub const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Concatenate two raw bit patterns: `a` in the high bits, `b` in the low.
pub fn pack_raw(a: (u64, u32), b: (u64, u32)) -> Result<u64> {
    let ((va, wa), (vb, wb)) = (a, b);
    if wa.checked_add(wb).map_or(true, |w| w > 64) {
        return Err(Error::TooWide {
            width_a: wa,
            width_b: wb,
        });
    }
    let high = if wb >= 64 { 0 } else { (va & mask(wa)) << wb };
    Ok(high | (vb & mask(wb)))
}

/// Split a word produced by [`pack_raw`] back into `(a, b)`.
pub fn unpack_raw(raw: u64, width_a: u32, width_b: u32) -> (u64, u64) {
    let b = raw & mask(width_b);
    let a = if width_b >= 64 { 0 } else { (raw >> width_b) & mask(width_a) };
    (a, b)
}

pub fn pack<A: BitAllocation, B: BitAllocation>(a: A, b: B) -> Result<u64> {
    pack_raw((a.to_bits(), A::BITS), (b.to_bits(), B::BITS))
}

pub fn unpack<A: BitAllocation, B: BitAllocation>(raw: u64) -> (A, B) {
    let (a, b) = unpack_raw(raw, A::BITS, B::BITS);
    (A::from_bits(a), B::from_bits(b))
}

/// Pair stored either as one packed word or as two plain fields, decided at
/// construction from the combined width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PackedPair<A, B> {
    Packed {
        raw: u64,
        width_a: u32,
        width_b: u32,
        _types: PhantomData<(A, B)>,
    },
    Unpacked(A, B),
}

impl<A: BitAllocation, B: BitAllocation> PackedPair<A, B> {
    pub fn new(a: A, b: B) -> Self {
        match pack(a, b) {
            Ok(raw) => PackedPair::Packed {
                raw,
                width_a: A::BITS,
                width_b: B::BITS,
                _types: PhantomData,
            },
            Err(_) => PackedPair::Unpacked(a, b),
        }
    }

    pub fn first(&self) -> A {
        match *self {
            PackedPair::Packed { raw, .. } => unpack::<A, B>(raw).0,
            PackedPair::Unpacked(a, _) => a,
        }
    }

    pub fn second(&self) -> B {
        match *self {
            PackedPair::Packed { raw, .. } => unpack::<A, B>(raw).1,
            PackedPair::Unpacked(_, b) => b,
        }
    }

    pub fn is_packed(&self) -> bool {
        matches!(self, PackedPair::Packed { .. })
    }

    /// The fused word, when packed.
    pub fn raw(&self) -> Option<u64> {
        match *self {
            PackedPair::Packed { raw, .. } => Some(raw),
            PackedPair::Unpacked(..) => None,
        }
    }

    pub fn into_parts(self) -> (A, B) {
        (self.first(), self.second())
    }
}
