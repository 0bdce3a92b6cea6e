use std::ops::Range;
use std::sync::Arc;

/// Random-access byte provider addressed with 64-bit offsets.
///
/// The tokenizer and the binary cursors only ever need a length and a byte
/// at an index, so in-memory buffers, file contents read up front, or any
/// caller-provided paged source can sit behind it.
pub trait ByteSource {
    fn len(&self) -> i64;

    /// Byte at `index`. Callers keep `0 <= index < len()`.
    fn get(&self, index: i64) -> u8;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `[range.start, range.end)` out of the source.
    fn copy_range(&self, range: Range<i64>) -> Vec<u8> {
        range.map(|i| self.get(i)).collect()
    }
}

impl ByteSource for [u8] {
    #[inline]
    fn len(&self) -> i64 {
        <[u8]>::len(self) as i64
    }

    #[inline]
    fn get(&self, index: i64) -> u8 {
        self[index as usize]
    }

    fn copy_range(&self, range: Range<i64>) -> Vec<u8> {
        self[range.start as usize..range.end as usize].to_vec()
    }
}

macro_rules! deref_source {
    ($($ty:ty),* $(,)?) => {$(
        impl ByteSource for $ty {
            #[inline]
            fn len(&self) -> i64 {
                <[u8] as ByteSource>::len(self)
            }

            #[inline]
            fn get(&self, index: i64) -> u8 {
                <[u8] as ByteSource>::get(self, index)
            }

            fn copy_range(&self, range: Range<i64>) -> Vec<u8> {
                <[u8] as ByteSource>::copy_range(self, range)
            }
        }
    )*};
}

deref_source!(Vec<u8>, Box<[u8]>, Arc<[u8]>);

impl<S: ByteSource + ?Sized> ByteSource for &S {
    #[inline]
    fn len(&self) -> i64 {
        (**self).len()
    }

    #[inline]
    fn get(&self, index: i64) -> u8 {
        (**self).get(index)
    }

    fn copy_range(&self, range: Range<i64>) -> Vec<u8> {
        (**self).copy_range(range)
    }
}
