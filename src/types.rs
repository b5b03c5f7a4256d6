//! Shared record definitions
//!
//! Keys and values are fixed-width and laid out little-endian, so every record
//! in an SSTable has the same size and can be addressed by index.

use bytes::{Buf, BufMut};

/// A (key, value) pair as stored in the memtable and in SSTables
pub type Entry<K, V> = (K, V);

/// A plain value with a fixed little-endian byte layout.
pub trait FixedWidth: Copy + Sized {
    /// Encoded size in bytes
    const WIDTH: usize;

    /// Append exactly `WIDTH` bytes to `buf`
    fn encode<B: BufMut>(&self, buf: &mut B);

    /// Consume exactly `WIDTH` bytes from `buf`.
    ///
    /// Panics if fewer than `WIDTH` bytes remain.
    fn decode<B: Buf>(buf: &mut B) -> Self;
}

/// A key type: totally ordered, and representable in the SSTable header's
/// 64-bit min/max slots.
pub trait SortKey: FixedWidth + Ord {
    /// Bit pattern stored in the header
    fn to_header_word(&self) -> u64;

    /// Inverse of `to_header_word`
    fn from_header_word(word: u64) -> Self;
}

/// Logical size of one entry: the memtable budget unit and the SSTable record size
pub const fn entry_size<K: FixedWidth, V: FixedWidth>() -> usize {
    K::WIDTH + V::WIDTH
}

macro_rules! impl_fixed_width_int {
    ($($t:ty),* $(,)?) => {$(
        impl FixedWidth for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn encode<B: BufMut>(&self, buf: &mut B) {
                buf.put_slice(&self.to_le_bytes());
            }

            fn decode<B: Buf>(buf: &mut B) -> Self {
                let mut bytes = [0u8; std::mem::size_of::<$t>()];
                buf.copy_to_slice(&mut bytes);
                <$t>::from_le_bytes(bytes)
            }
        }
    )*};
}

impl_fixed_width_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl<const N: usize> FixedWidth for [u8; N] {
    const WIDTH: usize = N;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self);
    }

    fn decode<B: Buf>(buf: &mut B) -> Self {
        let mut bytes = [0u8; N];
        buf.copy_to_slice(&mut bytes);
        bytes
    }
}

// Signed keys round-trip through their two's-complement bit pattern; the
// header words are only ever compared after decoding back to `Self`.
macro_rules! impl_sort_key {
    ($($t:ty),* $(,)?) => {$(
        impl SortKey for $t {
            fn to_header_word(&self) -> u64 {
                *self as u64
            }

            fn from_header_word(word: u64) -> Self {
                word as $t
            }
        }
    )*};
}

impl_sort_key!(u8, u16, u32, u64, i8, i16, i32, i64);
