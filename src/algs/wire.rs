//! Fixed, versioned, little-endian wire types for the graph exchange.
//!
//! A row-block payload is a [`WireHdr`] followed by a flat sequence of
//! [`WireIndex`] words encoding `(row, count, col_1 .. col_count)` records.
//! Receivers never assume the byte buffer is aligned; words are read with
//! [`bytemuck::pod_read_unaligned`].

use bytemuck::{Pod, Zeroable};
use static_assertions::{assert_eq_align, assert_eq_size};

use crate::GlobalIndex;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Payload kind: row-block records.
pub const KIND_ROW_BLOCKS: u16 = 1;
/// Payload kind: a single reduction scalar.
pub const KIND_SCALAR: u16 = 2;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub const SIZE: usize = 8;

    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    /// Read a header from the front of an unaligned byte buffer.
    pub fn read(bytes: &[u8]) -> Option<Self> {
        bytes
            .get(..Self::SIZE)
            .map(bytemuck::pod_read_unaligned::<WireHdr>)
    }
}

/// Byte length announced during the size exchange.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireLen {
    pub n_le: u64,
}
impl WireLen {
    pub const SIZE: usize = 8;

    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// One word of a row-block record (a row, a count or a column).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireIndex {
    pub id_le: u64,
}
impl WireIndex {
    pub const SIZE: usize = 8;

    #[inline]
    pub fn of(id: GlobalIndex) -> Self {
        Self {
            id_le: (id as u64).to_le(),
        }
    }
    #[inline]
    pub fn get(&self) -> GlobalIndex {
        u64::from_le(self.id_le) as GlobalIndex
    }
    /// Read one word from an unaligned 8-byte chunk.
    #[inline]
    pub fn read(chunk: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(chunk)
    }
}

/// Scalars that travel through the reduction collectives as one LE word.
pub trait WireScalar: Copy {
    fn to_wire(self) -> u64;
    fn from_wire(w: u64) -> Self;
}

macro_rules! wire_scalar_int {
    ($($t:ty),*) => {$(
        impl WireScalar for $t {
            #[inline]
            fn to_wire(self) -> u64 {
                self as u64
            }
            #[inline]
            fn from_wire(w: u64) -> Self {
                w as $t
            }
        }
    )*};
}

wire_scalar_int!(u8, u16, u32, u64, usize, i32, i64);

impl WireScalar for f64 {
    #[inline]
    fn to_wire(self) -> u64 {
        self.to_bits()
    }
    #[inline]
    fn from_wire(w: u64) -> Self {
        f64::from_bits(w)
    }
}

/// Encode a scalar message: header + one word.
pub fn encode_scalar<T: WireScalar>(value: T) -> Vec<u8> {
    let mut out = Vec::with_capacity(WireHdr::SIZE + 8);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_SCALAR)));
    out.extend_from_slice(&value.to_wire().to_le_bytes());
    out
}

/// Decode a scalar message; `None` if the header or length is wrong.
pub fn decode_scalar<T: WireScalar>(bytes: &[u8]) -> Option<T> {
    let hdr = WireHdr::read(bytes)?;
    if hdr.version() != WIRE_VERSION || hdr.kind() != KIND_SCALAR {
        return None;
    }
    let word: [u8; 8] = bytes.get(WireHdr::SIZE..)?.try_into().ok()?;
    Some(T::from_wire(u64::from_le_bytes(word)))
}

/// Encode a row-block payload: header + the arena words.
pub fn encode_row_blocks(words: &[WireIndex]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WireHdr::SIZE + words.len() * WireIndex::SIZE);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_ROW_BLOCKS)));
    out.extend_from_slice(cast_slice(words));
    out
}

// ===== Compile-time sanity checks =========================================

assert_eq_size!(WireHdr, u64);
assert_eq_size!(WireLen, u64);
assert_eq_size!(WireIndex, u64);
assert_eq_align!(WireIndex, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_block_payload_layout() {
        let words = [WireIndex::of(19), WireIndex::of(2), WireIndex::of(7), WireIndex::of(39)];
        let bytes = encode_row_blocks(&words);
        assert_eq!(bytes.len(), WireHdr::SIZE + 4 * 8);
        let hdr = WireHdr::read(&bytes).unwrap();
        assert_eq!(hdr.kind(), KIND_ROW_BLOCKS);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(&bytes[8..16], &19u64.to_le_bytes());
        assert_eq!(WireIndex::read(&bytes[32..40]).get(), 39);
    }

    #[test]
    fn unaligned_word_read() {
        let mut raw = vec![0u8; 9];
        raw[1..9].copy_from_slice(&77u64.to_le_bytes());
        assert_eq!(WireIndex::read(&raw[1..9]).get(), 77);
    }

    #[test]
    fn scalar_messages() {
        assert_eq!(decode_scalar::<f64>(&encode_scalar(2.5f64)), Some(2.5));
        assert_eq!(decode_scalar::<i64>(&encode_scalar(-3i64)), Some(-3));
        let mut bad = encode_scalar(1u64);
        bad.pop();
        assert_eq!(decode_scalar::<u64>(&bad), None);
        assert_eq!(decode_scalar::<u64>(&encode_row_blocks(&[WireIndex::of(1)])), None);
    }
}
