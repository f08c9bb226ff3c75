//! # Wire Encoding
//!
//! CompactSize integers, a bounds-checked byte [`Reader`], and the
//! [`Encodable`]/[`Decodable`] pair implemented by every wire type.
//!
//! ## CompactSize
//!
//! ```text
//! value < 0xfd          -> [value]
//! value <= 0xffff       -> [0xfd][u16 LE]
//! value <= 0xffff_ffff  -> [0xfe][u32 LE]
//! otherwise             -> [0xff][u64 LE]
//! ```
//!
//! Decoding rejects non-canonical encodings, exactly like the reference node.

use crate::entities::Hash;
use crate::errors::{DecodeError, Result};

/// Largest length prefix accepted when decoding (32 MiB).
pub const MAX_SIZE: u64 = 0x0200_0000;

/// Number of bytes the CompactSize encoding of `n` occupies.
#[inline]
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append the CompactSize encoding of `n`.
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Append a CompactSize length followed by the bytes themselves.
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Bounds-checked cursor over a byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEnd {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_hash(&mut self) -> Result<Hash> {
        self.take_array()
    }

    /// Read a canonical CompactSize integer.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let prefix = self.read_u8()?;
        let (value, min) = match prefix {
            0xfd => (u64::from(u16::from_le_bytes(self.take_array()?)), 0xfd),
            0xfe => (u64::from(self.read_u32_le()?), 0x1_0000),
            0xff => (self.read_u64_le()?, 0x1_0000_0000),
            b => return Ok(u64::from(b)),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalCompactSize { prefix, value });
        }
        Ok(value)
    }

    /// Read a CompactSize that is used as a length or element count.
    pub fn read_length(&mut self) -> Result<usize> {
        let length = self.read_compact_size()?;
        if length > MAX_SIZE {
            return Err(DecodeError::LengthTooLarge {
                length,
                max: MAX_SIZE,
            });
        }
        Ok(length as usize)
    }

    /// Read a CompactSize-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { count }),
        }
    }
}

/// A value with a fixed wire layout.
pub trait Encodable {
    /// Append the wire form to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Exact length of the wire form, without serializing.
    fn encoded_len(&self) -> usize;

    /// Serialize into a fresh buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }
}

/// A value that can be read back from its wire layout.
pub trait Decodable: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self>;

    /// Decode a complete buffer, rejecting trailing bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}
