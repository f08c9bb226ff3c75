//! Hashing utilities shared by every crate.
//!
//! Identifiers are double SHA-256 digests kept in internal byte order.
//! The node's RPC interface prints them byte-reversed, which is what
//! [`hash_to_hex`] and [`hash_from_hex`] convert to and from.

use primitive_types::U256;
use sha2::{Digest, Sha256};

use crate::entities::Hash;
use crate::errors::DecodeError;

/// Compact target used by regression-test networks.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute double SHA-256 hash
#[inline]
pub fn sha256d(data: &[u8]) -> Hash {
    let first_hash = sha256(data);
    sha256(&first_hash)
}

/// Merkle root over transaction ids.
///
/// Odd levels duplicate their last element. An empty list yields the
/// all-zero hash.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    let mut buf = [0u8; 64];
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                sha256d(&buf)
            })
            .collect();
    }
    level[0]
}

/// Expand a compact difficulty encoding into a 256-bit target.
///
/// Negative or overflowing encodings expand to zero, which no hash meets.
pub fn compact_to_target(bits: u32) -> U256 {
    let size = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    if bits & 0x0080_0000 != 0 || mantissa == 0 {
        return U256::zero();
    }
    if size <= 3 {
        U256::from(mantissa >> (8 * (3 - size)))
    } else {
        let shift = 8 * (size - 3);
        if shift > 255 - 23 {
            return U256::zero();
        }
        U256::from(mantissa) << shift
    }
}

/// Check if a block id meets the target encoded by `bits`.
///
/// The id is interpreted as a little-endian 256-bit integer.
#[inline]
pub fn meets_target(hash: &Hash, bits: u32) -> bool {
    U256::from_little_endian(hash) <= compact_to_target(bits)
}

/// Render a hash in the byte-reversed hex form used by RPC.
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse the byte-reversed hex form used by RPC.
pub fn hash_from_hex(s: &str) -> Result<Hash, DecodeError> {
    let bytes = hex::decode(s.trim()).map_err(|e| DecodeError::InvalidField {
        field: "hash",
        reason: e.to_string(),
    })?;
    let mut hash: Hash = bytes
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::InvalidField {
            field: "hash",
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        })?;
    hash.reverse();
    Ok(hash)
}
