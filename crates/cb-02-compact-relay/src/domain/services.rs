//! Domain services for compact block relay.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use shared_types::{hash_to_hex, meets_target, sha256, Block, Encodable, Hash, Transaction};
use siphasher::sip::SipHasher24;

use super::{HeaderAndShortIds, PrefilledTransaction, ShortTxId};
use crate::events::{RelayError, Result};

/// SipHash keys for one compact block.
///
/// Derived as `SHA256(header || nonce_le)`; `k0`/`k1` are the first and second
/// little-endian u64 of the digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortIdKeys {
    pub k0: u64,
    pub k1: u64,
}

impl ShortIdKeys {
    pub fn new(header: &shared_types::BlockHeader, nonce: u64) -> Self {
        let mut preimage = header.to_bytes();
        preimage.extend_from_slice(&nonce.to_le_bytes());
        let digest = sha256(&preimage);
        let mut k0 = [0u8; 8];
        let mut k1 = [0u8; 8];
        k0.copy_from_slice(&digest[0..8]);
        k1.copy_from_slice(&digest[8..16]);
        Self {
            k0: u64::from_le_bytes(k0),
            k1: u64::from_le_bytes(k1),
        }
    }

    /// Short id of `txid` under these keys.
    pub fn short_id(&self, txid: &Hash) -> ShortTxId {
        calculate_short_id(txid, self)
    }
}

/// Calculate short transaction ID using SipHash.
///
/// Formula: short_id = SipHash-2-4(k0, k1, txid) & 0xffff_ffff_ffff, as six
/// little-endian bytes.
///
/// Reference: BIP152 (Bitcoin Improvement Proposal 152)
pub fn calculate_short_id(txid: &Hash, keys: &ShortIdKeys) -> ShortTxId {
    let mut hasher = SipHasher24::new_with_keys(keys.k0, keys.k1);
    hasher.write(txid);
    let full_hash = hasher.finish();

    let mut short_id = [0u8; 6];
    short_id.copy_from_slice(&full_hash.to_le_bytes()[..6]);
    short_id
}

impl HeaderAndShortIds {
    /// Announcement for `block` with only the coinbase prefilled.
    pub fn from_block(block: &Block, nonce: u64) -> Self {
        Self::from_block_with_prefill(block, nonce, &[0])
    }

    /// Announcement for `block` prefilling the transactions at `prefill`.
    ///
    /// Indices outside the block are ignored; the rest are sorted and
    /// deduplicated.
    pub fn from_block_with_prefill(block: &Block, nonce: u64, prefill: &[usize]) -> Self {
        let mut indices: Vec<usize> = prefill
            .iter()
            .copied()
            .filter(|i| *i < block.transactions.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let keys = ShortIdKeys::new(&block.header, nonce);
        let mut prefilled = Vec::with_capacity(indices.len());
        let mut short_ids = Vec::with_capacity(block.transactions.len() - indices.len());
        for (i, tx) in block.transactions.iter().enumerate() {
            if indices.binary_search(&i).is_ok() {
                prefilled.push(PrefilledTransaction {
                    index: i,
                    tx: Arc::clone(tx),
                });
            } else {
                short_ids.push(keys.short_id(&tx.txid()));
            }
        }

        Self {
            header: block.header.clone(),
            nonce,
            short_ids,
            prefilled,
        }
    }

    pub fn keys(&self) -> ShortIdKeys {
        ShortIdKeys::new(&self.header, self.nonce)
    }

    /// Index a transaction pool by this announcement's short ids.
    pub fn index_pool<'a, I>(&self, pool: I) -> HashMap<ShortTxId, Arc<Transaction>>
    where
        I: IntoIterator<Item = &'a Arc<Transaction>>,
    {
        let keys = self.keys();
        pool.into_iter()
            .map(|tx| (keys.short_id(&tx.txid()), Arc::clone(tx)))
            .collect()
    }

    /// Rebuild the full block from prefilled transactions plus `lookup`.
    ///
    /// Fails with the absolute indices of every transaction `lookup` could
    /// not supply, or when the rebuilt list does not match the merkle root.
    pub fn reconstruct<F>(&self, mut lookup: F) -> Result<Block>
    where
        F: FnMut(&ShortTxId) -> Option<Arc<Transaction>>,
    {
        let total = self.block_tx_count();
        let mut slots: Vec<Option<Arc<Transaction>>> = vec![None; total];
        for prefilled in &self.prefilled {
            let slot = slots.get_mut(prefilled.index).ok_or_else(|| {
                RelayError::Decode(shared_types::DecodeError::InvalidField {
                    field: "prefilled index",
                    reason: format!("{} outside block of {} transactions", prefilled.index, total),
                })
            })?;
            *slot = Some(Arc::clone(&prefilled.tx));
        }

        let mut missing = Vec::new();
        let mut ids = self.short_ids.iter();
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_some() {
                continue;
            }
            match ids.next().and_then(&mut lookup) {
                Some(tx) => *slot = Some(tx),
                None => missing.push(index),
            }
        }
        if !missing.is_empty() {
            return Err(RelayError::MissingTransactions { indices: missing });
        }

        let block = Block::new(self.header.clone(), slots.into_iter().flatten().collect());
        if !block.has_valid_merkle_root() {
            return Err(RelayError::MerkleMismatch {
                expected: hash_to_hex(&block.header.merkle_root()),
                actual: hash_to_hex(&block.compute_merkle_root()),
            });
        }
        Ok(block)
    }

    /// Recompute the header id and compare it with `expected`.
    pub fn validate_header(&self, expected: &Hash) -> Result<()> {
        validate_header(&self.header, expected)
    }
}

/// Check a received header's work and id against the block we expect.
pub fn validate_header(header: &shared_types::BlockHeader, expected: &Hash) -> Result<()> {
    let actual = header.hash();
    if !meets_target(&actual, header.bits()) {
        return Err(RelayError::InsufficientWork {
            hash: hash_to_hex(&actual),
            bits: header.bits(),
        });
    }
    if actual != *expected {
        return Err(RelayError::HeaderMismatch {
            expected: hash_to_hex(expected),
            actual: hash_to_hex(&actual),
        });
    }
    Ok(())
}
