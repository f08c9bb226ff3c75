//! Domain entities for compact block relay.

use std::sync::Arc;

use shared_types::{
    compact_size_len, write_compact_size, BlockHeader, DecodeError, Decodable, Encodable, Reader,
    Transaction,
};

/// Short transaction ID (6 bytes, little-endian low 48 bits of SipHash-2-4).
pub type ShortTxId = [u8; 6];

/// A transaction sent in full inside a compact block.
///
/// The coinbase is always prefilled at index 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefilledTransaction {
    /// Absolute position in the block's transaction list.
    pub index: usize,
    pub tx: Arc<Transaction>,
}

/// Compact block announcement (BIP152 `HeaderAndShortIDs`).
///
/// # Wire Format
///
/// ```text
/// [header: 80][nonce: u64 LE]
/// [count: CompactSize][short_ids: 6*N]
/// [count: CompactSize][(index delta: CompactSize, tx)...]
/// ```
///
/// Prefilled indices are differentially encoded: each stores the gap to the
/// previous index minus one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderAndShortIds {
    pub header: BlockHeader,
    /// Salt mixed into the short-id key.
    pub nonce: u64,
    /// Short ids of the non-prefilled transactions, in block order.
    pub short_ids: Vec<ShortTxId>,
    /// Prefilled transactions. Encoding writes them in ascending index
    /// order and keeps only the first entry for a repeated index.
    pub prefilled: Vec<PrefilledTransaction>,
}

impl HeaderAndShortIds {
    /// Number of transactions in the announced block.
    pub fn block_tx_count(&self) -> usize {
        self.short_ids.len() + self.prefilled.len()
    }

    /// Prefilled transactions as they go on the wire: sorted by index, one
    /// per index.
    fn prefilled_in_order(&self) -> Vec<&PrefilledTransaction> {
        let mut ordered: Vec<&PrefilledTransaction> = self.prefilled.iter().collect();
        if !ordered.windows(2).all(|w| w[0].index < w[1].index) {
            ordered.sort_by_key(|p| p.index);
            ordered.dedup_by_key(|p| p.index);
        }
        ordered
    }
}

impl Encodable for HeaderAndShortIds {
    fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_compact_size(out, self.short_ids.len() as u64);
        for id in &self.short_ids {
            out.extend_from_slice(id);
        }
        let prefilled = self.prefilled_in_order();
        write_compact_size(out, prefilled.len() as u64);
        let mut next = 0usize;
        for prefilled in prefilled {
            write_compact_size(out, (prefilled.index - next) as u64);
            prefilled.tx.encode(out);
            next = prefilled.index + 1;
        }
    }

    fn encoded_len(&self) -> usize {
        let ordered = self.prefilled_in_order();
        let mut next = 0usize;
        let prefilled: usize = ordered
            .iter()
            .map(|p| {
                let delta = compact_size_len((p.index - next) as u64);
                next = p.index + 1;
                delta + p.tx.encoded_len()
            })
            .sum();
        self.header.encoded_len()
            + 8
            + compact_size_len(self.short_ids.len() as u64)
            + 6 * self.short_ids.len()
            + compact_size_len(ordered.len() as u64)
            + prefilled
    }
}

impl Decodable for HeaderAndShortIds {
    fn decode(reader: &mut Reader<'_>) -> shared_types::errors::Result<Self> {
        let header = BlockHeader::decode(reader)?;
        let nonce = reader.read_u64_le()?;

        let id_count = reader.read_length()?;
        let mut short_ids = Vec::with_capacity(id_count.min(reader.remaining() / 6));
        for _ in 0..id_count {
            let mut id = [0u8; 6];
            id.copy_from_slice(reader.take(6)?);
            short_ids.push(id);
        }

        let prefilled_count = reader.read_length()?;
        let mut prefilled = Vec::new();
        let mut next = 0u64;
        for _ in 0..prefilled_count {
            let index = next
                .checked_add(reader.read_compact_size()?)
                .filter(|index| *index <= u64::from(u16::MAX))
                .ok_or(DecodeError::InvalidField {
                    field: "prefilled index",
                    reason: "index exceeds 65535".into(),
                })?;
            let tx = Arc::new(Transaction::decode(reader)?);
            prefilled.push(PrefilledTransaction {
                index: index as usize,
                tx,
            });
            next = index + 1;
        }

        Ok(Self {
            header,
            nonce,
            short_ids,
            prefilled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{OutPoint, Script, TxIn, TxOut, REGTEST_BITS};

    fn tx(tag: u32) -> Arc<Transaction> {
        Arc::new(Transaction::new(
            1,
            vec![TxIn::spending(OutPoint::new([tag as u8; 32], tag))],
            vec![TxOut::new(0, Script::op_true())],
            0,
        ))
    }

    fn sample() -> HeaderAndShortIds {
        HeaderAndShortIds {
            header: BlockHeader::new(1, [1u8; 32], [2u8; 32], 3, REGTEST_BITS, 4),
            nonce: 0x0102_0304_0506_0708,
            short_ids: vec![[1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1]],
            prefilled: vec![
                PrefilledTransaction { index: 0, tx: tx(0) },
                PrefilledTransaction { index: 3, tx: tx(3) },
            ],
        }
    }

    #[test]
    fn test_prefilled_indices_are_differential() {
        let bytes = sample().to_bytes();
        // header + nonce + count + 2 ids + count
        let first_delta = 80 + 8 + 1 + 12 + 1;
        assert_eq!(bytes[first_delta - 1], 2);
        assert_eq!(bytes[first_delta], 0);
        let second_delta = first_delta + 1 + tx(0).encoded_len();
        assert_eq!(bytes[second_delta], 2);
    }

    #[test]
    fn test_encoded_len_matches() {
        let compact = sample();
        assert_eq!(compact.encoded_len(), compact.to_bytes().len());
        assert_eq!(compact.block_tx_count(), 4);
    }

    #[test]
    fn test_decode_restores_absolute_indices() {
        let compact = sample();
        let decoded = HeaderAndShortIds::from_bytes(&compact.to_bytes()).unwrap();
        assert_eq!(decoded, compact);
        assert_eq!(decoded.prefilled[1].index, 3);
        assert!(!decoded.header.is_hash_cached());
    }

    #[test]
    fn test_unsorted_prefilled_encodes_in_index_order() {
        let mut compact = sample();
        compact.prefilled.reverse();
        compact.prefilled.push(PrefilledTransaction { index: 3, tx: tx(9) });
        let bytes = compact.to_bytes();
        assert_eq!(compact.encoded_len(), bytes.len());

        let decoded = HeaderAndShortIds::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_decode_rejects_index_overflow() {
        let mut bytes = Vec::new();
        sample().header.encode(&mut bytes);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        write_compact_size(&mut bytes, 0);
        write_compact_size(&mut bytes, 1);
        write_compact_size(&mut bytes, 70_000);
        tx(1).encode(&mut bytes);
        assert!(matches!(
            HeaderAndShortIds::from_bytes(&bytes),
            Err(DecodeError::InvalidField { .. })
        ));
    }
}
