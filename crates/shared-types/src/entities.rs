//! # Core Domain Entities
//!
//! Transactions, block headers and blocks in their legacy wire layout.
//!
//! ## Lazy identifiers
//!
//! `Transaction::txid` and `BlockHeader::hash` are computed on first use and
//! cached. Every mutation goes through a `&mut self` method that clears the
//! cache, so a cached identifier always matches the current fields. Decoded
//! values start with an empty cache and are hashed again on first read.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::encoding::{compact_size_len, write_compact_size, Decodable, Encodable, Reader};
use crate::errors::Result;
use crate::hashing::{hash_to_hex, merkle_root, sha256d};
use crate::script::Script;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte double SHA-256 digest in internal byte order.
pub type Hash = [u8; 32];

/// Output value in base units.
pub type Amount = i64;

/// Base units per coin.
pub const COIN: Amount = 100_000_000;

/// Serialized size of a block header.
pub const HEADER_SIZE: usize = 80;

/// Reference to one output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub const SIZE: usize = 36;

    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint spent by every coinbase input.
    pub fn null() -> Self {
        Self {
            txid: [0u8; 32],
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }
}

impl Encodable for OutPoint {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.txid);
        out.extend_from_slice(&self.index.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }
}

impl Decodable for OutPoint {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            txid: reader.read_hash()?,
            index: reader.read_u32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// Input with an empty script and zero sequence.
    pub fn spending(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Script::new(),
            sequence: 0,
        }
    }
}

impl Encodable for TxIn {
    fn encode(&self, out: &mut Vec<u8>) {
        self.prevout.encode(out);
        self.script_sig.encode(out);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        OutPoint::SIZE + self.script_sig.encoded_len() + 4
    }
}

impl Decodable for TxIn {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            prevout: OutPoint::decode(reader)?,
            script_sig: Script::decode(reader)?,
            sequence: reader.read_u32_le()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

impl Encodable for TxOut {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        self.script_pubkey.encode(out);
    }

    fn encoded_len(&self) -> usize {
        8 + self.script_pubkey.encoded_len()
    }
}

impl Decodable for TxOut {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            value: reader.read_i64_le()?,
            script_pubkey: Script::decode(reader)?,
        })
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A transaction with a lazily computed id.
#[derive(Clone, Default)]
pub struct Transaction {
    version: i32,
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    lock_time: u32,
    txid: OnceLock<Hash>,
}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
            txid: OnceLock::new(),
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// Mutable access to the inputs; clears the cached id.
    pub fn inputs_mut(&mut self) -> &mut Vec<TxIn> {
        self.txid.take();
        &mut self.inputs
    }

    /// Mutable access to the outputs; clears the cached id.
    pub fn outputs_mut(&mut self) -> &mut Vec<TxOut> {
        self.txid.take();
        &mut self.outputs
    }

    pub fn push_output(&mut self, output: TxOut) {
        self.outputs_mut().push(output);
    }

    /// Double SHA-256 of the serialization, computed once per mutation.
    pub fn txid(&self) -> Hash {
        *self.txid.get_or_init(|| sha256d(&self.to_bytes()))
    }

    /// Sum of all output values.
    pub fn output_value(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.lock_time == other.lock_time
            && self.inputs == other.inputs
            && self.outputs == other.outputs
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("txid", &hash_to_hex(&self.txid()))
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("size", &self.encoded_len())
            .finish()
    }
}

impl Encodable for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(out);
        }
        write_compact_size(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(out);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        4 + compact_size_len(self.inputs.len() as u64)
            + self.inputs.iter().map(Encodable::encoded_len).sum::<usize>()
            + compact_size_len(self.outputs.len() as u64)
            + self.outputs.iter().map(Encodable::encoded_len).sum::<usize>()
            + 4
    }
}

impl Decodable for Transaction {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_i32_le()?;
        let input_count = reader.read_length()?;
        let inputs = (0..input_count)
            .map(|_| TxIn::decode(reader))
            .collect::<Result<Vec<_>>>()?;
        let output_count = reader.read_length()?;
        let outputs = (0..output_count)
            .map(|_| TxOut::decode(reader))
            .collect::<Result<Vec<_>>>()?;
        let lock_time = reader.read_u32_le()?;
        Ok(Self::new(version, inputs, outputs, lock_time))
    }
}

// =============================================================================
// BLOCK HEADER
// =============================================================================

/// An 80-byte block header with a lazily computed id.
#[derive(Clone, Default)]
pub struct BlockHeader {
    version: i32,
    prev_block: Hash,
    merkle_root: Hash,
    time: u32,
    bits: u32,
    nonce: u32,
    hash: OnceLock<Hash>,
}

impl BlockHeader {
    pub fn new(version: i32, prev_block: Hash, merkle_root: Hash, time: u32, bits: u32, nonce: u32) -> Self {
        Self {
            version,
            prev_block,
            merkle_root,
            time,
            bits,
            nonce,
            hash: OnceLock::new(),
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn prev_block(&self) -> Hash {
        self.prev_block
    }

    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn set_prev_block(&mut self, prev_block: Hash) {
        self.prev_block = prev_block;
        self.hash.take();
    }

    pub fn set_merkle_root(&mut self, merkle_root: Hash) {
        self.merkle_root = merkle_root;
        self.hash.take();
    }

    pub fn set_time(&mut self, time: u32) {
        self.time = time;
        self.hash.take();
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.bits = bits;
        self.hash.take();
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.nonce = nonce;
        self.hash.take();
    }

    /// Block id: double SHA-256 of the 80 serialized bytes.
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| sha256d(&self.to_bytes()))
    }

    /// Whether the id is currently cached.
    pub fn is_hash_cached(&self) -> bool {
        self.hash.get().is_some()
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.prev_block == other.prev_block
            && self.merkle_root == other.merkle_root
            && self.time == other.time
            && self.bits == other.bits
            && self.nonce == other.nonce
    }
}

impl Eq for BlockHeader {}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHeader")
            .field("hash", &hash_to_hex(&self.hash()))
            .field("prev_block", &hash_to_hex(&self.prev_block))
            .field("merkle_root", &hash_to_hex(&self.merkle_root))
            .field("time", &self.time)
            .field("bits", &format_args!("{:#010x}", self.bits))
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl Encodable for BlockHeader {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_block);
        out.extend_from_slice(&self.merkle_root);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        HEADER_SIZE
    }
}

impl Decodable for BlockHeader {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self::new(
            reader.read_i32_le()?,
            reader.read_hash()?,
            reader.read_hash()?,
            reader.read_u32_le()?,
            reader.read_u32_le()?,
            reader.read_u32_le()?,
        ))
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// A header plus its transactions, coinbase first.
///
/// Transactions are shared so that spend references can point into a block
/// without copying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Arc<Transaction>>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn coinbase(&self) -> Option<&Arc<Transaction>> {
        self.transactions.first()
    }

    /// Merkle root over the current transaction list.
    pub fn compute_merkle_root(&self) -> Hash {
        let txids: Vec<Hash> = self.transactions.iter().map(|tx| tx.txid()).collect();
        merkle_root(&txids)
    }

    /// Store the merkle root of the current transaction list in the header.
    pub fn update_merkle_root(&mut self) {
        let root = self.compute_merkle_root();
        self.header.set_merkle_root(root);
    }

    pub fn has_valid_merkle_root(&self) -> bool {
        self.header.merkle_root() == self.compute_merkle_root()
    }
}

impl Encodable for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        write_compact_size(out, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(out);
        }
    }

    fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + compact_size_len(self.transactions.len() as u64)
            + self
                .transactions
                .iter()
                .map(|tx| tx.encoded_len())
                .sum::<usize>()
    }
}

impl Decodable for Block {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let header = BlockHeader::decode(reader)?;
        let count = reader.read_length()?;
        let transactions = (0..count)
            .map(|_| Transaction::decode(reader).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(header, transactions))
    }
}
