//! Error types for block synthesis

use thiserror::Error;

/// Result type alias for synthesis operations
pub type Result<T> = std::result::Result<T, SynthesisError>;

/// Errors that can occur while modelling the chain or building blocks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// Block identifier was never registered
    #[error("Unknown block: {hash}")]
    UnknownBlock { hash: String },

    /// Slot label was never assigned
    #[error("Unknown slot: {slot}")]
    UnknownSlot { slot: u32 },

    /// Slot already holds a block; use an explicit update instead
    #[error("Slot {slot} already holds block {hash}")]
    SlotOccupied { slot: u32, hash: String },

    /// Ledger underflow
    #[error("Spendable-output ledger is empty")]
    LedgerEmpty,

    /// Self-contradictory construction parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Target size cannot be reached by the construction
    #[error("Target size {target} unreachable: construction needs at least {minimum} bytes")]
    SizeOverflow { target: usize, minimum: usize },

    /// Finished block does not have the requested size (internal bug)
    #[error("Block size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Header merkle root disagrees with the transactions (internal bug)
    #[error("Merkle root mismatch: header has {expected}, transactions give {actual}")]
    MerkleMismatch { expected: String, actual: String },

    /// Coinbase value does not balance the spent output (internal bug)
    #[error("Coinbase value mismatch: expected {expected}, got {actual}")]
    ValueMismatch { expected: i64, actual: i64 },

    /// Previous-block reference is not the current tip
    #[error("Tip mismatch: block builds on {actual}, current tip is {expected}")]
    TipMismatch { expected: String, actual: String },

    /// Nonce space exhausted without meeting the target
    #[error("Mining failed: no nonce meets bits {bits:#010x}")]
    MiningFailed { bits: u32 },
}

impl SynthesisError {
    /// Errors that indicate a bug in the engine rather than a bad request
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. } | Self::MerkleMismatch { .. } | Self::ValueMismatch { .. }
        )
    }
}
