//! Error types for the compact-relay crate.

use std::time::Duration;

use shared_types::DecodeError;
use thiserror::Error;

use crate::domain::PeerState;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Compact relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Header mismatch: expected block {expected}, compact block header is {actual}")]
    HeaderMismatch { expected: String, actual: String },

    #[error("Header {hash} does not meet target bits {bits:#010x}")]
    InsufficientWork { hash: String, bits: u32 },

    #[error("Timed out after {}s waiting for {waiting_for}", timeout.as_secs_f64())]
    ProtocolTimeout {
        waiting_for: String,
        timeout: Duration,
    },

    #[error("Unexpected peer state: expected {expected}, peer is {actual:?}")]
    UnexpectedState { expected: String, actual: PeerState },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Bad magic: expected {expected:02x?}, got {actual:02x?}")]
    BadMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("Bad checksum on {command} message")]
    BadChecksum { command: String },

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Peer disconnected")]
    Disconnected,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Compact block reconstruction failed: missing transactions at {indices:?}")]
    MissingTransactions { indices: Vec<usize> },

    #[error("Reconstructed block merkle root mismatch: header has {expected}, transactions give {actual}")]
    MerkleMismatch { expected: String, actual: String },
}

impl RelayError {
    /// Whether the connection is unusable after this error.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Disconnected | Self::BadMagic { .. } | Self::BadChecksum { .. }
        )
    }
}
