//! # Error Types
//!
//! Decoding errors shared by every wire type in the workspace.

use thiserror::Error;

/// Result alias for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while reading wire-format bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before the value was complete.
    #[error("Unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    /// CompactSize used a wider prefix than the value requires.
    #[error("Non-canonical CompactSize: value {value} encoded with prefix {prefix:#04x}")]
    NonCanonicalCompactSize { prefix: u8, value: u64 },

    /// A length prefix exceeds the protocol maximum.
    #[error("Length prefix too large: {length} (max: {max})")]
    LengthTooLarge { length: u64, max: u64 },

    /// Bytes remained after a complete value was decoded.
    #[error("Trailing bytes after decoding: {count}")]
    TrailingBytes { count: usize },

    /// A field decoded but holds a value the protocol forbids.
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
