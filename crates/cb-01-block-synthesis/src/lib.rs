//! # Big-Block Harness - Block Synthesis (cb-01)
//!
//! Builds valid blocks of a precisely controlled serialized size and keeps
//! the bookkeeping a scripted scenario needs around them.
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Context                                            │
//! │  - ChainContext: slots, tip, scenario ledger        │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Pure Logic)                                │
//! │  - ChainModel, SpendableLedger                      │
//! │  - BlockSynthesizer, padding sizing, PoW            │
//! │  - Invariants: merkle root, exact size, value       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let mut ctx = ChainContext::new(genesis_hash, SynthesisConfig::default());
//! ctx.next_block(0, None, None, 0, 0)?;
//! ctx.save_spendable_output()?;
//! ```

pub mod context;
pub mod domain;

mod config;
mod error;

pub use config::SynthesisConfig;
pub use context::ChainContext;
pub use domain::{
    BlockSynthesizer, ChainModel, ParentTip, PreviousSpendableOutput, SlotId, SpendableLedger,
};
pub use error::{Result, SynthesisError};

/// One megabyte as the node counts it.
pub const ONE_MEGABYTE: usize = 1_000_000;

/// Block size limit before the excessive-block setting existed.
pub const LEGACY_MAX_BLOCK_SIZE: usize = ONE_MEGABYTE;

/// Signature operations allowed per megabyte of block.
pub const MAX_BLOCK_SIGOPS_PER_MB: u64 = 20_000;

/// Signature operations allowed in a single transaction.
pub const MAX_TX_SIGOPS_COUNT: u64 = 20_000;

/// Zero-value outputs each seed and padding transaction creates.
pub const SPENDABLE_OUTPUTS_PER_TX: u32 = 8;

/// Coinbase transactions are padded to at least this many bytes.
pub const COINBASE_MIN_SIZE: usize = 100;

/// Blocks between subsidy halvings on test networks.
pub const SUBSIDY_HALVING_INTERVAL: u32 = 150;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(ONE_MEGABYTE, 1_000_000);
        assert_eq!(LEGACY_MAX_BLOCK_SIZE, ONE_MEGABYTE);
        assert_eq!(MAX_BLOCK_SIGOPS_PER_MB, MAX_TX_SIGOPS_COUNT);
    }
}
