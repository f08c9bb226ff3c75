//! Invariant checkers for synthesized blocks
//!
//! A violation here is an engine bug, never a test outcome.

use shared_types::{hash_to_hex, Amount, Block, Encodable};

use super::transactions::subsidy;
use crate::error::{Result, SynthesisError};

/// INVARIANT-1: Merkle Root
/// The header commits to exactly the block's transaction list.
pub fn check_merkle_root(block: &Block) -> Result<()> {
    let actual = block.compute_merkle_root();
    let expected = block.header.merkle_root();
    if actual != expected {
        return Err(SynthesisError::MerkleMismatch {
            expected: hash_to_hex(&expected),
            actual: hash_to_hex(&actual),
        });
    }
    Ok(())
}

/// INVARIANT-2: Exact Size
/// A nonzero target is met byte for byte.
pub fn check_block_size(block: &Block, target: usize) -> Result<()> {
    if target == 0 {
        return Ok(());
    }
    let actual = block.encoded_len();
    if actual != target {
        return Err(SynthesisError::SizeMismatch {
            expected: target,
            actual,
        });
    }
    Ok(())
}

/// INVARIANT-3: Value Conservation
/// The coinbase pays the subsidy plus the spent value minus a one-unit fee.
pub fn check_value_conservation(block: &Block, height: u32, spent_value: Amount) -> Result<()> {
    let expected = subsidy(height) + spent_value - 1;
    let actual = block
        .coinbase()
        .and_then(|coinbase| coinbase.outputs().first())
        .map(|output| output.value)
        .unwrap_or_default();
    if actual != expected {
        return Err(SynthesisError::ValueMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transactions::{create_block, create_coinbase};
    use shared_types::REGTEST_BITS;
    use std::sync::Arc;

    #[test]
    fn test_merkle_mismatch_detected() {
        let mut block = create_block(1, [0u8; 32], 1, REGTEST_BITS, vec![Arc::new(create_coinbase(1))]);
        assert!(check_merkle_root(&block).is_ok());
        block.header.set_merkle_root([9u8; 32]);
        assert!(matches!(
            check_merkle_root(&block),
            Err(SynthesisError::MerkleMismatch { .. })
        ));
    }

    #[test]
    fn test_block_size_zero_target_unchecked() {
        let block = create_block(1, [0u8; 32], 1, REGTEST_BITS, vec![Arc::new(create_coinbase(1))]);
        assert!(check_block_size(&block, 0).is_ok());
        assert!(check_block_size(&block, block.encoded_len()).is_ok());
        assert_eq!(
            check_block_size(&block, 1_000),
            Err(SynthesisError::SizeMismatch {
                expected: 1_000,
                actual: block.encoded_len()
            })
        );
    }

    #[test]
    fn test_value_conservation_for_plain_coinbase() {
        let block = create_block(1, [0u8; 32], 1, REGTEST_BITS, vec![Arc::new(create_coinbase(1))]);
        // No spend: subsidy + 1 - 1.
        assert!(check_value_conservation(&block, 1, 1).is_ok());
        assert!(check_value_conservation(&block, 1, 2).is_err());
    }
}
