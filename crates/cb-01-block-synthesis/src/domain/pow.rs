//! Proof-of-work for test networks.
//!
//! Regtest difficulty accepts roughly every other hash, so a sequential
//! nonce search from the header's current nonce finishes almost at once.

use shared_types::{hash_to_hex, meets_target, BlockHeader};

use crate::error::{Result, SynthesisError};

/// Whether the header's id meets its own `bits` target.
pub fn check_proof_of_work(header: &BlockHeader) -> bool {
    meets_target(&header.hash(), header.bits())
}

/// Increment the nonce until the header meets its target.
///
/// Returns the winning nonce. Fails only if the whole nonce range above the
/// starting value is exhausted.
pub fn solve(header: &mut BlockHeader) -> Result<u32> {
    while !check_proof_of_work(header) {
        let next = header
            .nonce()
            .checked_add(1)
            .ok_or(SynthesisError::MiningFailed {
                bits: header.bits(),
            })?;
        header.set_nonce(next);
    }
    tracing::trace!(
        "[cb-01] Solved {} with nonce {}",
        hash_to_hex(&header.hash()),
        header.nonce()
    );
    Ok(header.nonce())
}
