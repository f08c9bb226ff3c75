//! Padding transaction sizing.
//!
//! A padding transaction spends one spendable output and carries
//! [`SPENDABLE_OUTPUTS_PER_TX`] zero-value `OP_TRUE` outputs followed by one
//! padding output whose script length `S` is free. Its serialized length is
//!
//! ```text
//! PADDING_TX_OVERHEAD + compact_size_len(S) + S
//! ```
//!
//! so filling `R` remaining bytes means solving `S + compact_size_len(S) = T`
//! with `T = R - PADDING_TX_OVERHEAD`. `T` in `{254, 255, 65539, 65540}` has
//! no solution; those remainders are split across two transactions.

use shared_types::opcodes::OP_CHECKSIG;
use shared_types::{compact_size_len, Script, ScriptBuilder};

use crate::config::SynthesisConfig;
use crate::SPENDABLE_OUTPUTS_PER_TX;

/// Serialized length of a padding transaction minus its padding script and
/// that script's length prefix.
pub const PADDING_TX_OVERHEAD: usize = 4 // version
    + 1 // input count
    + 36 + 1 + 4 // outpoint, empty scriptSig, sequence
    + 1 // output count
    + SPENDABLE_OUTPUTS_PER_TX as usize * (8 + 1 + 1) // value, script length, OP_TRUE
    + 8 // padding output value
    + 4; // lock time

/// Allowance the clamp threshold is measured against: the overhead plus
/// ten bytes of script framing.
const NOMINAL_PADDING_TX_SIZE: usize = PADDING_TX_OVERHEAD + 10;

/// Serialized length of a padding transaction with a `script_len` script.
pub fn padding_tx_len(script_len: usize) -> usize {
    PADDING_TX_OVERHEAD + compact_size_len(script_len as u64) + script_len
}

/// Script length `S` with `S + compact_size_len(S) == budget`, if any.
pub fn script_len_for(budget: usize) -> Option<usize> {
    [1usize, 3, 5, 9].into_iter().find_map(|prefix| {
        let len = budget.checked_sub(prefix)?;
        (compact_size_len(len as u64) == prefix).then_some(len)
    })
}

/// Length a filler push of `data_len` bytes occupies, prefix included.
fn filler_push_len(data_len: usize) -> usize {
    let prefix = match data_len {
        0..=0x4b => 1,
        0x4c..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    };
    prefix + data_len
}

/// Pick the padding script length for the next transaction.
///
/// `remaining` is the byte distance to the target once the transaction count
/// includes this transaction; `tx_count` is that count. Returns `None` when
/// no padding transaction fits, i.e. `remaining` is below the smallest one.
pub fn plan_chunk(remaining: usize, tx_count: u64, config: &SynthesisConfig) -> Option<usize> {
    let budget = remaining.checked_sub(PADDING_TX_OVERHEAD)?;

    if remaining.saturating_sub(NOMINAL_PADDING_TX_SIZE) > config.padding_clamp_threshold {
        let chunk = filler_push_len(config.padding_clamp_chunk);
        let growth = compact_size_len(tx_count + 1) - compact_size_len(tx_count);
        // The next transaction must still have room for its own overhead.
        let next = remaining.checked_sub(padding_tx_len(chunk) + growth);
        if next.is_some_and(|next| next == 0 || next > PADDING_TX_OVERHEAD) {
            return Some(chunk);
        }
    }

    match script_len_for(budget) {
        Some(len) => Some(len),
        // Encoding gap: emit an empty padding output and let the next
        // transaction absorb the rest.
        None if budget > 0 => Some(0),
        None => None,
    }
}

/// Padding script of exactly `script_len` bytes ending in `sigops`
/// `OP_CHECKSIG`s.
pub fn padding_script(script_len: usize, sigops: usize) -> Script {
    debug_assert!(sigops <= script_len);
    ScriptBuilder::with_capacity(script_len)
        .push_filler(script_len - sigops)
        .push_opcodes(OP_CHECKSIG, sigops)
        .into_script()
}
