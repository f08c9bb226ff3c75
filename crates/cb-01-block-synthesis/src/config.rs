//! Configuration types for block synthesis

use serde::Deserialize;
use shared_types::REGTEST_BITS;

/// Runtime configuration for the synthesis engine
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Header version of built blocks
    pub block_version: i32,

    /// Compact difficulty target written into every header
    pub bits: u32,

    /// Padding transactions stop being sized exactly once the remaining
    /// script allowance exceeds this many bytes
    pub padding_clamp_threshold: usize,

    /// Filler carried by each clamped padding transaction
    pub padding_clamp_chunk: usize,

    /// Seed for the randomized seed-transaction output (entropy when unset)
    pub rng_seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            block_version: 1,
            bits: REGTEST_BITS,
            padding_clamp_threshold: 510_000,
            padding_clamp_chunk: 500_000,
            rng_seed: None,
        }
    }
}

impl SynthesisConfig {
    /// Config with a fixed RNG seed, for reproducible blocks
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Self::default()
        }
    }
}
