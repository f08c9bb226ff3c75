//! Block synthesis engine.
//!
//! Builds a valid block of an exact serialized size on top of a parent tip:
//!
//! 1. a coinbase at `parent.height + 1`;
//! 2. with a spend source, a seed transaction spending it, which seeds a
//!    block-local ledger of zero-value outputs, optionally carries the
//!    caller's script, and gets a random data output so repeated builds
//!    produce different ids;
//! 3. padding transactions, each spending the oldest block-local output,
//!    until the target size is met exactly;
//! 4. merkle root and proof-of-work.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{
    compact_size_len, hash_to_hex, Block, Encodable, Script, Transaction, TxOut, HEADER_SIZE,
};

use super::entities::{ParentTip, PreviousSpendableOutput};
use super::invariants;
use super::ledger::SpendableLedger;
use super::padding::{padding_script, padding_tx_len, plan_chunk};
use super::pow;
use super::transactions::{create_block, create_coinbase, random_data_script, spendable_outputs_tx};
use crate::config::SynthesisConfig;
use crate::error::{Result, SynthesisError};
use crate::{MAX_TX_SIGOPS_COUNT, SPENDABLE_OUTPUTS_PER_TX};

/// Stateless apart from its configuration and random source.
#[derive(Debug)]
pub struct BlockSynthesizer {
    config: SynthesisConfig,
    rng: StdRng,
}

impl BlockSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Build a block on `parent`.
    ///
    /// Without a spend source the block holds only the coinbase and
    /// `target_size` must be zero. With one, a nonzero `target_size` is met
    /// exactly or the call fails with [`SynthesisError::SizeOverflow`].
    /// `extra_sigops` `OP_CHECKSIG`s are spread over the padding scripts,
    /// at most [`MAX_TX_SIGOPS_COUNT`] per transaction.
    #[tracing::instrument(
        skip(self, parent, spend, script),
        fields(height = parent.height + 1)
    )]
    pub fn build_block(
        &mut self,
        parent: &ParentTip,
        spend: Option<PreviousSpendableOutput>,
        script: Option<Script>,
        target_size: usize,
        extra_sigops: u64,
    ) -> Result<Block> {
        let height = parent.height + 1;
        let time = parent.time.wrapping_add(1);
        let mut coinbase = create_coinbase(height);

        let Some(spend) = spend else {
            if target_size != 0 {
                return Err(SynthesisError::InvalidRequest(format!(
                    "target size {target_size} requires a spend source"
                )));
            }
            let mut block = self.assemble(parent, time, vec![Arc::new(coinbase)]);
            invariants::check_value_conservation(&block, height, 1)?;
            self.finish(&mut block, target_size)?;
            return Ok(block);
        };

        let spent_value = spend.value();
        if spent_value < 1 {
            return Err(SynthesisError::InvalidRequest(format!(
                "spend source {}:{} holds {} units, at least 1 is needed for the fee",
                hash_to_hex(&spend.outpoint().txid),
                spend.index(),
                spent_value
            )));
        }
        // All but one unit moves to the coinbase; the seed tx pays the rest as fee.
        coinbase.outputs_mut()[0].value += spent_value - 1;

        let mut seed = spendable_outputs_tx(&spend);
        if let Some(script) = script {
            seed.push_output(TxOut::new(1, script));
        }
        seed.push_output(TxOut::new(0, random_data_script(self.rng.gen())));
        let seed = Arc::new(seed);

        let mut ledger = SpendableLedger::new();
        ledger.push_outputs(&seed, 0..SPENDABLE_OUTPUTS_PER_TX)?;

        let mut transactions = vec![Arc::new(coinbase), seed];
        if target_size > 0 {
            self.pad(&mut transactions, &mut ledger, target_size, extra_sigops)?;
        }

        let mut block = self.assemble(parent, time, transactions);
        invariants::check_value_conservation(&block, height, spent_value)?;
        self.finish(&mut block, target_size)?;
        Ok(block)
    }

    /// Append padding transactions until the block reaches `target_size`.
    fn pad(
        &self,
        transactions: &mut Vec<Arc<Transaction>>,
        ledger: &mut SpendableLedger,
        target_size: usize,
        mut extra_sigops: u64,
    ) -> Result<()> {
        let mut size = HEADER_SIZE
            + compact_size_len(transactions.len() as u64)
            + transactions.iter().map(|tx| tx.encoded_len()).sum::<usize>();
        if size > target_size {
            return Err(SynthesisError::SizeOverflow {
                target: target_size,
                minimum: size,
            });
        }

        while size < target_size {
            // The transaction count prefix may widen with this transaction.
            let count = transactions.len() as u64;
            size = size - compact_size_len(count) + compact_size_len(count + 1);

            let script_len = target_size
                .checked_sub(size)
                .and_then(|remaining| plan_chunk(remaining, count + 1, &self.config))
                .ok_or(SynthesisError::SizeOverflow {
                    target: target_size,
                    minimum: size + padding_tx_len(0),
                })?;

            let sigops = extra_sigops
                .min(script_len as u64)
                .min(MAX_TX_SIGOPS_COUNT);
            extra_sigops -= sigops;

            let spend = ledger.pop()?;
            let mut tx = spendable_outputs_tx(&spend);
            tx.push_output(TxOut::new(0, padding_script(script_len, sigops as usize)));
            let tx = Arc::new(tx);

            size += tx.encoded_len();
            ledger.push_outputs(&tx, 0..SPENDABLE_OUTPUTS_PER_TX)?;
            transactions.push(tx);
        }

        tracing::debug!(
            "[cb-01] Padded to {} bytes with {} transactions",
            size,
            transactions.len()
        );
        Ok(())
    }

    fn assemble(&self, parent: &ParentTip, time: u32, transactions: Vec<Arc<Transaction>>) -> Block {
        create_block(
            self.config.block_version,
            parent.hash,
            time,
            self.config.bits,
            transactions,
        )
    }

    /// Check the merkle root, solve, then check the size.
    fn finish(&self, block: &mut Block, target_size: usize) -> Result<()> {
        invariants::check_merkle_root(block)?;
        pow::solve(&mut block.header)?;
        invariants::check_block_size(block, target_size)?;
        tracing::info!(
            "[cb-01] Built block {} ({} bytes, {} txs)",
            hash_to_hex(&block.hash()),
            block.encoded_len(),
            block.transactions.len()
        );
        Ok(())
    }

    /// Re-solve a mutated header after its transactions changed.
    pub fn resolve(&self, block: &mut Block) -> Result<()> {
        block.update_merkle_root();
        invariants::check_merkle_root(block)?;
        pow::solve(&mut block.header)?;
        Ok(())
    }
}
