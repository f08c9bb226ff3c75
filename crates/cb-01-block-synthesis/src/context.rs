//! Scenario context.
//!
//! Bundles the chain model, the scenario's spendable-output ledger and the
//! synthesis engine. Every operation a scenario performs on "current chain
//! state" goes through this object.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use shared_types::{Amount, Block, Hash, Script, Transaction};

use crate::config::SynthesisConfig;
use crate::domain::{
    create_tx, BlockSynthesizer, ChainModel, PreviousSpendableOutput, SlotId, SpendableLedger,
};
use crate::error::{Result, SynthesisError};

#[derive(Debug)]
pub struct ChainContext {
    chain: ChainModel,
    ledger: SpendableLedger,
    engine: BlockSynthesizer,
}

impl ChainContext {
    /// Context on top of the node's current best block, stamped with the
    /// current wall-clock time.
    pub fn new(genesis: Hash, config: SynthesisConfig) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        Self::with_genesis_time(genesis, now, config)
    }

    pub fn with_genesis_time(genesis: Hash, genesis_time: u32, config: SynthesisConfig) -> Self {
        Self {
            chain: ChainModel::new(genesis, genesis_time),
            ledger: SpendableLedger::new(),
            engine: BlockSynthesizer::new(config),
        }
    }

    pub fn chain(&self) -> &ChainModel {
        &self.chain
    }

    pub fn ledger(&self) -> &SpendableLedger {
        &self.ledger
    }

    pub fn block(&self, slot: SlotId) -> Result<&Block> {
        self.chain.slot(slot)
    }

    /// The current tip block; fails while the tip is still the sentinel.
    pub fn tip_block(&self) -> Result<&Block> {
        self.chain.tip_block().ok_or_else(|| SynthesisError::UnknownBlock {
            hash: shared_types::hash_to_hex(&self.chain.genesis()),
        })
    }

    /// Build a block on the tip, register it under `slot` and make it the tip.
    pub fn next_block(
        &mut self,
        slot: SlotId,
        spend: Option<PreviousSpendableOutput>,
        script: Option<Script>,
        block_size: usize,
        extra_sigops: u64,
    ) -> Result<Block> {
        self.chain.ensure_slot_free(slot)?;
        let parent = self.chain.tip()?;
        let block = self
            .engine
            .build_block(&parent, spend, script, block_size, extra_sigops)?;
        let height = self.chain.register_and_advance_tip(block.clone())?;
        self.chain.assign_slot(slot, block.clone())?;
        tracing::debug!("[cb-01] Slot {} -> height {}", slot, height);
        Ok(block)
    }

    /// Move the tip back to the block `slot` denotes.
    pub fn tip(&mut self, slot: SlotId) -> Result<()> {
        self.chain.rewind_tip_to(slot)
    }

    /// Append transactions to the block at `slot`, re-solve it and make it
    /// the tip. Its height record follows the new id.
    pub fn update_block(&mut self, slot: SlotId, new_transactions: Vec<Transaction>) -> Result<Block> {
        let mut block = self.chain.slot(slot)?.clone();
        block
            .transactions
            .extend(new_transactions.into_iter().map(Arc::new));
        self.engine.resolve(&mut block)?;
        self.chain.reassign_slot(slot, block.clone())?;
        self.chain.rewind_tip_to(slot)?;
        Ok(block)
    }

    /// Queue the tip's coinbase output for a later block to spend.
    pub fn save_spendable_output(&mut self) -> Result<()> {
        let coinbase = self
            .tip_block()?
            .coinbase()
            .cloned()
            .ok_or_else(|| SynthesisError::InvalidRequest("tip block has no coinbase".into()))?;
        self.ledger.push(PreviousSpendableOutput::new(coinbase, 0)?);
        Ok(())
    }

    /// Take the oldest saved output.
    pub fn get_spendable_output(&mut self) -> Result<PreviousSpendableOutput> {
        self.ledger.pop()
    }

    /// Single-output transaction spending output `n` of `spend_tx`.
    pub fn create_tx(&self, spend_tx: &Transaction, n: u32, value: Amount, script: Script) -> Result<Transaction> {
        if n as usize >= spend_tx.outputs().len() {
            return Err(SynthesisError::InvalidRequest(format!(
                "cannot spend output {} of a transaction with {} outputs",
                n,
                spend_tx.outputs().len()
            )));
        }
        Ok(create_tx(spend_tx, n, value, script))
    }
}
