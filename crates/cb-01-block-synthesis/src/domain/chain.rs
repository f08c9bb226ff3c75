//! Chain model: heights keyed by block id, named slots, and a movable tip.
//!
//! Heights follow a block's *current* identity. When a slot's block is
//! mutated and re-hashed, its height record moves to the new id and the old
//! record is deleted. Slot labels stay stable across such changes.

use std::collections::HashMap;

use shared_types::{hash_to_hex, Block, Hash};

use super::entities::{ParentTip, SlotId};
use crate::error::{Result, SynthesisError};

#[derive(Debug, Clone)]
pub struct ChainModel {
    genesis: Hash,
    genesis_time: u32,
    heights: HashMap<Hash, u32>,
    slots: HashMap<SlotId, Block>,
    tip: Option<Block>,
}

impl ChainModel {
    /// Start a chain whose sentinel parent is `genesis` at height 0.
    pub fn new(genesis: Hash, genesis_time: u32) -> Self {
        let mut heights = HashMap::new();
        heights.insert(genesis, 0);
        Self {
            genesis,
            genesis_time,
            heights,
            slots: HashMap::new(),
            tip: None,
        }
    }

    pub fn genesis(&self) -> Hash {
        self.genesis
    }

    /// The block new blocks build on, or the genesis sentinel.
    pub fn tip(&self) -> Result<ParentTip> {
        match &self.tip {
            Some(block) => {
                let hash = block.hash();
                Ok(ParentTip {
                    hash,
                    height: self.height_of(&hash)?,
                    time: block.header.time(),
                })
            }
            None => Ok(ParentTip {
                hash: self.genesis,
                height: 0,
                time: self.genesis_time,
            }),
        }
    }

    /// The current tip block, if any block has been registered.
    pub fn tip_block(&self) -> Option<&Block> {
        self.tip.as_ref()
    }

    pub fn height_of(&self, hash: &Hash) -> Result<u32> {
        self.heights
            .get(hash)
            .copied()
            .ok_or_else(|| SynthesisError::UnknownBlock {
                hash: hash_to_hex(hash),
            })
    }

    /// Record `block` one above its parent and make it the tip.
    pub fn register_and_advance_tip(&mut self, block: Block) -> Result<u32> {
        let expected = self.tip()?.hash;
        let prev = block.header.prev_block();
        if prev != expected {
            return Err(SynthesisError::TipMismatch {
                expected: hash_to_hex(&expected),
                actual: hash_to_hex(&prev),
            });
        }
        let height = self.height_of(&prev)? + 1;
        self.heights.insert(block.hash(), height);
        tracing::debug!(
            "[cb-01] Registered block {} at height {}",
            hash_to_hex(&block.hash()),
            height
        );
        self.tip = Some(block);
        Ok(height)
    }

    pub fn slot(&self, slot: SlotId) -> Result<&Block> {
        self.slots
            .get(&slot)
            .ok_or(SynthesisError::UnknownSlot { slot })
    }

    pub fn is_slot_free(&self, slot: SlotId) -> bool {
        !self.slots.contains_key(&slot)
    }

    /// Fail if `slot` already denotes a block.
    pub fn ensure_slot_free(&self, slot: SlotId) -> Result<()> {
        match self.slots.get(&slot) {
            Some(block) => Err(SynthesisError::SlotOccupied {
                slot,
                hash: hash_to_hex(&block.hash()),
            }),
            None => Ok(()),
        }
    }

    /// Bind a fresh slot label to `block`.
    pub fn assign_slot(&mut self, slot: SlotId, block: Block) -> Result<()> {
        self.ensure_slot_free(slot)?;
        self.slots.insert(slot, block);
        Ok(())
    }

    /// Point the tip at the block `slot` currently denotes.
    ///
    /// Height records are left untouched.
    pub fn rewind_tip_to(&mut self, slot: SlotId) -> Result<()> {
        let block = self.slot(slot)?.clone();
        tracing::debug!(
            "[cb-01] Tip rewound to slot {} ({})",
            slot,
            hash_to_hex(&block.hash())
        );
        self.tip = Some(block);
        Ok(())
    }

    /// Replace the block `slot` denotes, migrating its height record when
    /// the id changed. Returns the (unchanged) height.
    pub fn reassign_slot(&mut self, slot: SlotId, block: Block) -> Result<u32> {
        let old_hash = self.slot(slot)?.hash();
        let new_hash = block.hash();
        let height = self.height_of(&old_hash)?;
        if new_hash != old_hash {
            self.heights.remove(&old_hash);
            self.heights.insert(new_hash, height);
            tracing::debug!(
                "[cb-01] Slot {} re-hashed: {} -> {}",
                slot,
                hash_to_hex(&old_hash),
                hash_to_hex(&new_hash)
            );
        }
        if self
            .tip
            .as_ref()
            .is_some_and(|tip| tip.hash() == old_hash)
        {
            self.tip = Some(block.clone());
        }
        self.slots.insert(slot, block);
        Ok(height)
    }
}
