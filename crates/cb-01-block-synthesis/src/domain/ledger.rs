//! Spendable-output ledger.
//!
//! A FIFO queue: outputs leave in the order they were created, so a block
//! always spends the oldest (most buried) output first.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use shared_types::Transaction;

use super::entities::PreviousSpendableOutput;
use crate::error::{Result, SynthesisError};

#[derive(Debug, Default, Clone)]
pub struct SpendableLedger {
    queue: VecDeque<PreviousSpendableOutput>,
}

impl SpendableLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the back of the queue.
    pub fn push(&mut self, output: PreviousSpendableOutput) {
        self.queue.push_back(output);
    }

    /// Queue outputs `indices` of a finished transaction.
    pub fn push_outputs(&mut self, tx: &Arc<Transaction>, indices: Range<u32>) -> Result<()> {
        for index in indices {
            self.push(PreviousSpendableOutput::new(Arc::clone(tx), index)?);
        }
        Ok(())
    }

    /// Remove and return the oldest output.
    pub fn pop(&mut self) -> Result<PreviousSpendableOutput> {
        self.queue.pop_front().ok_or(SynthesisError::LedgerEmpty)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
