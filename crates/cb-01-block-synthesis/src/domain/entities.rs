//! Domain entities for block synthesis

use std::sync::Arc;

use shared_types::{Amount, Hash, OutPoint, Transaction};

use crate::error::{Result, SynthesisError};

/// Scenario label for a block ("block 1", "block 5003").
pub type SlotId = u32;

/// An output the harness knows it can spend.
///
/// Holds a shared reference to the owning transaction, which stays owned by
/// the block that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousSpendableOutput {
    tx: Arc<Transaction>,
    index: u32,
}

impl PreviousSpendableOutput {
    /// Reference output `index` of `tx`.
    pub fn new(tx: Arc<Transaction>, index: u32) -> Result<Self> {
        if index as usize >= tx.outputs().len() {
            return Err(SynthesisError::InvalidRequest(format!(
                "output index {} out of range for transaction with {} outputs",
                index,
                tx.outputs().len()
            )));
        }
        Ok(Self { tx, index })
    }

    pub fn tx(&self) -> &Arc<Transaction> {
        &self.tx
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx.txid(), self.index)
    }

    pub fn value(&self) -> Amount {
        self.tx.outputs()[self.index as usize].value
    }
}

/// The block a new block is built on.
///
/// `time` is the parent's timestamp; the child uses `time + 1`. For the
/// genesis sentinel it is the wall-clock time the chain model was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentTip {
    pub hash: Hash,
    pub height: u32,
    pub time: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Script, TxOut};

    #[test]
    fn test_spendable_output_rejects_bad_index() {
        let tx = Arc::new(Transaction::new(
            1,
            vec![],
            vec![TxOut::new(5, Script::op_true())],
            0,
        ));
        assert!(PreviousSpendableOutput::new(tx.clone(), 0).is_ok());
        assert!(matches!(
            PreviousSpendableOutput::new(tx, 1),
            Err(SynthesisError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_spendable_output_value_and_outpoint() {
        let tx = Arc::new(Transaction::new(
            1,
            vec![],
            vec![
                TxOut::new(5, Script::op_true()),
                TxOut::new(7, Script::op_true()),
            ],
            0,
        ));
        let out = PreviousSpendableOutput::new(tx.clone(), 1).unwrap();
        assert_eq!(out.value(), 7);
        assert_eq!(out.outpoint(), OutPoint::new(tx.txid(), 1));
    }
}
