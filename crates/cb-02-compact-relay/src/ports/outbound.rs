//! Outbound ports (SPI) for the compact relay client.

use shared_types::{Hash, Transaction};

use crate::events::RelayError;

/// Control surface of the node under test.
///
/// Block submission goes over the wire protocol; everything else the
/// scenario needs from the node goes through this trait.
pub trait NodeRpc: Send + Sync {
    /// Id of the node's current best block.
    fn best_block_hash(&self) -> Result<Hash, RelayError>;

    /// Submit a transaction to the node's pool, returning its id.
    fn send_raw_transaction(
        &self,
        tx: &Transaction,
        allow_high_fees: bool,
    ) -> Result<Hash, RelayError>;

    /// Raise or lower the largest block the node accepts.
    fn set_excessive_block(&self, max_block_size: u64) -> Result<(), RelayError>;
}
