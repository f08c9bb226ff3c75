//! Domain layer - Pure logic for chain modelling and block synthesis
//!
//! Everything here is synchronous and deterministic given its inputs (the
//! engine's random source is seedable). No I/O.
//!
//! ## Entities
//!
//! - [`ChainModel`]: heights by block id, named slots, movable tip
//! - [`SpendableLedger`]: FIFO queue of [`PreviousSpendableOutput`]s
//!
//! ## Services
//!
//! - [`BlockSynthesizer`]: byte-exact block construction
//!
//! ## Invariants
//!
//! 1. Merkle root commits to the transaction list
//! 2. Nonzero target sizes are met exactly
//! 3. Coinbase gains exactly the spent value minus one unit

pub mod chain;
pub mod engine;
mod entities;
pub mod invariants;
pub mod ledger;
pub mod padding;
pub mod pow;
pub mod transactions;

pub use chain::ChainModel;
pub use engine::BlockSynthesizer;
pub use entities::*;
pub use ledger::SpendableLedger;
pub use transactions::{create_block, create_coinbase, create_tx, subsidy};
