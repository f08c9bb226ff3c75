//! # Big-Block Harness - Compact Relay (cb-02)
//!
//! BIP152 compact-block codec plus a scripted peer that speaks the node's
//! wire protocol.
//!
//! ## Architecture Role
//!
//! ```text
//! [Scenario driver] ──send block / cmpctblock──→ [RelayPeer] ──TCP──→ [Node under test]
//!        │                                           ↑
//!        └──── wait_until (bounded poll) ──── [PeerInbox] ←── receiver thread
//! ```
//!
//! - `domain`: announcement types, short ids, reconstruction, peer state
//! - `wire`: frame codec and message payloads
//! - `ports`: the node's RPC surface as a trait
//! - `service`: the connection actor

pub mod domain;
pub mod events;
pub mod ports;
pub mod service;
pub mod wire;

pub use domain::*;
pub use events::{RelayError, Result};
pub use ports::NodeRpc;
pub use service::RelayPeer;
