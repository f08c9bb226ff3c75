//! Adapters implementing the relay crate's outbound ports.

pub mod rpc;

pub use rpc::{JsonRpcNode, RpcError};
