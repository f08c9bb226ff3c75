//! # Big-Block Harness Runtime
//!
//! Wires the synthesis engine (cb-01) and the compact relay peers (cb-02) to
//! a live node and runs the big-block scenario against it.
//!
//! ## Modules
//!
//! - `config/` - TOML configuration with reference defaults
//! - `adapters/` - JSON-RPC client implementing [`NodeRpc`]
//! - `scenario/` - The scripted run
//! - `report/` - Per-step outcomes
//!
//! [`NodeRpc`]: cb_02_compact_relay::NodeRpc

pub mod adapters;
pub mod config;
pub mod error;
pub mod report;
pub mod scenario;

pub use adapters::{JsonRpcNode, RpcError};
pub use config::{ConfigError, HarnessConfig, NoncePolicy};
pub use error::{Result, ScenarioError};
pub use report::{Outcome, ScenarioReport, StepReport};
pub use scenario::BigBlockScenario;
