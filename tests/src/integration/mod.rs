//! # Integration Tests
//!
//! End-to-end flows against [`mock_node::MockNode`], an in-process node
//! speaking the real wire protocol over loopback TCP.
//!
//! - `compact_relay_flow` - relay peers and synthesized blocks, step by step
//! - `scenario_flow` - the full scripted scenario and its report

pub mod mock_node;

mod compact_relay_flow;
mod scenario_flow;
