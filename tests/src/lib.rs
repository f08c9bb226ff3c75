//! # Big-Block Harness Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks for block synthesis
//! └── src/integration/  # Cross-crate flows against a mock node
//!     ├── mock_node.rs
//!     ├── compact_relay_flow.rs
//!     └── scenario_flow.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cb-tests
//! cargo test -p cb-tests integration::scenario_flow
//!
//! # Benchmarks
//! cargo bench -p cb-tests
//! ```

pub mod integration;
