//! # Shared Types Crate
//!
//! Wire-level building blocks used by every crate in the harness:
//! hashes, transactions, scripts, block headers and blocks in their legacy
//! serialization, plus the CompactSize codec they are built on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every byte layout shared by the synthesis
//!   engine and the relay client is defined here.
//! - **Exact sizing**: every wire type reports `encoded_len()` without
//!   serializing, so callers can plan byte-exact layouts.
//! - **Lazy identifiers**: ids are cached and invalidated on mutation.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod hashing;
pub mod script;

pub use encoding::{
    compact_size_len, write_compact_size, write_var_bytes, Decodable, Encodable, Reader,
};
pub use entities::*;
pub use errors::DecodeError;
pub use hashing::*;
pub use script::{encode_script_num, opcodes, Script, ScriptBuilder};
