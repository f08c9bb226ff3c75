//! # Domain Layer for Compact Relay
//!
//! Pure logic with no I/O. The connection actor in `service` drives it.
//!
//! ## Contents
//!
//! - **entities**: BIP152 announcement types (`HeaderAndShortIds`, `PrefilledTransaction`)
//! - **value_objects**: Peer state, connection config and the shared inbox
//! - **services**: Short-id derivation, announcement construction, reconstruction
//! - **invariants**: Handshake ordering checks

mod entities;
mod invariants;
mod services;
mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
