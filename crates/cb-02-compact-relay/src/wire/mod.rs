//! Wire protocol: frame codec and message payloads.

mod framing;
mod messages;

pub use framing::*;
pub use messages::*;
