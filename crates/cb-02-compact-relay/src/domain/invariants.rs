//! Handshake invariants for the scripted peer.

use super::PeerState;
use crate::events::{RelayError, Result};

/// INVARIANT-1: Ordered Handshake
/// Each step advances the state by exactly one, except that a fresh
/// announcement may be awaited again once block data is cleared.
pub fn invariant_valid_transition(from: PeerState, to: PeerState) -> bool {
    use PeerState::*;
    matches!(
        (from, to),
        (Connecting, VerackReceived)
            | (VerackReceived, ModeAnnounced)
            | (ModeAnnounced, HeadersExchanged)
            | (HeadersExchanged, AwaitingCompactBlock)
            | (AwaitingCompactBlock, CompactBlockObserved)
            | (CompactBlockObserved, AwaitingCompactBlock)
    )
}

/// INVARIANT-2: Handshake Before Relay
/// Nothing but handshake traffic is sent before the node's `verack`.
pub fn invariant_handshake_complete(state: PeerState) -> bool {
    state >= PeerState::VerackReceived
}

/// Check a transition, naming the state the step expected on failure.
pub fn check_transition(from: PeerState, to: PeerState) -> Result<()> {
    if invariant_valid_transition(from, to) {
        return Ok(());
    }
    Err(RelayError::UnexpectedState {
        expected: format!("a state preceding {to:?}"),
        actual: from,
    })
}

pub fn check_handshake_complete(state: PeerState) -> Result<()> {
    if invariant_handshake_complete(state) {
        return Ok(());
    }
    Err(RelayError::UnexpectedState {
        expected: "handshake complete".into(),
        actual: state,
    })
}
