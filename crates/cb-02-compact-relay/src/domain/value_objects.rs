//! Value objects for peer connection configuration and state.

use std::time::Duration;

use shared_types::{BlockHeader, Hash};

use super::HeaderAndShortIds;
use crate::wire::{GetHeaders, RejectMessage, SendCmpct};

/// Regression-test network magic.
pub const REGTEST_MAGIC: [u8; 4] = [0xfa, 0xbf, 0xb5, 0xda];

/// Protocol version advertised in our `version` message.
pub const PROTOCOL_VERSION: i32 = 70015;

/// Largest inbound payload the framing layer accepts.
///
/// The node's 32 MB message limit plus header slack. Outbound frames are
/// not limited.
pub const DEFAULT_MAX_PAYLOAD: usize = 0x0200_0000 + 1024;

/// Handshake progress of one scripted peer connection.
///
/// Variants are ordered: a later state implies every earlier step finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeerState {
    /// TCP connected, `version` sent, no `verack` yet
    #[default]
    Connecting,
    /// Node completed the version handshake
    VerackReceived,
    /// We told the node our compact relay preference
    ModeAnnounced,
    /// `getheaders`/`headers` echoed both ways
    HeadersExchanged,
    /// Block data cleared, waiting for a `cmpctblock` announcement
    AwaitingCompactBlock,
    /// Announcement received and its header checked
    CompactBlockObserved,
}

/// Peer connection configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Network magic prefixed to every frame
    pub magic: [u8; 4],
    pub protocol_version: i32,
    /// Service bits advertised in `version`
    pub services: u64,
    pub user_agent: String,
    pub start_height: i32,
    /// Bound on every `wait_until` poll
    pub wait_timeout: Duration,
    /// Sleep between polls
    pub poll_interval: Duration,
    /// Maximum inbound payload in bytes
    pub max_payload_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            magic: REGTEST_MAGIC,
            protocol_version: PROTOCOL_VERSION,
            services: 1,
            user_agent: "/cb-harness:0.1.0/".to_string(),
            start_height: 0,
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Last-seen message slots shared by the receiver thread and the driver.
///
/// Lives behind a single mutex per connection. The `on_*` callbacks are
/// invoked by the receiver; everything else by the driver.
#[derive(Debug, Default)]
pub struct PeerInbox {
    state: PeerState,
    verack_received: bool,
    last_sendcmpct: Option<SendCmpct>,
    last_getheaders: Option<GetHeaders>,
    last_headers: Option<Vec<BlockHeader>>,
    last_cmpctblock: Option<HeaderAndShortIds>,
    last_pong: Option<u64>,
    rejects: Vec<RejectMessage>,
    disconnected: bool,
}

impl PeerInbox {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Receiver callbacks
    // =========================================================================

    pub fn on_verack(&mut self) {
        self.verack_received = true;
    }

    pub fn on_sendcmpct(&mut self, message: SendCmpct) {
        self.last_sendcmpct = Some(message);
    }

    pub fn on_getheaders(&mut self, message: GetHeaders) {
        self.last_getheaders = Some(message);
    }

    /// Headers arrive with their ids unresolved; resolve them before storing.
    pub fn on_headers(&mut self, headers: Vec<BlockHeader>) {
        for header in &headers {
            header.hash();
        }
        self.last_headers = Some(headers);
    }

    pub fn on_cmpctblock(&mut self, announcement: HeaderAndShortIds) {
        announcement.header.hash();
        self.last_cmpctblock = Some(announcement);
    }

    pub fn on_pong(&mut self, nonce: u64) {
        self.last_pong = Some(nonce);
    }

    pub fn on_reject(&mut self, reject: RejectMessage) {
        self.rejects.push(reject);
    }

    pub fn on_disconnect(&mut self) {
        self.disconnected = true;
    }

    // =========================================================================
    // Driver accessors
    // =========================================================================

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PeerState) {
        self.state = state;
    }

    pub fn verack_received(&self) -> bool {
        self.verack_received
    }

    pub fn last_sendcmpct(&self) -> Option<&SendCmpct> {
        self.last_sendcmpct.as_ref()
    }

    pub fn last_getheaders(&self) -> Option<&GetHeaders> {
        self.last_getheaders.as_ref()
    }

    pub fn last_headers(&self) -> Option<&[BlockHeader]> {
        self.last_headers.as_deref()
    }

    pub fn last_cmpctblock(&self) -> Option<&HeaderAndShortIds> {
        self.last_cmpctblock.as_ref()
    }

    pub fn last_pong(&self) -> Option<u64> {
        self.last_pong
    }

    pub fn rejects(&self) -> &[RejectMessage] {
        &self.rejects
    }

    /// Most recent reject naming `hash`.
    pub fn reject_for(&self, hash: &Hash) -> Option<&RejectMessage> {
        self.rejects
            .iter()
            .rev()
            .find(|reject| reject.hash.as_ref() == Some(hash))
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Forget the last relay preference and announcement so the next
    /// `cmpctblock` can be told apart from earlier ones.
    pub fn clear_block_data(&mut self) {
        self.last_sendcmpct = None;
        self.last_cmpctblock = None;
    }
}
