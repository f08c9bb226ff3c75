//! # Relay Peer Service
//!
//! A scripted connection to the node under test.
//!
//! ## Architecture
//!
//! One background receiver thread per connection reads frames, answers
//! `version` and `ping` itself, and records everything else in the
//! connection's [`PeerInbox`]. The scenario driver never blocks on a
//! socket read: it polls the inbox with [`RelayPeer::wait_until`], which
//! gives up with [`RelayError::ProtocolTimeout`] after the configured wait.
//!
//! ## Thread Safety
//!
//! The inbox sits behind one `parking_lot::Mutex`; the receiver and the
//! driver both take it for every read and write. Outbound frames go through
//! a second mutex around the socket so receiver replies and driver sends
//! never interleave.

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shared_types::{hash_to_hex, Block, BlockHeader, Hash, Transaction};

use crate::domain::{
    check_handshake_complete, check_transition, validate_header, HeaderAndShortIds, PeerInbox,
    PeerState, RelayConfig,
};
use crate::events::{RelayError, Result};
use crate::wire::{
    read_frame, write_frame, GetHeaders, NetAddress, NetworkMessage, RejectMessage, SendCmpct,
    VersionMessage,
};

/// Build our `version` message for a connection to `remote`.
pub fn version_message(config: &RelayConfig, remote: &SocketAddr) -> VersionMessage {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    VersionMessage {
        version: config.protocol_version,
        services: config.services,
        timestamp: now.as_secs() as i64,
        receiver: NetAddress::new(remote, 0),
        sender: NetAddress::unspecified(),
        nonce: now.as_nanos() as u64,
        user_agent: config.user_agent.clone(),
        start_height: config.start_height,
        relay: true,
    }
}

/// Scripted peer connection.
///
/// Dropping the peer shuts the socket down and joins the receiver.
pub struct RelayPeer {
    name: String,
    config: RelayConfig,
    writer: Arc<Mutex<TcpStream>>,
    inbox: Arc<Mutex<PeerInbox>>,
    ping_counter: AtomicU64,
    receiver: Option<JoinHandle<()>>,
}

impl RelayPeer {
    /// Connect, send our `version` and start the receiver thread.
    ///
    /// Returns once the frame is written; use [`wait_for_verack`] to wait
    /// for the handshake to finish.
    ///
    /// [`wait_for_verack`]: RelayPeer::wait_for_verack
    pub fn connect<A: ToSocketAddrs>(addr: A, name: &str, config: RelayConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        let reader = stream.try_clone()?;

        let writer = Arc::new(Mutex::new(stream));
        let inbox = Arc::new(Mutex::new(PeerInbox::new()));

        write_frame(
            &mut *writer.lock(),
            config.magic,
            &NetworkMessage::Version(version_message(&config, &remote)),
        )?;

        let receiver = {
            let writer = Arc::clone(&writer);
            let inbox = Arc::clone(&inbox);
            let magic = config.magic;
            let max_payload = config.max_payload_size;
            let label = name.to_string();
            thread::Builder::new()
                .name(format!("cb-peer-{name}"))
                .spawn(move || receive_loop(reader, writer, inbox, magic, max_payload, &label))?
        };

        tracing::info!("[cb-02] Peer '{}' connected to {}", name, remote);

        Ok(Self {
            name: name.to_string(),
            config,
            writer,
            inbox,
            ping_counter: AtomicU64::new(0),
            receiver: Some(receiver),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn state(&self) -> PeerState {
        self.inbox.lock().state()
    }

    /// Run `f` against the inbox under its lock.
    pub fn with_inbox<T>(&self, f: impl FnOnce(&PeerInbox) -> T) -> T {
        f(&self.inbox.lock())
    }

    // =========================================================================
    // Bounded polling
    // =========================================================================

    /// Poll `probe` against the inbox until it yields a value.
    ///
    /// Fails with `ProtocolTimeout` once the configured wait elapses, or
    /// `Disconnected` if the receiver saw the connection close first.
    pub fn wait_until<T, F>(&self, waiting_for: &str, probe: F) -> Result<T>
    where
        F: FnMut(&mut PeerInbox) -> Option<T>,
    {
        self.wait_until_for(waiting_for, self.config.wait_timeout, probe)
    }

    pub fn wait_until_for<T, F>(&self, waiting_for: &str, timeout: Duration, mut probe: F) -> Result<T>
    where
        F: FnMut(&mut PeerInbox) -> Option<T>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut inbox = self.inbox.lock();
                if let Some(value) = probe(&mut inbox) {
                    return Ok(value);
                }
                if inbox.is_disconnected() {
                    return Err(RelayError::Disconnected);
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    "[cb-02] Peer '{}' timed out waiting for {}",
                    self.name,
                    waiting_for
                );
                return Err(RelayError::ProtocolTimeout {
                    waiting_for: waiting_for.to_string(),
                    timeout,
                });
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    pub fn send_message(&self, message: &NetworkMessage) -> Result<()> {
        tracing::debug!("[cb-02] Peer '{}' -> {}", self.name, message.command());
        write_frame(&mut *self.writer.lock(), self.config.magic, message)
    }

    /// Send a ping and wait for the matching pong.
    ///
    /// The node processes messages in order, so everything sent before the
    /// ping has been handled once this returns.
    pub fn sync_with_ping(&self) -> Result<()> {
        let nonce = self.ping_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.send_message(&NetworkMessage::Ping(nonce))?;
        self.wait_until(&format!("pong {nonce}"), |inbox| {
            (inbox.last_pong() == Some(nonce)).then_some(())
        })
    }

    pub fn send_and_ping(&self, message: &NetworkMessage) -> Result<()> {
        self.send_message(message)?;
        self.sync_with_ping()
    }

    pub fn send_block(&self, block: &Block) -> Result<()> {
        check_handshake_complete(self.state())?;
        tracing::info!(
            "[cb-02] Peer '{}' sending block {} ({} txs)",
            self.name,
            hash_to_hex(&block.hash()),
            block.transactions.len()
        );
        self.send_message(&NetworkMessage::Block(block.clone()))
    }

    pub fn send_tx(&self, tx: &Transaction) -> Result<()> {
        check_handshake_complete(self.state())?;
        self.send_message(&NetworkMessage::Tx(tx.clone()))
    }

    /// Send an unsolicited compact block and wait until the node handled it.
    pub fn send_compact_block(&self, compact: &HeaderAndShortIds) -> Result<()> {
        check_handshake_complete(self.state())?;
        tracing::info!(
            "[cb-02] Peer '{}' sending cmpctblock {} ({} short ids, {} prefilled)",
            self.name,
            hash_to_hex(&compact.header.hash()),
            compact.short_ids.len(),
            compact.prefilled.len()
        );
        self.send_and_ping(&NetworkMessage::CmpctBlock(compact.clone()))
    }

    // =========================================================================
    // Scripted handshake
    // =========================================================================

    #[tracing::instrument(skip(self), fields(peer = %self.name))]
    pub fn wait_for_verack(&self) -> Result<()> {
        self.wait_until("verack", |inbox| inbox.verack_received().then_some(()))?;
        self.advance(PeerState::VerackReceived)
    }

    /// Wait for the node's own compact relay preference.
    #[tracing::instrument(skip(self), fields(peer = %self.name))]
    pub fn wait_for_sendcmpct(&self) -> Result<SendCmpct> {
        self.wait_until("sendcmpct", |inbox| inbox.last_sendcmpct().copied())
    }

    /// Tell the node how we want new blocks announced.
    #[tracing::instrument(skip(self), fields(peer = %self.name))]
    pub fn announce_compact_mode(&self, announce: bool, version: u64) -> Result<()> {
        check_transition(self.state(), PeerState::ModeAnnounced)?;
        self.send_and_ping(&NetworkMessage::SendCmpct(SendCmpct { announce, version }))?;
        self.advance(PeerState::ModeAnnounced)
    }

    /// Echo the node's `getheaders` back, then echo its `headers` back, so
    /// both sides believe they share the same header chain.
    #[tracing::instrument(skip(self), fields(peer = %self.name))]
    pub fn exchange_headers(&self) -> Result<Vec<BlockHeader>> {
        check_transition(self.state(), PeerState::HeadersExchanged)?;

        let getheaders: GetHeaders =
            self.wait_until("getheaders", |inbox| inbox.last_getheaders().cloned())?;
        self.send_message(&NetworkMessage::GetHeaders(getheaders))?;

        let headers: Vec<BlockHeader> =
            self.wait_until("headers", |inbox| inbox.last_headers().map(<[_]>::to_vec))?;
        self.send_message(&NetworkMessage::Headers(headers.clone()))?;

        self.advance(PeerState::HeadersExchanged)?;
        Ok(headers)
    }

    /// Forget the last announcement and start waiting for a new one.
    pub fn clear_block_data(&self) -> Result<()> {
        let mut inbox = self.inbox.lock();
        check_transition(inbox.state(), PeerState::AwaitingCompactBlock)?;
        inbox.clear_block_data();
        inbox.set_state(PeerState::AwaitingCompactBlock);
        tracing::debug!("[cb-02] Peer '{}' cleared block data", self.name);
        Ok(())
    }

    /// Wait for a `cmpctblock` and check it announces `expected`.
    #[tracing::instrument(skip(self, expected), fields(peer = %self.name, expected = %hash_to_hex(expected)))]
    pub fn wait_for_compact_block(&self, expected: &Hash) -> Result<BlockHeader> {
        check_transition(self.state(), PeerState::CompactBlockObserved)?;
        let header = self.wait_until("cmpctblock", |inbox| {
            inbox.last_cmpctblock().map(|compact| compact.header.clone())
        })?;
        validate_header(&header, expected)?;
        self.advance(PeerState::CompactBlockObserved)?;
        tracing::info!(
            "[cb-02] Peer '{}' observed cmpctblock {}",
            self.name,
            hash_to_hex(&header.hash())
        );
        Ok(header)
    }

    /// Most recent reject naming `hash`, if any.
    pub fn reject_for(&self, hash: &Hash) -> Option<RejectMessage> {
        self.inbox.lock().reject_for(hash).cloned()
    }

    pub fn rejects(&self) -> Vec<RejectMessage> {
        self.inbox.lock().rejects().to_vec()
    }

    /// Close the connection and join the receiver thread.
    pub fn disconnect(&mut self) {
        if let Err(e) = self.writer.lock().shutdown(Shutdown::Both) {
            tracing::debug!("[cb-02] Peer '{}' shutdown: {}", self.name, e);
        }
        if let Some(handle) = self.receiver.take() {
            if handle.join().is_err() {
                tracing::error!("[cb-02] Peer '{}' receiver panicked", self.name);
            }
        }
    }

    fn advance(&self, to: PeerState) -> Result<()> {
        let mut inbox = self.inbox.lock();
        check_transition(inbox.state(), to)?;
        tracing::debug!("[cb-02] Peer '{}' {:?} -> {:?}", self.name, inbox.state(), to);
        inbox.set_state(to);
        Ok(())
    }
}

impl Drop for RelayPeer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for RelayPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayPeer")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Receiver thread
// =============================================================================

fn receive_loop(
    stream: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
    inbox: Arc<Mutex<PeerInbox>>,
    magic: [u8; 4],
    max_payload: usize,
    name: &str,
) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader, magic, max_payload) {
            Ok(message) => {
                if let Err(e) = dispatch(message, &writer, &inbox, magic, name) {
                    tracing::warn!("[cb-02] Peer '{}' reply failed: {}", name, e);
                    if e.is_connection_fatal() {
                        break;
                    }
                }
            }
            Err(e) if e.is_connection_fatal() => {
                tracing::debug!("[cb-02] Peer '{}' receiver stopping: {}", name, e);
                break;
            }
            Err(e) => {
                tracing::warn!("[cb-02] Peer '{}' dropped malformed message: {}", name, e);
                if matches!(e, RelayError::PayloadTooLarge { .. }) {
                    break;
                }
            }
        }
    }
    inbox.lock().on_disconnect();
}

fn dispatch(
    message: NetworkMessage,
    writer: &Mutex<TcpStream>,
    inbox: &Mutex<PeerInbox>,
    magic: [u8; 4],
    name: &str,
) -> Result<()> {
    tracing::debug!("[cb-02] Peer '{}' <- {}", name, message.command());
    match message {
        NetworkMessage::Version(version) => {
            tracing::debug!(
                "[cb-02] Peer '{}' node version {} {}",
                name,
                version.version,
                version.user_agent
            );
            write_frame(&mut *writer.lock(), magic, &NetworkMessage::Verack)?;
        }
        NetworkMessage::Verack => inbox.lock().on_verack(),
        NetworkMessage::Ping(nonce) => {
            write_frame(&mut *writer.lock(), magic, &NetworkMessage::Pong(nonce))?;
        }
        NetworkMessage::Pong(nonce) => inbox.lock().on_pong(nonce),
        NetworkMessage::SendCmpct(sendcmpct) => inbox.lock().on_sendcmpct(sendcmpct),
        NetworkMessage::GetHeaders(getheaders) => inbox.lock().on_getheaders(getheaders),
        NetworkMessage::Headers(headers) => inbox.lock().on_headers(headers),
        NetworkMessage::CmpctBlock(compact) => inbox.lock().on_cmpctblock(compact),
        NetworkMessage::Reject(reject) => {
            tracing::warn!(
                "[cb-02] Peer '{}' got reject for {}: {} (code {:#04x})",
                name,
                reject.message,
                reject.reason,
                reject.code
            );
            inbox.lock().on_reject(reject);
        }
        NetworkMessage::Block(_) | NetworkMessage::Tx(_) | NetworkMessage::Unknown { .. } => {}
    }
    Ok(())
}
