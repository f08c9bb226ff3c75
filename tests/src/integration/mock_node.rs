//! # Mock Node
//!
//! In-process stand-in for the node under test. Speaks the real wire
//! protocol on a loopback listener and serves the [`NodeRpc`] port from the
//! same shared state, so a scenario can run end to end without a daemon.
//!
//! ## Behaviour
//!
//! - Handshake: answers `version` with `version` + `verack`, then sends
//!   `sendcmpct` and `getheaders` (each can be switched off).
//! - `block`: accepted when it extends the tip, has a valid merkle root and
//!   proof of work and is no larger than the excessive block size; rejected
//!   with `bad-blk-length` / `bad-prevblk` / `bad-txnmrklroot` / `high-hash`
//!   otherwise. Accepted blocks are announced as `cmpctblock` to every other
//!   peer that asked for high-bandwidth relay.
//! - `cmpctblock`: reconstructed from the mempool, then treated as `block`.
//! - `tx` and `sendrawtransaction`: added to the mempool unchecked.

use std::collections::HashMap;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cb_02_compact_relay::service::version_message;
use cb_02_compact_relay::wire::{
    read_frame, write_frame, GetHeaders, NetworkMessage, RejectMessage, SendCmpct,
};
use cb_02_compact_relay::{
    HeaderAndShortIds, NodeRpc, RelayConfig, RelayError, DEFAULT_MAX_PAYLOAD, REGTEST_MAGIC,
};
use parking_lot::Mutex;
use shared_types::{hash_to_hex, meets_target, Block, BlockHeader, Encodable, Hash, Transaction};

/// Best block the mock reports before anything is submitted.
pub const MOCK_GENESIS: Hash = [0x0f; 32];

/// Reject code for invalid blocks.
pub const REJECT_INVALID: u8 = 0x10;

/// Knobs for misbehaving nodes.
#[derive(Clone, Debug)]
pub struct MockBehaviour {
    pub send_sendcmpct: bool,
    pub send_getheaders: bool,
    /// Block size limit that `setexcessiveblock` cannot raise
    pub size_cap: Option<u64>,
}

impl Default for MockBehaviour {
    fn default() -> Self {
        Self {
            send_sendcmpct: true,
            send_getheaders: true,
            size_cap: None,
        }
    }
}

struct MockPeer {
    id: usize,
    writer: Arc<Mutex<TcpStream>>,
    high_bandwidth: bool,
}

struct NodeState {
    behaviour: MockBehaviour,
    tip: Hash,
    headers: Vec<BlockHeader>,
    excessive_block_size: u64,
    mempool: HashMap<Hash, Arc<Transaction>>,
    accepted: Vec<Hash>,
    peers: Vec<MockPeer>,
}

impl NodeState {
    fn max_block_size(&self) -> u64 {
        match self.behaviour.size_cap {
            Some(cap) => cap.min(self.excessive_block_size),
            None => self.excessive_block_size,
        }
    }

    /// Why `block` is invalid, if it is.
    fn check_block(&self, block: &Block) -> Option<&'static str> {
        if block.header.prev_block() != self.tip {
            return Some("bad-prevblk");
        }
        if !block.has_valid_merkle_root() {
            return Some("bad-txnmrklroot");
        }
        if !meets_target(&block.hash(), block.header.bits()) {
            return Some("high-hash");
        }
        if block.encoded_len() as u64 > self.max_block_size() {
            return Some("bad-blk-length");
        }
        None
    }

    fn send_to(&self, peer_id: usize, message: &NetworkMessage) {
        if let Some(peer) = self.peers.iter().find(|p| p.id == peer_id) {
            let _ = write_frame(&mut *peer.writer.lock(), REGTEST_MAGIC, message);
        }
    }

    /// Accept or reject `block` received from `from`.
    fn process_block(&mut self, from: usize, block: Block) {
        let id = block.hash();
        if let Some(reason) = self.check_block(&block) {
            tracing::debug!("[mock-node] Rejecting {}: {}", hash_to_hex(&id), reason);
            self.send_to(
                from,
                &NetworkMessage::Reject(RejectMessage {
                    message: "block".into(),
                    code: REJECT_INVALID,
                    reason: reason.into(),
                    hash: Some(id),
                }),
            );
            return;
        }

        for tx in &block.transactions {
            self.mempool.remove(&tx.txid());
        }
        self.tip = id;
        self.headers.push(block.header.clone());
        self.accepted.push(id);

        let announcement = NetworkMessage::CmpctBlock(HeaderAndShortIds::from_block(&block, 0));
        for peer in self.peers.iter().filter(|p| p.high_bandwidth && p.id != from) {
            let _ = write_frame(&mut *peer.writer.lock(), REGTEST_MAGIC, &announcement);
        }
    }

    fn process_compact_block(&mut self, from: usize, compact: HeaderAndShortIds) {
        let pool = compact.index_pool(self.mempool.values());
        match compact.reconstruct(|id| pool.get(id).cloned()) {
            Ok(block) => self.process_block(from, block),
            Err(e) => {
                let reason = match e {
                    RelayError::MissingTransactions { .. } => "missing-transactions",
                    _ => "invalid-cmpctblock",
                };
                self.send_to(
                    from,
                    &NetworkMessage::Reject(RejectMessage {
                        message: "cmpctblock".into(),
                        code: REJECT_INVALID,
                        reason: reason.into(),
                        hash: Some(compact.header.hash()),
                    }),
                );
            }
        }
    }
}

/// Loopback node with its own acceptor thread.
pub struct MockNode {
    addr: SocketAddr,
    state: Arc<Mutex<NodeState>>,
    shutdown: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl MockNode {
    pub fn start() -> Self {
        Self::with_behaviour(MockBehaviour::default())
    }

    pub fn with_behaviour(behaviour: MockBehaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock node");
        let addr = listener.local_addr().expect("mock node address");
        let state = Arc::new(Mutex::new(NodeState {
            behaviour,
            tip: MOCK_GENESIS,
            headers: Vec::new(),
            excessive_block_size: 1_000_000,
            mempool: HashMap::new(),
            accepted: Vec::new(),
            peers: Vec::new(),
        }));
        let shutdown = Arc::new(AtomicBool::new(false));

        let acceptor = {
            let state = Arc::clone(&state);
            let shutdown = Arc::clone(&shutdown);
            let next_id = AtomicUsize::new(0);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let id = next_id.fetch_add(1, Ordering::SeqCst);
                    let state = Arc::clone(&state);
                    thread::spawn(move || serve_connection(id, stream, state));
                }
            })
        };

        Self {
            addr,
            state,
            shutdown,
            acceptor: Some(acceptor),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// RPC handle sharing this node's state.
    pub fn rpc(&self) -> MockRpc {
        MockRpc {
            state: Arc::clone(&self.state),
        }
    }

    pub fn tip(&self) -> Hash {
        self.state.lock().tip
    }

    /// Ids of accepted blocks, oldest first.
    pub fn accepted(&self) -> Vec<Hash> {
        self.state.lock().accepted.clone()
    }

    pub fn mempool_len(&self) -> usize {
        self.state.lock().mempool.len()
    }

    pub fn excessive_block_size(&self) -> u64 {
        self.state.lock().excessive_block_size
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for peer in &self.state.lock().peers {
            let _ = peer.writer.lock().shutdown(Shutdown::Both);
        }
        // Wake the acceptor so it sees the flag.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

fn serve_connection(id: usize, stream: TcpStream, state: Arc<Mutex<NodeState>>) {
    let Ok(remote) = stream.peer_addr() else { return };
    let Ok(read_half) = stream.try_clone() else { return };
    let writer = Arc::new(Mutex::new(stream));
    state.lock().peers.push(MockPeer {
        id,
        writer: Arc::clone(&writer),
        high_bandwidth: false,
    });

    let mut reader = BufReader::new(read_half);
    while let Ok(message) = read_frame(&mut reader, REGTEST_MAGIC, DEFAULT_MAX_PAYLOAD) {
        let mut state = state.lock();
        match message {
            NetworkMessage::Version(_) => {
                let config = RelayConfig::default();
                state.send_to(id, &NetworkMessage::Version(version_message(&config, &remote)));
                state.send_to(id, &NetworkMessage::Verack);
                if state.behaviour.send_sendcmpct {
                    state.send_to(
                        id,
                        &NetworkMessage::SendCmpct(SendCmpct {
                            announce: false,
                            version: 1,
                        }),
                    );
                }
                if state.behaviour.send_getheaders {
                    let getheaders = GetHeaders {
                        version: config.protocol_version as u32,
                        locator: vec![state.tip],
                        hash_stop: [0u8; 32],
                    };
                    state.send_to(id, &NetworkMessage::GetHeaders(getheaders));
                }
            }
            NetworkMessage::Ping(nonce) => state.send_to(id, &NetworkMessage::Pong(nonce)),
            NetworkMessage::SendCmpct(sendcmpct) => {
                if let Some(peer) = state.peers.iter_mut().find(|p| p.id == id) {
                    peer.high_bandwidth = sendcmpct.announce && sendcmpct.version == 1;
                }
            }
            NetworkMessage::GetHeaders(_) => {
                let headers = state.headers.last().cloned().into_iter().collect();
                state.send_to(id, &NetworkMessage::Headers(headers));
            }
            NetworkMessage::Block(block) => state.process_block(id, block),
            NetworkMessage::CmpctBlock(compact) => state.process_compact_block(id, compact),
            NetworkMessage::Tx(tx) => {
                state.mempool.insert(tx.txid(), Arc::new(tx));
            }
            _ => {}
        }
    }
    state.lock().peers.retain(|p| p.id != id);
}

/// [`NodeRpc`] view of a [`MockNode`].
#[derive(Clone)]
pub struct MockRpc {
    state: Arc<Mutex<NodeState>>,
}

impl NodeRpc for MockRpc {
    fn best_block_hash(&self) -> Result<Hash, RelayError> {
        Ok(self.state.lock().tip)
    }

    fn send_raw_transaction(&self, tx: &Transaction, _allow_high_fees: bool) -> Result<Hash, RelayError> {
        let txid = tx.txid();
        self.state.lock().mempool.insert(txid, Arc::new(tx.clone()));
        Ok(txid)
    }

    fn set_excessive_block(&self, max_block_size: u64) -> Result<(), RelayError> {
        self.state.lock().excessive_block_size = max_block_size;
        Ok(())
    }
}
