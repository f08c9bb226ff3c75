//! Peer protocol messages and their payload encodings.

use std::net::{Ipv6Addr, SocketAddr};

use shared_types::errors::Result as DecodeResult;
use shared_types::{
    compact_size_len, write_compact_size, write_var_bytes, Block, BlockHeader, DecodeError, Decodable, Encodable,
    Hash, Reader, Transaction,
};

use crate::domain::HeaderAndShortIds;

/// Network address as carried inside `version` (no timestamp).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetAddress {
    pub services: u64,
    /// IPv6 or IPv4-mapped address
    pub ip: [u8; 16],
    pub port: u16,
}

impl NetAddress {
    pub fn new(addr: &SocketAddr, services: u64) -> Self {
        let ip = match addr {
            SocketAddr::V4(v4) => v4.ip().to_ipv6_mapped(),
            SocketAddr::V6(v6) => *v6.ip(),
        };
        Self {
            services,
            ip: ip.octets(),
            port: addr.port(),
        }
    }

    pub fn unspecified() -> Self {
        Self {
            services: 0,
            ip: Ipv6Addr::UNSPECIFIED.octets(),
            port: 0,
        }
    }
}

impl Encodable for NetAddress {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.ip);
        out.extend_from_slice(&self.port.to_be_bytes());
    }

    fn encoded_len(&self) -> usize {
        8 + 16 + 2
    }
}

impl Decodable for NetAddress {
    fn decode(reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let services = reader.read_u64_le()?;
        let mut ip = [0u8; 16];
        ip.copy_from_slice(reader.take(16)?);
        let port = reader.read_u16_be()?;
        Ok(Self { services, ip, port })
    }
}

/// `version` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub receiver: NetAddress,
    pub sender: NetAddress,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

impl Encodable for VersionMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        self.receiver.encode(out);
        self.sender.encode(out);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_var_bytes(out, self.user_agent.as_bytes());
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out.push(u8::from(self.relay));
    }

    fn encoded_len(&self) -> usize {
        4 + 8 + 8
            + self.receiver.encoded_len()
            + self.sender.encoded_len()
            + 8
            + compact_size_len(self.user_agent.len() as u64)
            + self.user_agent.len()
            + 4
            + 1
    }
}

impl Decodable for VersionMessage {
    fn decode(reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let version = reader.read_i32_le()?;
        let services = reader.read_u64_le()?;
        let timestamp = reader.read_i64_le()?;
        let receiver = NetAddress::decode(reader)?;
        let sender = NetAddress::decode(reader)?;
        let nonce = reader.read_u64_le()?;
        let user_agent = String::from_utf8_lossy(&reader.read_var_bytes()?).into_owned();
        let start_height = reader.read_i32_le()?;
        // Pre-BIP37 peers omit the relay flag.
        let relay = if reader.remaining() > 0 {
            reader.read_u8()? != 0
        } else {
            true
        };
        Ok(Self {
            version,
            services,
            timestamp,
            receiver,
            sender,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

/// `sendcmpct` payload: relay preference for compact blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendCmpct {
    /// Announce new blocks with `cmpctblock` instead of `inv`/`headers`
    pub announce: bool,
    pub version: u64,
}

impl Encodable for SendCmpct {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.announce));
        out.extend_from_slice(&self.version.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        1 + 8
    }
}

impl Decodable for SendCmpct {
    fn decode(reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let announce = reader.read_u8()? != 0;
        let version = reader.read_u64_le()?;
        Ok(Self { announce, version })
    }
}

/// `getheaders` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetHeaders {
    pub version: u32,
    pub locator: Vec<Hash>,
    pub hash_stop: Hash,
}

impl Encodable for GetHeaders {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(out, self.locator.len() as u64);
        for hash in &self.locator {
            out.extend_from_slice(hash);
        }
        out.extend_from_slice(&self.hash_stop);
    }

    fn encoded_len(&self) -> usize {
        4 + compact_size_len(self.locator.len() as u64) + 32 * self.locator.len() + 32
    }
}

impl Decodable for GetHeaders {
    fn decode(reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let version = reader.read_u32_le()?;
        let count = reader.read_length()?;
        let mut locator = Vec::with_capacity(count.min(reader.remaining() / 32));
        for _ in 0..count {
            locator.push(reader.read_hash()?);
        }
        let hash_stop = reader.read_hash()?;
        Ok(Self {
            version,
            locator,
            hash_stop,
        })
    }
}

/// `reject` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectMessage {
    /// Command of the rejected message
    pub message: String,
    pub code: u8,
    pub reason: String,
    /// Present for `block` and `tx` rejects
    pub hash: Option<Hash>,
}

impl Encodable for RejectMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        write_var_bytes(out, self.message.as_bytes());
        out.push(self.code);
        write_var_bytes(out, self.reason.as_bytes());
        if let Some(hash) = &self.hash {
            out.extend_from_slice(hash);
        }
    }

    fn encoded_len(&self) -> usize {
        compact_size_len(self.message.len() as u64)
            + self.message.len()
            + 1
            + compact_size_len(self.reason.len() as u64)
            + self.reason.len()
            + if self.hash.is_some() { 32 } else { 0 }
    }
}

impl Decodable for RejectMessage {
    fn decode(reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let message = String::from_utf8_lossy(&reader.read_var_bytes()?).into_owned();
        let code = reader.read_u8()?;
        let reason = String::from_utf8_lossy(&reader.read_var_bytes()?).into_owned();
        let hash = if reader.remaining() >= 32 {
            Some(reader.read_hash()?)
        } else {
            None
        };
        Ok(Self {
            message,
            code,
            reason,
            hash,
        })
    }
}

/// Every message the scripted peer sends or understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkMessage {
    Version(VersionMessage),
    Verack,
    Ping(u64),
    Pong(u64),
    SendCmpct(SendCmpct),
    GetHeaders(GetHeaders),
    /// Bare headers; each is followed by a zero transaction count on the wire.
    Headers(Vec<BlockHeader>),
    Block(Block),
    Tx(Transaction),
    CmpctBlock(HeaderAndShortIds),
    Reject(RejectMessage),
    /// Any command we do not interpret; kept verbatim.
    Unknown { command: String, payload: Vec<u8> },
}

impl NetworkMessage {
    /// Command string placed in the frame header.
    pub fn command(&self) -> &str {
        match self {
            Self::Version(_) => "version",
            Self::Verack => "verack",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::SendCmpct(_) => "sendcmpct",
            Self::GetHeaders(_) => "getheaders",
            Self::Headers(_) => "headers",
            Self::Block(_) => "block",
            Self::Tx(_) => "tx",
            Self::CmpctBlock(_) => "cmpctblock",
            Self::Reject(_) => "reject",
            Self::Unknown { command, .. } => command,
        }
    }

    /// Serialize the payload (without frame header).
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Version(version) => version.encode(&mut out),
            Self::Verack => {}
            Self::Ping(nonce) | Self::Pong(nonce) => out.extend_from_slice(&nonce.to_le_bytes()),
            Self::SendCmpct(sendcmpct) => sendcmpct.encode(&mut out),
            Self::GetHeaders(getheaders) => getheaders.encode(&mut out),
            Self::Headers(headers) => {
                write_compact_size(&mut out, headers.len() as u64);
                for header in headers {
                    header.encode(&mut out);
                    write_compact_size(&mut out, 0);
                }
            }
            Self::Block(block) => {
                out.reserve(block.encoded_len());
                block.encode(&mut out);
            }
            Self::Tx(tx) => tx.encode(&mut out),
            Self::CmpctBlock(compact) => {
                out.reserve(compact.encoded_len());
                compact.encode(&mut out);
            }
            Self::Reject(reject) => reject.encode(&mut out),
            Self::Unknown { payload, .. } => out.extend_from_slice(payload),
        }
        out
    }

    /// Parse a payload received under `command`.
    pub fn decode(command: &str, payload: &[u8]) -> DecodeResult<Self> {
        let mut reader = Reader::new(payload);
        let message = match command {
            "version" => Self::Version(VersionMessage::decode(&mut reader)?),
            "verack" => Self::Verack,
            "ping" => Self::Ping(reader.read_u64_le()?),
            "pong" => Self::Pong(reader.read_u64_le()?),
            "sendcmpct" => Self::SendCmpct(SendCmpct::decode(&mut reader)?),
            "getheaders" => Self::GetHeaders(GetHeaders::decode(&mut reader)?),
            "headers" => {
                let count = reader.read_length()?;
                let mut headers = Vec::with_capacity(count.min(reader.remaining() / 81));
                for _ in 0..count {
                    headers.push(BlockHeader::decode(&mut reader)?);
                    let tx_count = reader.read_compact_size()?;
                    if tx_count != 0 {
                        return Err(DecodeError::InvalidField {
                            field: "headers tx count",
                            reason: format!("expected 0, got {tx_count}"),
                        });
                    }
                }
                Self::Headers(headers)
            }
            "block" => Self::Block(Block::decode(&mut reader)?),
            "tx" => Self::Tx(Transaction::decode(&mut reader)?),
            "cmpctblock" => Self::CmpctBlock(HeaderAndShortIds::decode(&mut reader)?),
            "reject" => Self::Reject(RejectMessage::decode(&mut reader)?),
            other => {
                return Ok(Self::Unknown {
                    command: other.to_string(),
                    payload: payload.to_vec(),
                })
            }
        };
        reader.finish()?;
        Ok(message)
    }
}
