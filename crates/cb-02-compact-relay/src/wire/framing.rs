//! Message framing.
//!
//! ```text
//! [magic: 4][command: 12, NUL padded][length: u32 LE][checksum: 4][payload]
//! ```
//!
//! The checksum is the first four bytes of the payload's double SHA-256.

use std::io::{self, Read, Write};

use shared_types::sha256d;

use super::NetworkMessage;
use crate::events::{RelayError, Result};

pub const COMMAND_SIZE: usize = 12;
pub const MESSAGE_HEADER_SIZE: usize = 4 + COMMAND_SIZE + 4 + 4;

/// Parsed frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: [u8; 4],
    pub command: String,
    pub length: u32,
    pub checksum: [u8; 4],
}

impl MessageHeader {
    pub fn parse(bytes: &[u8; MESSAGE_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let command_bytes = &bytes[4..4 + COMMAND_SIZE];
        let end = command_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(COMMAND_SIZE);
        let command = String::from_utf8_lossy(&command_bytes[..end]).into_owned();
        let mut length = [0u8; 4];
        length.copy_from_slice(&bytes[16..20]);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&bytes[20..24]);
        Self {
            magic,
            command,
            length: u32::from_le_bytes(length),
            checksum,
        }
    }
}

pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256d(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Frame `message` into a single buffer.
pub fn encode_frame(magic: [u8; 4], message: &NetworkMessage) -> Vec<u8> {
    let payload = message.encode_payload();
    let mut frame = Vec::with_capacity(MESSAGE_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&magic);
    let mut command = [0u8; COMMAND_SIZE];
    let name = message.command().as_bytes();
    let len = name.len().min(COMMAND_SIZE);
    command[..len].copy_from_slice(&name[..len]);
    frame.extend_from_slice(&command);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&checksum(&payload));
    frame.extend_from_slice(&payload);
    frame
}

pub fn write_frame<W: Write>(writer: &mut W, magic: [u8; 4], message: &NetworkMessage) -> Result<()> {
    writer.write_all(&encode_frame(magic, message))?;
    writer.flush()?;
    Ok(())
}

/// Read one complete frame and decode its payload.
///
/// A clean EOF before the header maps to [`RelayError::Disconnected`].
pub fn read_frame<R: Read>(reader: &mut R, magic: [u8; 4], max_payload: usize) -> Result<NetworkMessage> {
    let mut header_bytes = [0u8; MESSAGE_HEADER_SIZE];
    reader.read_exact(&mut header_bytes).map_err(eof_is_disconnect)?;
    let header = MessageHeader::parse(&header_bytes);

    if header.magic != magic {
        return Err(RelayError::BadMagic {
            expected: magic,
            actual: header.magic,
        });
    }
    let size = header.length as usize;
    if size > max_payload {
        return Err(RelayError::PayloadTooLarge {
            size,
            max: max_payload,
        });
    }

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).map_err(eof_is_disconnect)?;
    if checksum(&payload) != header.checksum {
        return Err(RelayError::BadChecksum {
            command: header.command,
        });
    }

    Ok(NetworkMessage::decode(&header.command, &payload)?)
}

fn eof_is_disconnect(err: io::Error) -> RelayError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            RelayError::Disconnected
        }
        _ => RelayError::Io(err),
    }
}
