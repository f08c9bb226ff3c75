//! # Scripts
//!
//! Raw script bytes plus a builder for the handful of shapes the harness
//! produces: anyone-can-spend outputs, coinbase height pushes, data
//! carriers and padding scripts of an exact byte length.

use std::fmt;

use crate::encoding::{compact_size_len, write_var_bytes, Decodable, Encodable, Reader};
use crate::errors::Result;

/// Opcode constants.
pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_FALSE: u8 = OP_0;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_TRUE: u8 = OP_1;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_CHECKSIG: u8 = 0xac;
}

use opcodes::*;

/// Largest payload a single direct push opcode can carry.
const MAX_DIRECT_PUSH: usize = 0x4b;

/// Serialized script bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The single-opcode `OP_TRUE` script.
    pub fn op_true() -> Self {
        Self(vec![OP_TRUE])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() > 64 {
            write!(f, "Script({}.., {} bytes)", hex::encode(&self.0[..32]), self.0.len())
        } else {
            write!(f, "Script({})", hex::encode(&self.0))
        }
    }
}

impl Encodable for Script {
    fn encode(&self, out: &mut Vec<u8>) {
        write_var_bytes(out, &self.0);
    }

    fn encoded_len(&self) -> usize {
        compact_size_len(self.0.len() as u64) + self.0.len()
    }
}

impl Decodable for Script {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self(reader.read_var_bytes()?))
    }
}

/// Minimal little-endian sign-magnitude encoding of a script number.
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    // Top bit is the sign; add a byte when the magnitude already uses it.
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// Incremental script builder.
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn push_opcode(mut self, op: u8) -> Self {
        self.bytes.push(op);
        self
    }

    /// Append `op` `count` times.
    pub fn push_opcodes(mut self, op: u8, count: usize) -> Self {
        self.bytes.resize(self.bytes.len() + count, op);
        self
    }

    /// Push data with the smallest push opcode able to carry it.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len <= MAX_DIRECT_PUSH {
            self.bytes.push(len as u8);
        } else if len <= 0xff {
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(len as u8);
        } else if len <= 0xffff {
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.bytes.push(OP_PUSHDATA4);
            self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Push an integer, using the small-integer opcodes where they exist.
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(OP_1 + (n as u8) - 1),
            _ => self.push_slice(&encode_script_num(n)),
        }
    }

    /// Push a run of zero bytes whose push, prefix included, occupies
    /// exactly `total_len` bytes.
    ///
    /// The prefix widens (direct, `PUSHDATA1`, `PUSHDATA2`, `PUSHDATA4`)
    /// when the narrower one cannot reach `total_len`, so every length is
    /// reachable. A length of one is a bare `OP_0`; zero appends nothing.
    pub fn push_filler(mut self, total_len: usize) -> Self {
        match total_len {
            0 => return self,
            1 => return self.push_opcode(OP_0),
            _ => {}
        }
        let data_len = if total_len - 1 <= MAX_DIRECT_PUSH {
            let data_len = total_len - 1;
            self.bytes.push(data_len as u8);
            data_len
        } else if total_len - 2 <= 0xff {
            let data_len = total_len - 2;
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(data_len as u8);
            data_len
        } else if total_len - 3 <= 0xffff {
            let data_len = total_len - 3;
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(data_len as u16).to_le_bytes());
            data_len
        } else {
            let data_len = total_len - 5;
            self.bytes.push(OP_PUSHDATA4);
            self.bytes.extend_from_slice(&(data_len as u32).to_le_bytes());
            data_len
        };
        self.bytes.resize(self.bytes.len() + data_len, 0x00);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_script(self) -> Script {
        Script(self.bytes)
    }
}
