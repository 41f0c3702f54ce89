//! Message header encoding/decoding.
//!
//! Every message starts with a fixed 32-byte header made of four
//! little-endian `u64` slots:
//!
//! ```text
//! +------------+------------+------------+------------+----------------+
//! | total size | opcode     | seq id     | tag        | payload ...    |
//! | 8 bytes    | 8 bytes    | 8 bytes    | 8 bytes    | total - 32     |
//! +------------+------------+------------+------------+----------------+
//! ```
//!
//! The tag slot is reserved (0) except in Call messages, where it carries the
//! device address of the handler to invoke. Slots wider than the 32-bit model
//! fields saturate to `u32::MAX` on decode.

use bytes::BufMut;

use crate::constants::{HEADER_SIZE, SLOT_SIZE};
use crate::error::ProtocolError;
use crate::types::OpCode;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Correlation id; replies carry the id of their request.
    pub seq_id: u32,
    /// Message kind.
    pub op_code: OpCode,
    /// Payload length, excluding the header.
    pub payload_bytes: u32,
    /// Handler address for Call, otherwise 0.
    pub tag: u32,
}

impl MessageHeader {
    /// Create a header with a reserved tag.
    pub fn new(op_code: OpCode, seq_id: u32, payload_bytes: u32) -> Self {
        MessageHeader {
            seq_id,
            op_code,
            payload_bytes,
            tag: 0,
        }
    }

    /// Create a Call header addressed to `handler`.
    pub fn call(seq_id: u32, handler: u32, payload_bytes: u32) -> Self {
        MessageHeader {
            seq_id,
            op_code: OpCode::Call,
            payload_bytes,
            tag: handler,
        }
    }

    /// Value of the total size slot.
    pub fn total_size(&self) -> u64 {
        u64::from(self.payload_bytes) + HEADER_SIZE as u64
    }

    /// Encode the header to its wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        let mut dst = &mut raw[..];
        dst.put_u64_le(self.total_size());
        dst.put_u64_le(u64::from(u32::from(self.op_code)));
        dst.put_u64_le(u64::from(self.seq_id));
        dst.put_u64_le(u64::from(self.tag));
        raw
    }

    /// Decode a header from the first 32 bytes of `raw`.
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < HEADER_SIZE {
            return Err(ProtocolError::FrameTooShort {
                expected: HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let total_size = slot(raw, 0);
        let payload_bytes =
            total_size
                .checked_sub(HEADER_SIZE as u64)
                .ok_or(ProtocolError::HeaderUnderflow {
                    total_size,
                    header_size: HEADER_SIZE,
                })?;

        Ok(MessageHeader {
            payload_bytes: saturate(payload_bytes),
            op_code: OpCode::from(saturate(slot(raw, 1))),
            seq_id: saturate(slot(raw, 2)),
            tag: saturate(slot(raw, 3)),
        })
    }

    /// Sequence id of a raw header, even one that fails to decode.
    ///
    /// Returns 0 when fewer than 32 bytes are available.
    pub fn seq_id_of(raw: &[u8]) -> u32 {
        if raw.len() < HEADER_SIZE {
            return 0;
        }
        saturate(slot(raw, 2))
    }
}

fn slot(raw: &[u8], index: usize) -> u64 {
    let start = index * SLOT_SIZE;
    let mut bytes = [0u8; SLOT_SIZE];
    bytes.copy_from_slice(&raw[start..start + SLOT_SIZE]);
    u64::from_le_bytes(bytes)
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
