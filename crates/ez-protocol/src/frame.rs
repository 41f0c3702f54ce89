//! Frame encoding/decoding utilities for the host side of the link.
//!
//! The device stream is the 8-byte setup magic followed by a sequence of
//! frames, each a fixed header and its payload:
//!
//! ```text
//! +-------+-----------+---------------+-----------+---------------+----
//! | magic | header    | payload       | header    | payload       | ...
//! | 8     | 32        | total - 32    | 32        | total - 32    |
//! +-------+-----------+---------------+-----------+---------------+----
//! ```

use bytes::{Buf, BytesMut};

use crate::constants::{HEADER_SIZE, SETUP_MAGIC};
use crate::error::ProtocolError;
use crate::header::MessageHeader;
use crate::types::OpCode;

/// Initial buffer size for accumulating device output.
pub const INITIAL_BUFFER_SIZE: usize = 1024;

/// One complete message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: MessageHeader,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Payload interpreted as text, up to the first NUL.
    pub fn payload_text(&self) -> String {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        String::from_utf8_lossy(&self.payload[..end]).to_string()
    }
}

/// Items recognised in the device's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// The handshake magic preceding Setup.
    Magic,
    /// A complete message.
    Frame(Frame),
}

/// A codec for reading and writing framed messages.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next item from the buffer.
    ///
    /// Returns `Ok(Some(item))` if a complete item is available,
    /// `Ok(None)` if more data is needed, or `Err` if the header is invalid.
    pub fn decode(&mut self) -> Result<Option<Incoming>, ProtocolError> {
        if self.buffer.len() >= SETUP_MAGIC.len() && self.buffer[..SETUP_MAGIC.len()] == SETUP_MAGIC
        {
            self.buffer.advance(SETUP_MAGIC.len());
            return Ok(Some(Incoming::Magic));
        }

        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = MessageHeader::decode(&self.buffer[..HEADER_SIZE])?;
        let len = header.payload_bytes as usize;

        // Check if we have the complete frame
        if self.buffer.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        let payload = self.buffer.split_to(len).to_vec();
        log::trace!(
            "decoded {} frame: seq={} payload={} bytes",
            header.op_code,
            header.seq_id,
            len
        );

        Ok(Some(Incoming::Frame(Frame { header, payload })))
    }

    /// Decode every complete item currently buffered.
    pub fn decode_all(&mut self) -> Result<Vec<Incoming>, ProtocolError> {
        let mut items = Vec::new();
        while let Some(item) = self.decode()? {
            items.push(item);
        }
        Ok(items)
    }

    /// Encode a message for host→device transmission.
    pub fn encode(op_code: OpCode, seq_id: u32, tag: u32, payload: &[u8]) -> Vec<u8> {
        let header = MessageHeader {
            seq_id,
            op_code,
            payload_bytes: payload.len() as u32,
            tag,
        };
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(payload);
        buf
    }

    /// Encode a Call to the handler at `handler`.
    pub fn encode_call(seq_id: u32, handler: u32, payload: &[u8]) -> Vec<u8> {
        Self::encode(OpCode::Call, seq_id, handler, payload)
    }

    /// Encode a Hangup request.
    pub fn encode_hangup(seq_id: u32) -> Vec<u8> {
        Self::encode(OpCode::Hangup, seq_id, 0, &[])
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
