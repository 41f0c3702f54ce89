//! Primitive field encoding.
//!
//! Numbers travel as little-endian `u64` slots, strings as NUL-terminated
//! byte sequences. Addresses are 32-bit on the device but occupy a full slot.

use bytes::BufMut;

use crate::constants::SLOT_SIZE;
use crate::error::ProtocolError;

/// Append a numeric slot.
pub fn put_slot<B: BufMut>(dst: &mut B, value: u64) {
    dst.put_u64_le(value);
}

/// Append a NUL-terminated string.
pub fn put_cstr<B: BufMut>(dst: &mut B, s: &[u8]) {
    dst.put_slice(s);
    dst.put_u8(0);
}

/// Encoded size of a C-string field.
pub fn cstr_len(s: &[u8]) -> usize {
    s.len() + 1
}

/// Cursor over a received payload.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, offset: 0 }
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    /// Whether everything has been consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Read one numeric slot.
    pub fn read_slot(&mut self) -> Result<u64, ProtocolError> {
        let end = self.offset + SLOT_SIZE;
        if end > self.data.len() {
            return Err(ProtocolError::FrameTooShort {
                expected: end,
                actual: self.data.len(),
            });
        }
        let mut raw = [0u8; SLOT_SIZE];
        raw.copy_from_slice(&self.data[self.offset..end]);
        self.offset = end;
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a slot that must fit in 32 bits.
    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let value = self.read_slot()?;
        u32::try_from(value).map_err(|_| ProtocolError::FieldOverflow { field, value })
    }

    /// Read a NUL-terminated string, returning it without the terminator.
    pub fn read_cstr(&mut self) -> Result<&'a [u8], ProtocolError> {
        let start = self.offset;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::Unterminated { offset: start })?;
        self.offset = start + len + 1;
        Ok(&rest[..len])
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.offset.saturating_add(len);
        if end > self.data.len() {
            return Err(ProtocolError::FrameTooShort {
                expected: end,
                actual: self.data.len(),
            });
        }
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }
}
