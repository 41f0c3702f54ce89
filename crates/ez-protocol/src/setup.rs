//! Setup message payload.
//!
//! ```text
//! version\0 | code buffer base | code buffer size | N | N x (name\0 | address)
//! ```
//!
//! Numeric fields are `u64` slots. The payload tells the host where it may
//! place newly compiled code and which symbols already exist on the device.

use crate::constants::SLOT_SIZE;
use crate::error::ProtocolError;
use crate::serialize::{cstr_len, put_cstr, put_slot, Reader};
use crate::types::Symbol;

/// Session parameters advertised by the device.
#[derive(Debug, Clone, Copy)]
pub struct SetupInfo<'a> {
    /// Protocol version string.
    pub version: &'a str,
    /// First address of the code buffer.
    pub code_buffer_base: u32,
    /// Size of the code buffer in bytes.
    pub code_buffer_size: u32,
    /// Symbols the host can use before any lookup.
    pub symbols: &'a [Symbol<'a>],
}

impl<'a> SetupInfo<'a> {
    /// Size of the encoded payload.
    pub fn encoded_len(&self) -> usize {
        let fixed = cstr_len(self.version.as_bytes()) + 3 * SLOT_SIZE;
        self.symbols
            .iter()
            .fold(fixed, |acc, sym| acc + cstr_len(sym.name) + SLOT_SIZE)
    }

    /// Encode into `buf`, returning the number of bytes written.
    ///
    /// Nothing is written when the payload does not fit.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let needed = self.encoded_len();
        if needed > buf.len() {
            return Err(ProtocolError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        let mut dst = &mut buf[..needed];
        put_cstr(&mut dst, self.version.as_bytes());
        put_slot(&mut dst, u64::from(self.code_buffer_base));
        put_slot(&mut dst, u64::from(self.code_buffer_size));
        put_slot(&mut dst, self.symbols.len() as u64);
        for sym in self.symbols {
            put_cstr(&mut dst, sym.name);
            put_slot(&mut dst, u64::from(sym.address));
        }

        Ok(needed)
    }

    /// Encode to a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        // The buffer is sized from encoded_len, so this cannot fail.
        let _ = self.encode_into(&mut buf);
        buf
    }
}

/// Setup payload as received by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupMessage {
    /// Protocol version string.
    pub version: String,
    /// First address of the code buffer.
    pub code_buffer_base: u32,
    /// Size of the code buffer in bytes.
    pub code_buffer_size: u32,
    /// Advertised symbols as (name, address).
    pub symbols: Vec<(String, u32)>,
}

impl SetupMessage {
    /// Decode a Setup payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(payload);

        let version = utf8(reader.read_cstr()?)?;
        let code_buffer_base = reader.read_u32("code_buffer_base")?;
        let code_buffer_size = reader.read_u32("code_buffer_size")?;
        let count = reader.read_slot()?;

        let mut symbols = Vec::new();
        for _ in 0..count {
            let name = utf8(reader.read_cstr()?)?;
            let address = reader.read_u32("address")?;
            symbols.push((name, address));
        }

        Ok(SetupMessage {
            version,
            code_buffer_base,
            code_buffer_size,
            symbols,
        })
    }

    /// Address of an advertised symbol.
    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, addr)| *addr)
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}
