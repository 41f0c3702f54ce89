//! Simulated code buffer.
//!
//! On hardware the code buffer is a linker-reserved RAM range. Here it is a
//! byte vector placed at a configured base address.

use thiserror::Error;

/// Errors accessing the code buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The access falls outside the code buffer.
    #[error("Access at {address:#010x} ({len} bytes) is outside the code buffer {base:#010x}..{end:#010x}")]
    OutOfRange {
        /// First address accessed.
        address: u32,
        /// Access length.
        len: u64,
        /// Code buffer base.
        base: u32,
        /// One past the last code buffer address.
        end: u64,
    },

    /// No NUL terminator before the end of the code buffer.
    #[error("Unterminated string at {address:#010x}")]
    Unterminated {
        /// Start of the string.
        address: u32,
    },
}

/// Writable memory range the host places compiled code into.
#[derive(Debug, Clone)]
pub struct CodeBuffer {
    base: u32,
    bytes: Vec<u8>,
}

impl CodeBuffer {
    /// Create a zeroed buffer of `size` bytes at `base`.
    pub fn new(base: u32, size: u32) -> Self {
        CodeBuffer {
            base,
            bytes: vec![0u8; size as usize],
        }
    }

    /// First address.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Whether `[address, address + len)` lies inside the buffer.
    pub fn contains(&self, address: u32, len: u64) -> bool {
        self.offset(address, len).is_ok()
    }

    /// Copy `data` to `address`.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError> {
        let start = self.offset(address, data.len() as u64)?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read `len` bytes at `address`.
    pub fn read(&self, address: u32, len: usize) -> Result<&[u8], MemoryError> {
        let start = self.offset(address, len as u64)?;
        Ok(&self.bytes[start..start + len])
    }

    /// The NUL-terminated string at `address`, without its terminator.
    pub fn read_cstring(&self, address: u32) -> Result<&[u8], MemoryError> {
        let start = self.offset(address, 1)?;
        let rest = &self.bytes[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::Unterminated { address })?;
        Ok(&rest[..len])
    }

    /// Zero the whole buffer.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn offset(&self, address: u32, len: u64) -> Result<usize, MemoryError> {
        let end = u64::from(self.base) + self.bytes.len() as u64;
        let out_of_range = MemoryError::OutOfRange {
            address,
            len,
            base: self.base,
            end,
        };
        if address < self.base || u64::from(address) + len > end {
            return Err(out_of_range);
        }
        Ok((address - self.base) as usize)
    }
}
