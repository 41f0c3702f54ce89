//! Device configuration.

use ez_protocol::{HEADER_SIZE, PROTOCOL_VERSION};
use ez_symbols::BuiltinAddresses;
use serde::{Deserialize, Serialize};

use crate::arena::DEFAULT_ARENA_CAPACITY;
use crate::error::ConfigError;

/// Address range the host may place compiled code into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBufferConfig {
    /// First address.
    pub base: u32,
    /// Size in bytes.
    pub size: u32,
}

impl Default for CodeBufferConfig {
    fn default() -> Self {
        CodeBufferConfig {
            base: 0x2000,
            size: 0x800,
        }
    }
}

/// Device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Version string advertised in Setup.
    pub version: String,
    /// Size of the message arena in bytes.
    pub arena_capacity: usize,
    /// Code buffer range.
    pub code_buffer: CodeBufferConfig,
    /// Wait for the host's handshake magic before sending Setup.
    pub await_handshake: bool,
    /// Builtin symbol addresses.
    pub builtins: BuiltinAddresses,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            version: PROTOCOL_VERSION.to_string(),
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            code_buffer: CodeBufferConfig::default(),
            await_handshake: false,
            builtins: BuiltinAddresses::default(),
        }
    }
}

impl DeviceConfig {
    /// Check the configuration for values the device cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.arena_capacity < HEADER_SIZE {
            return Err(ConfigError::CapacityBelowHeader {
                capacity: self.arena_capacity,
                header_size: HEADER_SIZE,
            });
        }
        let CodeBufferConfig { base, size } = self.code_buffer;
        if size == 0 {
            return Err(ConfigError::EmptyCodeBuffer);
        }
        if u64::from(base) + u64::from(size) > 1 << 32 {
            return Err(ConfigError::CodeBufferWraps { base, size });
        }
        Ok(())
    }
}
