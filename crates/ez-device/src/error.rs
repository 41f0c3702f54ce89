//! Error types for ez-device.
//!
//! Errors fall into two classes. [`Recoverable`] errors are protocol-level:
//! the device formats them into the arena, replies with a Result and keeps
//! the session alive. [`FatalError`]s end the session; they travel up through
//! ordinary `Result` values until the session driver turns them into the one
//! terminal Hangup.

use ez_protocol::ProtocolError;
use ez_symbols::SymbolError;
use thiserror::Error;

// ============================================================================
// Transport
// ============================================================================

/// Errors reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away before the requested bytes arrived.
    #[error("link closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Arena
// ============================================================================

/// Rejected arena writes. Nothing is written when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// A response append would run past the end of the arena.
    #[error("response overflow: {requested} bytes requested, {remaining} bytes remaining")]
    Overflow {
        /// Bytes the append needed.
        requested: usize,
        /// Bytes left in the response view.
        remaining: usize,
    },

    /// An input view larger than the arena was requested.
    #[error("input of {len} bytes exceeds arena capacity ({capacity} bytes)")]
    InputTooLarge {
        /// Requested input length.
        len: usize,
        /// Arena capacity.
        capacity: usize,
    },
}

// ============================================================================
// Recoverable
// ============================================================================

/// Protocol-level errors that keep the session alive.
///
/// The `Display` text is what the host receives in the Result payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Recoverable {
    /// The declared payload does not fit the arena.
    #[error("Message payload ({payload_bytes} bytes) exceeds buffer size ({capacity} bytes)")]
    PayloadTooLarge {
        /// Declared payload length.
        payload_bytes: u32,
        /// Arena capacity.
        capacity: usize,
    },

    /// The header could not be decoded.
    #[error("Malformed message header: {0}")]
    MalformedHeader(ProtocolError),

    /// Only Call and Hangup are accepted from the host.
    #[error("Received unexpected message op-code: {0}")]
    UnexpectedOpCode(u32),

    /// No handler is registered at the Call's tag address.
    #[error("No handler registered at address {address:#010x}")]
    UnknownHandler {
        /// Tag from the Call header.
        address: u32,
    },
}

// ============================================================================
// Fatal
// ============================================================================

/// Category of a fatal error, doubling as the session status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FatalKind {
    /// Transport failed; the link is assumed dead.
    LinkDown = 1,
    /// A builtin-prefixed name is missing from its table.
    BuiltinSymbolMissing = 2,
    /// The Setup payload does not fit the arena.
    SetupOverflow = 3,
    /// A handler hit an invariant violation.
    Handler = 4,
    /// A response write ran past the arena.
    ArenaOverflow = 5,
}

/// An error that ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FatalError {
    /// Error category.
    pub kind: FatalKind,
    /// Text sent in the Hangup payload.
    pub message: String,
}

impl FatalError {
    /// Create a fatal error.
    pub fn new(kind: FatalKind, message: impl Into<String>) -> Self {
        FatalError {
            kind,
            message: message.into(),
        }
    }

    /// Create a fatal error raised by a handler.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(FatalKind::Handler, message)
    }

    /// Session status code, always in `1..=127`.
    pub fn code(&self) -> u8 {
        self.kind as u8
    }
}

impl From<TransportError> for FatalError {
    fn from(err: TransportError) -> Self {
        FatalError::new(FatalKind::LinkDown, err.to_string())
    }
}

impl From<SymbolError> for FatalError {
    fn from(err: SymbolError) -> Self {
        FatalError::new(FatalKind::BuiltinSymbolMissing, err.to_string())
    }
}

impl From<ArenaError> for FatalError {
    fn from(err: ArenaError) -> Self {
        FatalError::new(FatalKind::ArenaOverflow, err.to_string())
    }
}

/// Outcome of a failed receive step: reply and continue, or end the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Reply with an error Result and keep looping.
    #[error(transparent)]
    Recoverable(#[from] Recoverable),

    /// Hang up.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl From<TransportError> for Fault {
    fn from(err: TransportError) -> Self {
        Fault::Fatal(err.into())
    }
}

impl From<ArenaError> for Fault {
    fn from(err: ArenaError) -> Self {
        Fault::Fatal(err.into())
    }
}

// ============================================================================
// Construction
// ============================================================================

/// Invalid device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The arena has no room at all.
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,

    /// The arena cannot hold a message header.
    #[error("arena capacity ({capacity} bytes) is smaller than a message header ({header_size} bytes)")]
    CapacityBelowHeader {
        /// Configured capacity.
        capacity: usize,
        /// Header size.
        header_size: usize,
    },

    /// The code buffer has no room.
    #[error("code buffer size must be non-zero")]
    EmptyCodeBuffer,

    /// The code buffer runs past the end of the 32-bit address space.
    #[error("code buffer {base:#010x}+{size:#x} exceeds the address space")]
    CodeBufferWraps {
        /// Base address.
        base: u32,
        /// Size in bytes.
        size: u32,
    },
}

/// Handler registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Address 0 is the lookup miss sentinel.
    #[error("handler address must be non-zero")]
    NullAddress,

    /// Another handler owns this address.
    #[error("handler already registered at {address:#010x}")]
    Duplicate {
        /// Contested address.
        address: u32,
    },
}

/// Errors creating a [`Device`](crate::Device).
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Builtin handlers could not be installed.
    #[error("handler registration failed: {0}")]
    Registry(#[from] RegistryError),
}
