//! Protocol constants
//!
//! These constants define the framing sizes, opcode values and handshake
//! bytes shared by the device and the host side of the link.

// ============================================================================
// Framing
// ============================================================================

/// Size of every message header on the wire.
///
/// The header is four little-endian `u64` slots:
/// total size, opcode, sequence id and tag.
pub const HEADER_SIZE: usize = 32;

/// Width of a single numeric slot in headers and payloads.
pub const SLOT_SIZE: usize = 8;

/// Handshake sent once before the Setup message.
///
/// The bit pattern is a palindrome, so it reads the same regardless of the
/// byte order of either side:
/// `00000001 00100011 01010111 10111101 10111101 01010111 00100011 00000001`
pub const SETUP_MAGIC: [u8; 8] = [0x01, 0x23, 0x57, 0xBD, 0xBD, 0x57, 0x23, 0x01];

/// Version string advertised in the Setup message.
pub const PROTOCOL_VERSION: &str = "0.0.5";

/// Payload of a Hangup message after a clean shutdown.
pub const HANGUP_SUCCESS: [u8; 1] = [0];

// ============================================================================
// OpCodes
// ============================================================================

/// Device → host: session parameters after the handshake.
pub const OPC_SETUP: u32 = 0;
/// Either direction: end of session.
pub const OPC_HANGUP: u32 = 1;
/// Device → host: reply to a Call.
pub const OPC_RESULT: u32 = 2;
/// Host → device: invoke a handler.
pub const OPC_CALL: u32 = 3;
/// Device → host: a value reported by injected code.
pub const OPC_REPORT_VALUE: u32 = 4;
/// Device → host: a string reported by injected code.
pub const OPC_REPORT_STRING: u32 = 5;

// ============================================================================
// Symbol Names
// ============================================================================

/// Prefix routed to the builtin RPC endpoint table.
pub const PREFIX_RPC: &str = "__ez_clang_rpc_";
/// Prefix routed to the builtin runtime function table.
pub const PREFIX_RUNTIME: &str = "__ez_clang_";

/// The single symbol advertised during Setup.
pub const SYM_RPC_LOOKUP: &str = "__ez_clang_rpc_lookup";
/// Copies freshly compiled code into the code buffer.
pub const SYM_RPC_COMMIT: &str = "__ez_clang_rpc_commit";
/// Runs code previously committed to the code buffer.
pub const SYM_RPC_EXECUTE: &str = "__ez_clang_rpc_execute";
/// Reads a NUL-terminated string from device memory.
pub const SYM_RPC_MEM_READ_CSTRING: &str = "__ez_clang_rpc_mem_read_cstring";
/// Runtime support: report a numeric value to the host.
pub const SYM_REPORT_VALUE: &str = "__ez_clang_report_value";
/// Runtime support: report a string to the host.
pub const SYM_REPORT_STRING: &str = "__ez_clang_report_string";
/// Runtime support: acquire scratch memory from the inline heap.
pub const SYM_INLINE_HEAP_ACQUIRE: &str = "__ez_clang_inline_heap_acquire";
