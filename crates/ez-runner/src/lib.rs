//! # ez-runner
//!
//! Host-side tools around the ez-clang device engine:
//!
//! - `ez-sim` serves simulated device sessions over TCP, one connection per session
//! - `ez-exports` reduces a firmware image's ELF symbol table to the compact
//!   export table the device binary-searches

pub mod logging;
pub mod sim;
pub mod tcp;

pub use sim::{serve, SimConfig, SimError, SymbolFiles, DEFAULT_LISTEN};
pub use tcp::{accept_next, TcpTransport};
