//! ez-clang Device RPC Protocol
//!
//! This crate provides the wire format spoken between a host toolchain and a
//! microcontroller that accepts freshly compiled code over a serial link.
//!
//! # Protocol Overview
//!
//! After the device sends an 8-byte handshake magic and a **Setup** message,
//! the link carries strictly one request at a time:
//!
//! - **Call** (host → device): invoke the handler whose address is in the header tag
//! - **Result** (device → host): the handler's output, correlated by SeqID
//! - **Hangup** (either direction): ends the session, exactly once
//! - **ReportValue / ReportString** (device → host): output from injected code
//!
//! # Example
//!
//! ```rust,ignore
//! use ez_protocol::{FrameCodec, Incoming, OpCode};
//!
//! // Build a call
//! let bytes = FrameCodec::encode_call(1, lookup_addr, &payload);
//!
//! // Parse device output
//! let mut codec = FrameCodec::new();
//! codec.push(&received);
//! while let Some(item) = codec.decode()? { /* ... */ }
//! ```

mod constants;
mod error;
mod frame;
mod header;
mod serialize;
mod setup;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use header::*;
pub use serialize::*;
pub use setup::*;
pub use types::*;
