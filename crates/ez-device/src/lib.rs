//! # ez-device
//!
//! The device half of the ez-clang RPC link: a single-threaded engine that
//! sends the Setup handshake, then serves one Call at a time until the host
//! hangs up or a fatal error ends the session.
//!
//! ## Usage
//!
//! ```no_run
//! use ez_device::{Device, DeviceConfig, MemoryTransport};
//! use ez_symbols::LinkedTable;
//!
//! let mut device = Device::new(DeviceConfig::default(), LinkedTable::empty())?;
//! device.boot();
//!
//! let mut link = MemoryTransport::new();
//! let status = device.run_session(&mut link);
//! # Ok::<(), ez_device::DeviceError>(())
//! ```
//!
//! All message memory lives in one [`Arena`]; a Call's input and its response
//! share it without overlapping.

mod arena;
pub mod codec;
mod config;
mod error;
mod handler;
mod memory;
mod response;
pub mod rpc;
mod session;
mod transport;

pub use arena::*;
pub use codec::Inbound;
pub use config::*;
pub use error::*;
pub use handler::*;
pub use memory::*;
pub use response::*;
pub use session::*;
pub use transport::*;
