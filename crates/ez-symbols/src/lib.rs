//! Symbol tables for ez-clang devices.
//!
//! The device resolves names through three tiers:
//!
//! - **Bootstrap**: the single lookup endpoint, advertised in Setup
//! - **Builtins**: compiled-in RPC endpoints and runtime functions, routed by name prefix
//! - **Linked table**: the firmware's exported symbols, sorted for binary search
//!
//! [`exports`] produces the linked table at firmware build time from the
//! image's ELF symbol table and an allow-list.

mod builtin;
mod error;
pub mod exports;
mod linked;
mod resolver;

pub use builtin::*;
pub use error::*;
pub use exports::{AllowList, ExportReport, SymbolImage};
pub use linked::*;
pub use resolver::*;
