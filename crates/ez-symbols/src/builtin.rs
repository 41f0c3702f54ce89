//! Builtin symbol tables.
//!
//! A handful of symbols are compiled into the firmware rather than exported
//! through the linked table. Names are routed by prefix:
//!
//! | Prefix            | Table               |
//! |-------------------|---------------------|
//! | `__ez_clang_rpc_` | RPC endpoints       |
//! | `__ez_clang_`     | runtime functions   |
//!
//! The RPC prefix is the narrower one and is checked first. A routed name
//! that is missing from its table means firmware and host were built from
//! different versions, which is fatal.

use ez_protocol::{
    Symbol, PREFIX_RPC, PREFIX_RUNTIME, SYM_INLINE_HEAP_ACQUIRE, SYM_REPORT_STRING,
    SYM_REPORT_VALUE, SYM_RPC_COMMIT, SYM_RPC_EXECUTE, SYM_RPC_LOOKUP, SYM_RPC_MEM_READ_CSTRING,
};
use serde::{Deserialize, Serialize};

use crate::error::SymbolError;

/// Which builtin table a prefix selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTable {
    /// `__ez_clang_rpc_*`
    RpcEndpoint,
    /// `__ez_clang_*`
    RuntimeFunction,
}

impl std::fmt::Display for BuiltinTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuiltinTable::RpcEndpoint => write!(f, "RPC endpoint"),
            BuiltinTable::RuntimeFunction => write!(f, "runtime function"),
        }
    }
}

impl BuiltinTable {
    /// Select the table for `name`, if any prefix matches.
    pub fn route(name: &[u8]) -> Option<Self> {
        if name.starts_with(PREFIX_RPC.as_bytes()) {
            Some(BuiltinTable::RpcEndpoint)
        } else if name.starts_with(PREFIX_RUNTIME.as_bytes()) {
            Some(BuiltinTable::RuntimeFunction)
        } else {
            None
        }
    }
}

/// Device addresses of the builtin symbols.
///
/// On hardware these come from the linked image; here they are part of the
/// device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinAddresses {
    /// `__ez_clang_rpc_lookup`, the bootstrap symbol.
    pub rpc_lookup: u32,
    /// `__ez_clang_rpc_commit`
    pub rpc_commit: u32,
    /// `__ez_clang_rpc_execute`
    pub rpc_execute: u32,
    /// `__ez_clang_rpc_mem_read_cstring`
    pub rpc_mem_read_cstring: u32,
    /// `__ez_clang_report_value`
    pub report_value: u32,
    /// `__ez_clang_report_string`
    pub report_string: u32,
    /// `__ez_clang_inline_heap_acquire`
    pub inline_heap_acquire: u32,
}

impl Default for BuiltinAddresses {
    fn default() -> Self {
        BuiltinAddresses {
            rpc_lookup: 0x1040,
            rpc_commit: 0x1050,
            rpc_execute: 0x1060,
            rpc_mem_read_cstring: 0x1070,
            report_value: 0x1080,
            report_string: 0x1090,
            inline_heap_acquire: 0x10a0,
        }
    }
}

/// The fixed, compiled-in symbol tables.
#[derive(Debug, Clone)]
pub struct BuiltinTables {
    bootstrap: [Symbol<'static>; 1],
    rpc: [Symbol<'static>; 3],
    runtime: [Symbol<'static>; 3],
}

impl BuiltinTables {
    /// Build the tables for the given addresses.
    pub fn new(addrs: &BuiltinAddresses) -> Self {
        BuiltinTables {
            bootstrap: [Symbol::new(SYM_RPC_LOOKUP, addrs.rpc_lookup)],
            rpc: [
                Symbol::new(SYM_RPC_COMMIT, addrs.rpc_commit),
                Symbol::new(SYM_RPC_EXECUTE, addrs.rpc_execute),
                Symbol::new(SYM_RPC_MEM_READ_CSTRING, addrs.rpc_mem_read_cstring),
            ],
            runtime: [
                Symbol::new(SYM_REPORT_VALUE, addrs.report_value),
                Symbol::new(SYM_REPORT_STRING, addrs.report_string),
                Symbol::new(SYM_INLINE_HEAP_ACQUIRE, addrs.inline_heap_acquire),
            ],
        }
    }

    /// The single symbol advertised during Setup.
    pub fn bootstrap(&self) -> &[Symbol<'static>] {
        &self.bootstrap
    }

    /// Table for a routing prefix.
    pub fn table(&self, which: BuiltinTable) -> &[Symbol<'static>] {
        match which {
            BuiltinTable::RpcEndpoint => &self.rpc,
            BuiltinTable::RuntimeFunction => &self.runtime,
        }
    }

    /// Prefix-routed lookup.
    ///
    /// Returns `Ok(None)` when no prefix matches, so the caller can fall back
    /// to the linked table.
    pub fn lookup(&self, name: &[u8]) -> Result<Option<u32>, SymbolError> {
        let Some(which) = BuiltinTable::route(name) else {
            return Ok(None);
        };
        match lookup_unordered(self.table(which), name) {
            Some(addr) => Ok(Some(addr)),
            None => Err(SymbolError::BuiltinNotFound {
                table: which,
                name: String::from_utf8_lossy(name).to_string(),
            }),
        }
    }

    /// Every builtin symbol, bootstrap first.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol<'static>> {
        self.bootstrap
            .iter()
            .chain(self.rpc.iter())
            .chain(self.runtime.iter())
    }

    /// Builtin symbol located at `address`, if any.
    pub fn symbol_at(&self, address: u32) -> Option<Symbol<'static>> {
        self.iter().find(|sym| sym.address == address).copied()
    }
}

impl Default for BuiltinTables {
    fn default() -> Self {
        Self::new(&BuiltinAddresses::default())
    }
}

/// Linear scan comparing full names.
fn lookup_unordered(table: &[Symbol<'_>], name: &[u8]) -> Option<u32> {
    table
        .iter()
        .find(|sym| sym.name == name)
        .map(|sym| sym.address)
}
