//! Combined, tiered symbol resolution.

use ez_protocol::Symbol;

use crate::builtin::BuiltinTables;
use crate::error::SymbolError;
use crate::linked::{LinkedTable, SYMBOL_NOT_FOUND};

/// Name → address resolution over every table the firmware carries.
///
/// Tiers, first hit wins:
/// 1. bootstrap symbol (only advertised during Setup, see [`Self::bootstrap_symbols`])
/// 2. builtin tables, selected by name prefix
/// 3. the linked table, by binary search
#[derive(Debug, Clone, Copy)]
pub struct SymbolResolver<'a> {
    builtins: &'a BuiltinTables,
    linked: LinkedTable<'a>,
}

impl<'a> SymbolResolver<'a> {
    /// Create a resolver over the given tables.
    pub fn new(builtins: &'a BuiltinTables, linked: LinkedTable<'a>) -> Self {
        SymbolResolver { builtins, linked }
    }

    /// Symbols the host needs before it can look anything else up.
    pub fn bootstrap_symbols(&self) -> &'a [Symbol<'static>] {
        self.builtins.bootstrap()
    }

    /// Prefix-routed builtin lookup; `Ok(None)` when no prefix matches.
    pub fn lookup_builtin(&self, name: &[u8]) -> Result<Option<u32>, SymbolError> {
        self.builtins.lookup(name)
    }

    /// Linked table lookup; [`SYMBOL_NOT_FOUND`] on a miss.
    pub fn lookup_symbol(&self, name: &[u8]) -> u32 {
        self.linked.lookup(name)
    }

    /// Resolve a host-requested name: builtin tables first, then the linked table.
    ///
    /// Returns [`SYMBOL_NOT_FOUND`] after exhausting both tiers. A builtin
    /// prefix miss is returned as an error and must end the session.
    pub fn resolve(&self, name: &[u8]) -> Result<u32, SymbolError> {
        if let Some(addr) = self.lookup_builtin(name)? {
            return Ok(addr);
        }
        let addr = self.lookup_symbol(name);
        if addr == SYMBOL_NOT_FOUND {
            log::debug!("symbol not found: {}", String::from_utf8_lossy(name));
        }
        Ok(addr)
    }

    /// The linked table.
    pub fn linked(&self) -> LinkedTable<'a> {
        self.linked
    }

    /// The builtin tables.
    pub fn builtins(&self) -> &'a BuiltinTables {
        self.builtins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::SymbolImage;

    fn image() -> SymbolImage {
        SymbolImage::from_symbols([("printf", 0x500u32), ("malloc", 0x300), ("abort", 0x100)])
            .expect("valid symbols")
    }

    #[test]
    fn test_resolve_tiers() {
        let builtins = BuiltinTables::default();
        let image = image();
        let resolver = SymbolResolver::new(&builtins, image.table());

        assert_eq!(resolver.resolve(b"__ez_clang_rpc_execute").unwrap(), 0x1060);
        assert_eq!(resolver.resolve(b"__ez_clang_report_string").unwrap(), 0x1090);
        assert_eq!(resolver.resolve(b"malloc").unwrap(), 0x300);
        assert_eq!(resolver.resolve(b"strlen").unwrap(), SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_resolve_builtin_prefix_miss_is_error() {
        let builtins = BuiltinTables::default();
        let resolver = SymbolResolver::new(&builtins, LinkedTable::empty());
        let err = resolver.resolve(b"__ez_clang_rpc_unknown").unwrap_err();
        assert!(err.is_configuration_mismatch());
    }

    #[test]
    fn test_bootstrap_symbols() {
        let builtins = BuiltinTables::default();
        let resolver = SymbolResolver::new(&builtins, LinkedTable::empty());
        let boot = resolver.bootstrap_symbols();
        assert_eq!(boot.len(), 1);
        assert_eq!(boot[0].name, b"__ez_clang_rpc_lookup");
    }
}
