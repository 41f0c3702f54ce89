//! Linked symbol table.
//!
//! The export generator reduces a firmware image's ELF symbol table to the
//! compact form embedded in the firmware:
//!
//! | Section | Layout                                                      |
//! |---------|-------------------------------------------------------------|
//! | symtab  | `N` entries of `{ st_name: u32, st_value: u32 }`, little-endian |
//! | strtab  | NUL byte, then each name NUL-terminated                     |
//!
//! Entries are sorted by byte-exact name order, so lookups binary-search
//! directly over the embedded bytes without decoding the table.

use std::cmp::Ordering;

use ez_protocol::Symbol;

use crate::error::SymbolError;

/// Size of one compact symtab entry.
pub const ENTRY_SIZE: usize = 8;

/// Returned by [`LinkedTable::lookup`] when a name is absent.
pub const SYMBOL_NOT_FOUND: u32 = 0;

/// Read-only view of a compact, sorted symbol table.
#[derive(Debug, Clone, Copy)]
pub struct LinkedTable<'a> {
    symtab: &'a [u8],
    strtab: &'a [u8],
}

impl<'a> LinkedTable<'a> {
    /// A table with no entries.
    pub const fn empty() -> Self {
        LinkedTable {
            symtab: &[],
            strtab: &[],
        }
    }

    /// Wrap embedded symtab/strtab sections, validating every entry once.
    pub fn new(symtab: &'a [u8], strtab: &'a [u8]) -> Result<Self, SymbolError> {
        if symtab.len() % ENTRY_SIZE != 0 {
            return Err(SymbolError::SymtabPadding {
                size: symtab.len(),
                entry_size: ENTRY_SIZE,
            });
        }

        let table = LinkedTable { symtab, strtab };
        for index in 0..table.len() {
            let offset = table.name_offset(index);
            let start = offset as usize;
            if start >= strtab.len() {
                return Err(SymbolError::StrtabOffset { index, offset });
            }
            if !strtab[start..].contains(&0) {
                return Err(SymbolError::UnterminatedString { index });
            }
            // Binary search needs strictly ascending names.
            if index > 0 && table.entry(index - 1).name >= table.entry(index).name {
                return Err(SymbolError::Unsorted { index });
            }
        }

        log::debug!(
            "linked symbol table: {} entries, {} bytes of strings",
            table.len(),
            strtab.len()
        );
        Ok(table)
    }

    /// Wrap sections that were produced by this crate and are known valid.
    pub(crate) fn new_unchecked(symtab: &'a [u8], strtab: &'a [u8]) -> Self {
        LinkedTable { symtab, strtab }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.symtab.len() / ENTRY_SIZE
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.symtab.is_empty()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<Symbol<'a>> {
        if index < self.len() {
            Some(self.entry(index))
        } else {
            None
        }
    }

    /// Iterate entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol<'a>> + '_ {
        (0..self.len()).map(move |i| self.entry(i))
    }

    /// Binary search for `name`.
    ///
    /// Comparison is exact-length and byte-exact. Returns
    /// [`SYMBOL_NOT_FOUND`] on a miss.
    pub fn lookup(&self, name: &[u8]) -> u32 {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.entry(mid);
            match name.cmp(entry.name) {
                Ordering::Greater => lo = mid + 1,
                Ordering::Less => hi = mid,
                Ordering::Equal => return entry.address,
            }
        }
        SYMBOL_NOT_FOUND
    }

    fn word(&self, at: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.symtab[at..at + 4]);
        u32::from_le_bytes(raw)
    }

    fn name_offset(&self, index: usize) -> u32 {
        self.word(index * ENTRY_SIZE)
    }

    fn entry(&self, index: usize) -> Symbol<'a> {
        let start = self.name_offset(index) as usize;
        let address = self.word(index * ENTRY_SIZE + 4);
        let rest = &self.strtab[start..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Symbol {
            name: &rest[..len],
            address,
        }
    }
}

impl Default for LinkedTable<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-encode a table from already sorted entries.
    fn encode(entries: &[(&str, u32)]) -> (Vec<u8>, Vec<u8>) {
        let mut symtab = Vec::new();
        let mut strtab = vec![0u8];
        for (name, addr) in entries {
            symtab.extend_from_slice(&(strtab.len() as u32).to_le_bytes());
            symtab.extend_from_slice(&addr.to_le_bytes());
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }
        (symtab, strtab)
    }

    const ENTRIES: [(&str, u32); 5] = [
        ("abort", 0x100),
        ("free", 0x200),
        ("malloc", 0x300),
        ("memcpy", 0x400),
        ("printf", 0x500),
    ];

    #[test]
    fn test_lookup_every_entry() {
        let (symtab, strtab) = encode(&ENTRIES);
        let table = LinkedTable::new(&symtab, &strtab).expect("valid table");
        assert_eq!(table.len(), 5);
        for (name, addr) in ENTRIES {
            assert_eq!(table.lookup(name.as_bytes()), addr, "lookup {}", name);
        }
    }

    #[test]
    fn test_lookup_absent_names() {
        let (symtab, strtab) = encode(&ENTRIES);
        let table = LinkedTable::new(&symtab, &strtab).expect("valid table");
        assert_eq!(table.lookup(b"aaa"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b"zzz"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b"mem"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b"memcpy2"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b"Malloc"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b""), SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_lookup_empty_table() {
        let table = LinkedTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.lookup(b"printf"), SYMBOL_NOT_FOUND);

        let table = LinkedTable::new(&[], &[0]).expect("valid empty table");
        assert_eq!(table.lookup(b"printf"), SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_lookup_single_entry() {
        let (symtab, strtab) = encode(&[("only", 7)]);
        let table = LinkedTable::new(&symtab, &strtab).expect("valid table");
        assert_eq!(table.lookup(b"only"), 7);
        assert_eq!(table.lookup(b"onl"), SYMBOL_NOT_FOUND);
        assert_eq!(table.lookup(b"other"), SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_iter_and_get() {
        let (symtab, strtab) = encode(&ENTRIES[..2]);
        let table = LinkedTable::new(&symtab, &strtab).expect("valid table");
        let names: Vec<_> = table.iter().map(|s| s.name.to_vec()).collect();
        assert_eq!(names, vec![b"abort".to_vec(), b"free".to_vec()]);
        assert_eq!(table.get(1).map(|s| s.address), Some(0x200));
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_new_rejects_padding() {
        let (mut symtab, strtab) = encode(&ENTRIES);
        symtab.push(0);
        assert!(matches!(
            LinkedTable::new(&symtab, &strtab),
            Err(SymbolError::SymtabPadding { .. })
        ));
    }

    #[test]
    fn test_new_rejects_bad_offset() {
        let (mut symtab, strtab) = encode(&ENTRIES);
        symtab[8..12].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            LinkedTable::new(&symtab, &strtab),
            Err(SymbolError::StrtabOffset { index: 1, offset: 1000 })
        ));
    }

    #[test]
    fn test_new_rejects_unsorted_names() {
        let (symtab, strtab) = encode(&[("zeta", 0x30), ("alpha", 0x10), ("mid", 0x20)]);
        assert!(matches!(
            LinkedTable::new(&symtab, &strtab),
            Err(SymbolError::Unsorted { index: 1 })
        ));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let (symtab, strtab) = encode(&[("abort", 0x100), ("free", 0x200), ("free", 0x300)]);
        assert!(matches!(
            LinkedTable::new(&symtab, &strtab),
            Err(SymbolError::Unsorted { index: 2 })
        ));
    }

    #[test]
    fn test_new_rejects_unterminated_name() {
        let (symtab, mut strtab) = encode(&ENTRIES);
        strtab.pop();
        assert!(matches!(
            LinkedTable::new(&symtab, &strtab),
            Err(SymbolError::UnterminatedString { index: 4 })
        ));
    }
}
