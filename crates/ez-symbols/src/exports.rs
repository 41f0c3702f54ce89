//! Export table generation.
//!
//! Turns a linked firmware image's full ELF32 symbol and string tables plus
//! an export allow-list into the compact, sorted [`LinkedTable`] sections the
//! firmware embeds. Runs once per firmware build, never on the device.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::SymbolError;
use crate::linked::{LinkedTable, ENTRY_SIZE};

/// Size of an `Elf32_Sym` entry.
pub const ELF32_SYM_SIZE: usize = 16;

/// One entry of an ELF32 `.symtab` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfSymbol {
    /// Offset of the name in `.strtab`.
    pub name_offset: u32,
    /// Symbol value (address).
    pub value: u32,
    /// Symbol size.
    pub size: u32,
    /// Type and binding.
    pub info: u8,
    /// Visibility.
    pub other: u8,
    /// Section index.
    pub shndx: u16,
}

impl ElfSymbol {
    fn decode(raw: &[u8]) -> Self {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        ElfSymbol {
            name_offset: word(0),
            value: word(4),
            size: word(8),
            info: raw[12],
            other: raw[13],
            shndx: u16::from_le_bytes([raw[14], raw[15]]),
        }
    }
}

// ============================================================================
// Compact Image
// ============================================================================

/// Owned compact symtab/strtab sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolImage {
    symtab: Vec<u8>,
    strtab: Vec<u8>,
}

impl SymbolImage {
    /// Build an image from (name, address) pairs in any order.
    ///
    /// Names are sorted byte-exactly; for duplicate names the first
    /// occurrence wins.
    pub fn from_symbols<I, N>(symbols: I) -> Result<Self, SymbolError>
    where
        I: IntoIterator<Item = (N, u32)>,
        N: AsRef<[u8]>,
    {
        let entries = symbols
            .into_iter()
            .map(|(name, addr)| (name.as_ref().to_vec(), addr))
            .collect();
        let (image, duplicates) = Self::build(entries)?;
        for name in &duplicates {
            log::warn!("Duplicate symbol '{}' dropped", name);
        }
        Ok(image)
    }

    fn build(mut entries: Vec<(Vec<u8>, u32)>) -> Result<(Self, Vec<String>), SymbolError> {
        for (name, _) in &entries {
            if name.is_empty() {
                return Err(SymbolError::InvalidName {
                    name: String::new(),
                    reason: "empty name",
                });
            }
            if name.contains(&0) {
                return Err(SymbolError::InvalidName {
                    name: String::from_utf8_lossy(name).to_string(),
                    reason: "contains NUL",
                });
            }
        }

        // Stable sort keeps the first occurrence ahead of its duplicates.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let duplicates: Vec<String> = entries
            .windows(2)
            .filter(|w| w[0].0 == w[1].0)
            .map(|w| String::from_utf8_lossy(&w[1].0).to_string())
            .collect();
        entries.dedup_by(|later, earlier| later.0 == earlier.0);

        let mut symtab = Vec::with_capacity(entries.len() * ENTRY_SIZE);
        // By convention, strtab starts with a NUL.
        let mut strtab = vec![0u8];
        for (name, addr) in &entries {
            symtab.extend_from_slice(&(strtab.len() as u32).to_le_bytes());
            symtab.extend_from_slice(&addr.to_le_bytes());
            strtab.extend_from_slice(name);
            strtab.push(0);
        }

        Ok((SymbolImage { symtab, strtab }, duplicates))
    }

    /// Adopt existing compact sections after validating them.
    pub fn from_sections(symtab: Vec<u8>, strtab: Vec<u8>) -> Result<Self, SymbolError> {
        LinkedTable::new(&symtab, &strtab)?;
        Ok(SymbolImage { symtab, strtab })
    }

    /// Load compact sections from disk.
    pub fn load(symtab_path: &Path, strtab_path: &Path) -> Result<Self, SymbolError> {
        let symtab = std::fs::read(symtab_path).map_err(|e| SymbolError::io(symtab_path, e))?;
        let strtab = std::fs::read(strtab_path).map_err(|e| SymbolError::io(strtab_path, e))?;
        Self::from_sections(symtab, strtab)
    }

    /// Write compact sections to disk.
    pub fn write(&self, symtab_path: &Path, strtab_path: &Path) -> Result<(), SymbolError> {
        std::fs::write(symtab_path, &self.symtab).map_err(|e| SymbolError::io(symtab_path, e))?;
        std::fs::write(strtab_path, &self.strtab).map_err(|e| SymbolError::io(strtab_path, e))?;
        Ok(())
    }

    /// View as a searchable table.
    pub fn table(&self) -> LinkedTable<'_> {
        LinkedTable::new_unchecked(&self.symtab, &self.strtab)
    }

    /// Raw symtab bytes.
    pub fn symtab(&self) -> &[u8] {
        &self.symtab
    }

    /// Raw strtab bytes.
    pub fn strtab(&self) -> &[u8] {
        &self.strtab
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symtab.len() / ENTRY_SIZE
    }

    /// Whether the image has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symtab.is_empty()
    }

    /// One `address   name` line per symbol, as written to the export log.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for sym in self.table().iter() {
            let _ = writeln!(out, "{:08x}   {}", sym.address, sym.name_lossy());
        }
        out
    }
}

// ============================================================================
// ELF Input
// ============================================================================

/// Summary of a validated `.strtab` section.
#[derive(Debug, Clone, Default)]
pub struct StrtabStats {
    /// Number of NUL-terminated strings.
    pub strings: usize,
    /// Strings that occur more than once.
    pub duplicates: Vec<String>,
}

/// Validate a `.strtab` section.
pub fn check_strtab(strtab: &[u8]) -> Result<StrtabStats, SymbolError> {
    if strtab.last().is_some_and(|&b| b != 0) {
        return Err(SymbolError::StrtabUnterminated);
    }

    let mut strings: Vec<&[u8]> = strtab.split(|&b| b == 0).collect();
    // split yields a trailing empty piece after the final NUL
    strings.pop();
    let count = strings.len();

    strings.sort();
    let mut duplicates: Vec<String> = strings
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| String::from_utf8_lossy(w[1]).to_string())
        .collect();
    duplicates.dedup();

    Ok(StrtabStats {
        strings: count,
        duplicates,
    })
}

/// Parse a `.symtab` section, checking every name against `strtab`.
pub fn parse_symtab(symtab: &[u8], strtab: &[u8]) -> Result<Vec<ElfSymbol>, SymbolError> {
    if symtab.len() % ELF32_SYM_SIZE != 0 {
        return Err(SymbolError::SymtabPadding {
            size: symtab.len(),
            entry_size: ELF32_SYM_SIZE,
        });
    }

    let mut symbols = Vec::with_capacity(symtab.len() / ELF32_SYM_SIZE);
    for (index, raw) in symtab.chunks_exact(ELF32_SYM_SIZE).enumerate() {
        let sym = ElfSymbol::decode(raw);
        let start = sym.name_offset as usize;
        if start >= strtab.len() {
            return Err(SymbolError::StrtabOffset {
                index,
                offset: sym.name_offset,
            });
        }
        if start != 0 && strtab[start - 1] != 0 {
            log::debug!("strtab offset in symtab entry {} points into the middle of a name", index);
        }
        if !strtab[start..].contains(&0) {
            return Err(SymbolError::UnterminatedString { index });
        }
        symbols.push(sym);
    }

    Ok(symbols)
}

fn name_at(strtab: &[u8], offset: u32) -> &[u8] {
    let rest = &strtab[offset as usize..];
    let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    &rest[..len]
}

// ============================================================================
// Allow-List
// ============================================================================

/// Whether `name` looks like a C identifier-ish linker symbol.
pub fn is_conventional_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '$') => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

/// Names allowed into the export table.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    names: BTreeSet<Vec<u8>>,
    unconventional: Vec<String>,
}

impl AllowList {
    /// Create an empty allow-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one name per line; blank lines are skipped.
    ///
    /// Returns the number of names read. Unconventional names are kept but
    /// remembered for reporting.
    pub fn add_text(&mut self, text: &str) -> usize {
        let mut count = 0;
        for line in text.lines() {
            let name = line.trim_end_matches('\r');
            if name.is_empty() {
                continue;
            }
            if !is_conventional_name(name) {
                self.unconventional.push(name.to_string());
            }
            self.names.insert(name.as_bytes().to_vec());
            count += 1;
        }
        count
    }

    /// Add names from a file.
    pub fn add_file(&mut self, path: &Path) -> Result<usize, SymbolError> {
        let text = std::fs::read_to_string(path).map_err(|e| SymbolError::io(path, e))?;
        Ok(self.add_text(&text))
    }

    /// Whether `name` may be exported.
    pub fn contains(&self, name: &[u8]) -> bool {
        self.names.contains(name)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names that do not look like linker symbols.
    pub fn unconventional(&self) -> &[String] {
        &self.unconventional
    }
}

// ============================================================================
// Export
// ============================================================================

/// What an export run did.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Entries in the input symtab.
    pub symbols_in: usize,
    /// Entries in the output table.
    pub symbols_out: usize,
    /// Named input symbols not on the allow-list.
    pub dropped: Vec<String>,
    /// Allowed names that occurred more than once; first occurrence kept.
    pub duplicates: Vec<String>,
}

/// Filter, sort, deduplicate and re-encode an ELF symbol table.
pub fn export(
    symtab: &[u8],
    strtab: &[u8],
    allow: &AllowList,
) -> Result<(SymbolImage, ExportReport), SymbolError> {
    let symbols = parse_symtab(symtab, strtab)?;

    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for sym in &symbols {
        if sym.name_offset == 0 {
            continue;
        }
        let name = name_at(strtab, sym.name_offset);
        if name.is_empty() {
            continue;
        }
        if allow.contains(name) {
            kept.push((name.to_vec(), sym.value));
        } else {
            dropped.push(String::from_utf8_lossy(name).to_string());
        }
    }

    let (image, duplicates) = SymbolImage::build(kept)?;
    let report = ExportReport {
        symbols_in: symbols.len(),
        symbols_out: image.len(),
        dropped,
        duplicates,
    };
    Ok((image, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build ELF32 sections for the given (name, value) pairs.
    fn elf_sections(entries: &[(&str, u32)]) -> (Vec<u8>, Vec<u8>) {
        let mut symtab = vec![0u8; ELF32_SYM_SIZE]; // null symbol
        let mut strtab = vec![0u8];
        for (name, value) in entries {
            let offset = strtab.len() as u32;
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
            symtab.extend_from_slice(&offset.to_le_bytes());
            symtab.extend_from_slice(&value.to_le_bytes());
            symtab.extend_from_slice(&4u32.to_le_bytes());
            symtab.extend_from_slice(&[0x12, 0, 1, 0]);
        }
        (symtab, strtab)
    }

    #[test]
    fn test_from_symbols_sorts_and_dedups() {
        let image = SymbolImage::from_symbols([("b", 2u32), ("a", 1), ("b", 3), ("_c", 4)])
            .expect("valid symbols");
        let table = image.table();
        let names: Vec<_> = table.iter().map(|s| s.name_lossy().to_string()).collect();
        assert_eq!(names, vec!["_c", "a", "b"]);
        assert_eq!(table.lookup(b"b"), 2);
        assert_eq!(image.strtab()[0], 0);
    }

    #[test]
    fn test_from_symbols_rejects_bad_names() {
        assert!(matches!(
            SymbolImage::from_symbols([("", 1u32)]),
            Err(SymbolError::InvalidName { .. })
        ));
        assert!(matches!(
            SymbolImage::from_symbols([(b"a\0b".as_slice(), 1u32)]),
            Err(SymbolError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_from_sections_validates() {
        let image = SymbolImage::from_symbols([("x", 1u32)]).expect("valid symbols");
        let again = SymbolImage::from_sections(image.symtab().to_vec(), image.strtab().to_vec())
            .expect("valid sections");
        assert_eq!(again, image);

        assert!(SymbolImage::from_sections(vec![1, 2, 3], vec![0]).is_err());
    }

    #[test]
    fn test_from_sections_rejects_unsorted() {
        let image = SymbolImage::from_symbols([("alpha", 0x10u32), ("zeta", 0x30)])
            .expect("valid symbols");
        let mut symtab = image.symtab().to_vec();
        let (first, second) = symtab.split_at_mut(ENTRY_SIZE);
        first.swap_with_slice(&mut second[..ENTRY_SIZE]);

        assert!(matches!(
            SymbolImage::from_sections(symtab, image.strtab().to_vec()),
            Err(SymbolError::Unsorted { index: 1 })
        ));
    }

    #[test]
    fn test_check_strtab() {
        let stats = check_strtab(b"\0foo\0bar\0foo\0").expect("valid strtab");
        assert_eq!(stats.strings, 4);
        assert_eq!(stats.duplicates, vec!["foo".to_string()]);

        assert!(matches!(
            check_strtab(b"\0foo"),
            Err(SymbolError::StrtabUnterminated)
        ));
        assert_eq!(check_strtab(b"").expect("empty strtab").strings, 0);
    }

    #[test]
    fn test_parse_symtab_errors() {
        let (symtab, strtab) = elf_sections(&[("main", 0x100)]);
        assert_eq!(parse_symtab(&symtab, &strtab).unwrap().len(), 2);

        assert!(matches!(
            parse_symtab(&symtab[..20], &strtab),
            Err(SymbolError::SymtabPadding { .. })
        ));

        let mut bad = symtab.clone();
        bad[16..20].copy_from_slice(&500u32.to_le_bytes());
        assert!(matches!(
            parse_symtab(&bad, &strtab),
            Err(SymbolError::StrtabOffset { index: 1, .. })
        ));
    }

    #[test]
    fn test_allow_list() {
        let mut allow = AllowList::new();
        let count = allow.add_text("printf\n\nmalloc\r\n9bad\n");
        assert_eq!(count, 3);
        assert!(allow.contains(b"printf"));
        assert!(allow.contains(b"malloc"));
        assert!(allow.contains(b"9bad"));
        assert_eq!(allow.unconventional(), &["9bad".to_string()]);
    }

    #[test]
    fn test_conventional_names() {
        assert!(is_conventional_name("_start"));
        assert!(is_conventional_name("$d.1"));
        assert!(is_conventional_name("memcpy"));
        assert!(!is_conventional_name("1abc"));
        assert!(!is_conventional_name("a-b"));
        assert!(!is_conventional_name(""));
    }

    #[test]
    fn test_export_filters_sorts_and_reencodes() {
        let (symtab, strtab) = elf_sections(&[
            ("zeta", 0x30),
            ("internal", 0x99),
            ("alpha", 0x10),
            ("mid", 0x20),
            ("alpha", 0x11),
        ]);
        let mut allow = AllowList::new();
        allow.add_text("alpha\nmid\nzeta\nnot_in_image\n");

        let (image, report) = export(&symtab, &strtab, &allow).expect("export succeeds");
        assert_eq!(report.symbols_in, 6);
        assert_eq!(report.symbols_out, 3);
        assert_eq!(report.dropped, vec!["internal".to_string()]);
        assert_eq!(report.duplicates, vec!["alpha".to_string()]);

        let table = image.table();
        assert_eq!(table.lookup(b"alpha"), 0x10);
        assert_eq!(table.lookup(b"mid"), 0x20);
        assert_eq!(table.lookup(b"zeta"), 0x30);
        assert_eq!(table.lookup(b"internal"), 0);
        assert_eq!(image.symtab().len(), 3 * ENTRY_SIZE);
        assert_eq!(image.strtab(), b"\0alpha\0mid\0zeta\0");
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let symtab_path = dir.path().join("firmware.symtab.exports");
        let strtab_path = dir.path().join("firmware.strtab.exports");

        let image = SymbolImage::from_symbols([("printf", 0x500u32), ("abort", 0x100)])
            .expect("valid symbols");
        image.write(&symtab_path, &strtab_path).expect("write");

        let loaded = SymbolImage::load(&symtab_path, &strtab_path).expect("load");
        assert_eq!(loaded, image);
        assert_eq!(loaded.table().lookup(b"printf"), 0x500);

        let missing = dir.path().join("missing");
        assert!(matches!(
            SymbolImage::load(&missing, &strtab_path),
            Err(SymbolError::Io { .. })
        ));
    }

    #[test]
    fn test_listing() {
        let image = SymbolImage::from_symbols([("main", 0x2001u32)]).expect("valid symbols");
        assert_eq!(image.listing(), "00002001   main\n");
    }
}
