//! Error types for ez-symbols.

use std::path::PathBuf;

use thiserror::Error;

use crate::builtin::BuiltinTable;

/// Errors that can occur during symbol resolution or table generation.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// A name matched a builtin routing prefix but no entry in that table.
    ///
    /// Firmware and host disagree about the builtin set; this is never a
    /// protocol-level failure.
    #[error("Builtin {table} not found: {name}")]
    BuiltinNotFound {
        /// Table selected by the prefix.
        table: BuiltinTable,
        /// Requested name.
        name: String,
    },

    /// A symbol table's size is not a whole number of entries.
    #[error("symtab invalid or contains padding: {size} bytes is not a multiple of {entry_size}")]
    SymtabPadding {
        /// Section size.
        size: usize,
        /// Entry size for the format.
        entry_size: usize,
    },

    /// A symbol's name offset points outside the string table.
    #[error("Invalid strtab offset in symtab entry {index} (out of range: {offset})")]
    StrtabOffset {
        /// Entry index.
        index: usize,
        /// Offending offset.
        offset: u32,
    },

    /// A symbol's name runs off the end of the string table.
    #[error("Unterminated string in symtab entry {index}")]
    UnterminatedString {
        /// Entry index.
        index: usize,
    },

    /// Entry names are not in strictly ascending byte order.
    ///
    /// Also reported for a name that repeats its predecessor.
    #[error("symtab entry {index} is out of order or duplicates the previous name")]
    Unsorted {
        /// First entry that is not greater than its predecessor.
        index: usize,
    },

    /// The string table does not end with a NUL.
    #[error("strtab contains unterminated string")]
    StrtabUnterminated,

    /// A symbol name cannot be stored in a C-string table.
    #[error("Invalid symbol name {name:?}: {reason}")]
    InvalidName {
        /// Offending name (lossy).
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// File I/O failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl SymbolError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SymbolError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a firmware/host mismatch rather than bad input data.
    pub fn is_configuration_mismatch(&self) -> bool {
        matches!(self, SymbolError::BuiltinNotFound { .. })
    }
}
