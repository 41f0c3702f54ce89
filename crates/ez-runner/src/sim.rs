//! Device simulator configuration and serve loop.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use ez_device::{Device, DeviceConfig, Indicator};
use ez_symbols::{SymbolError, SymbolImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::tcp::accept_next;

/// Default simulator listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:10819";

// ============================================================================
// Error Types
// ============================================================================

/// Errors loading the simulator's inputs.
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading a file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`SimConfig`].
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The linked symbol table could not be loaded.
    #[error("failed to load symbols: {0}")]
    Symbols(#[from] SymbolError),
}

// ============================================================================
// Configuration
// ============================================================================

/// Compact linked table sections, as written by `ez-exports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFiles {
    /// Compact symtab section.
    pub symtab: PathBuf,
    /// Compact strtab section.
    pub strtab: PathBuf,
}

/// Simulator configuration file.
///
/// ```yaml
/// listen: 127.0.0.1:10819
/// sessions: 1
/// symbols:
///   symtab: firmware.symtab.exports
///   strtab: firmware.strtab.exports
/// device:
///   arena_capacity: 1024
///   code_buffer: { base: 0x20000000, size: 0x800 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Address to accept host connections on.
    pub listen: String,
    /// Stop after this many sessions.
    pub sessions: Option<usize>,
    /// Linked symbol table; empty when absent.
    pub symbols: Option<SymbolFiles>,
    /// Device parameters.
    pub device: DeviceConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            listen: DEFAULT_LISTEN.to_string(),
            sessions: None,
            symbols: None,
            device: DeviceConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, SimError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a configuration file.
    ///
    /// Relative symbol paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text)?;
        if let (Some(files), Some(dir)) = (config.symbols.as_mut(), path.parent()) {
            files.symtab = dir.join(&files.symtab);
            files.strtab = dir.join(&files.strtab);
        }
        Ok(config)
    }

    /// Load the linked table, or an empty one when none is configured.
    pub fn load_symbols(&self) -> Result<SymbolImage, SimError> {
        match &self.symbols {
            Some(files) => Ok(SymbolImage::load(&files.symtab, &files.strtab)?),
            None => Ok(SymbolImage::default()),
        }
    }
}

// ============================================================================
// Serve Loop
// ============================================================================

/// Serve one session per accepted connection until `shutdown` is set or
/// `sessions` connections have been served.
///
/// Returns the status code of every session.
pub fn serve<I: Indicator>(
    device: &mut Device<'_, I>,
    listener: &TcpListener,
    shutdown: &AtomicBool,
    sessions: Option<usize>,
) -> Vec<u8> {
    let links = std::iter::from_fn(|| accept_next(listener, shutdown))
        .take(sessions.unwrap_or(usize::MAX))
        .inspect(|link| info!(peer = %link.peer(), "serving session"));
    device.run(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::from_yaml("{}").expect("empty mapping");
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.listen, "127.0.0.1:10819");
        assert!(config.load_symbols().expect("empty table").is_empty());
    }

    #[test]
    fn test_load_resolves_symbol_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let image = SymbolImage::from_symbols([("printf", 0x100u32)]).expect("valid symbols");
        image
            .write(
                &dir.path().join("fw.symtab.exports"),
                &dir.path().join("fw.strtab.exports"),
            )
            .expect("write sections");

        let config_path = dir.path().join("sim.yaml");
        std::fs::write(
            &config_path,
            "listen: 127.0.0.1:0\n\
             sessions: 2\n\
             symbols:\n  symtab: fw.symtab.exports\n  strtab: fw.strtab.exports\n\
             device:\n  arena_capacity: 512\n",
        )
        .expect("write config");

        let config = SimConfig::load(&config_path).expect("valid config");
        assert_eq!(config.sessions, Some(2));
        assert_eq!(config.device.arena_capacity, 512);
        assert_eq!(config.device.version, "0.0.5");

        let loaded = config.load_symbols().expect("symbols load");
        assert_eq!(loaded.table().lookup(b"printf"), 0x100);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimConfig::load(Path::new("/nonexistent/sim.yaml")).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            SimConfig::from_yaml("device: [1, 2"),
            Err(SimError::Yaml(_))
        ));
    }
}
