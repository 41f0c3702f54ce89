//! ez-exports: reduce a firmware image's symbol table to its export table.
//!
//! Reads the raw `.strtab` and `.symtab` sections of a linked ELF32 image
//! plus one or more allow-lists, and writes the compact sorted sections next
//! to the inputs with the extension `.exports`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use ez_runner::logging;
use ez_symbols::exports::{self, AllowList};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ez-exports")]
#[command(about = "Generate the compact export symbol table for ez-clang firmware", long_about = None)]
#[command(version)]
struct Cli {
    /// Raw .strtab section.
    strtab: PathBuf,

    /// Raw .symtab section.
    symtab: PathBuf,

    /// Allow-list files, one symbol name per line.
    #[arg(required = true)]
    allow: Vec<PathBuf>,

    /// Also log dropped symbols and duplicates.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Write the exported symbols, one `address   name` line each.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let strtab = read(&cli.strtab)?;
    let symtab = read(&cli.symtab)?;

    let stats = exports::check_strtab(&strtab)?;
    info!(strings = stats.strings, "strtab ok");
    for name in &stats.duplicates {
        warn!("duplicate string in strtab: {}", name);
    }

    let mut allow = AllowList::new();
    for path in &cli.allow {
        let count = allow.add_file(path)?;
        info!(names = count, "read allow-list {}", path.display());
    }
    for name in allow.unconventional() {
        warn!("unconventional symbol name in allow-list: {:?}", name);
    }
    if allow.is_empty() {
        bail!("allow-lists contain no symbol names");
    }

    let (image, report) = exports::export(&symtab, &strtab, &allow)?;
    for name in &report.dropped {
        debug!("not exported: {}", name);
    }
    for name in &report.duplicates {
        warn!("duplicate symbol, keeping first occurrence: {}", name);
    }
    info!(
        input = report.symbols_in,
        exported = report.symbols_out,
        "symbol table filtered"
    );

    let strtab_out = cli.strtab.with_extension("exports");
    let symtab_out = cli.symtab.with_extension("exports");
    image.write(&symtab_out, &strtab_out)?;
    info!("wrote {}", strtab_out.display());
    info!("wrote {}", symtab_out.display());

    if let Some(log) = &cli.log {
        std::fs::write(log, image.listing())
            .with_context(|| format!("writing {}", log.display()))?;
        info!("wrote {}", log.display());
    }
    Ok(())
}
