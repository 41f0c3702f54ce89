//! ez-sim: a simulated ez-clang device served over TCP.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ez_device::{Device, LogIndicator};
use ez_runner::{logging, serve, SimConfig, SymbolFiles};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ez-sim")]
#[command(about = "Simulated ez-clang device served over TCP", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(short, long)]
    listen: Option<String>,

    /// Compact symtab section from ez-exports.
    #[arg(long, requires = "strtab")]
    symtab: Option<PathBuf>,

    /// Compact strtab section from ez-exports.
    #[arg(long, requires = "symtab")]
    strtab: Option<PathBuf>,

    /// Message arena size in bytes.
    #[arg(long)]
    arena_capacity: Option<usize>,

    /// Wait for the host's handshake before sending Setup.
    #[arg(long)]
    await_handshake: bool,

    /// Exit after serving this many sessions.
    #[arg(long)]
    sessions: Option<usize>,

    /// More logging (repeat for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let (Some(symtab), Some(strtab)) = (cli.symtab, cli.strtab) {
        config.symbols = Some(SymbolFiles { symtab, strtab });
    }
    if let Some(capacity) = cli.arena_capacity {
        config.device.arena_capacity = capacity;
    }
    if cli.await_handshake {
        config.device.await_handshake = true;
    }
    if cli.sessions.is_some() {
        config.sessions = cli.sessions;
    }

    let image = config.load_symbols()?;
    info!(symbols = image.len(), "linked symbol table loaded");

    let mut device = Device::with_indicator(
        config.device.clone(),
        image.table(),
        LogIndicator::default(),
    )
    .context("creating device")?;
    device.boot();

    let listener = TcpListener::bind(&config.listen)
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %listener.local_addr()?, "waiting for host connections");

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let codes = serve(&mut device, &listener, &shutdown, config.sessions);
    let failed = codes.iter().filter(|&&c| c != 0).count();
    info!(sessions = codes.len(), failed, "simulator stopped");
    Ok(())
}
