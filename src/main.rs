//! hkisy-node binary
//!
//! Reads framework events as JSON lines on stdin, writes framework calls as
//! JSON lines on stdout and logs to stderr.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use hkisy_node::framework::{read_events, StdioFramework};
use hkisy_node::utils::{init_logging_from_config, install_panic_hook, wait_for_shutdown_signal};
use hkisy_node::{NodeServer, NodeServerConfig};

#[derive(Parser, Debug)]
#[command(name = "hkisy-node")]
#[command(about = "HomeKit bridge node server", long_about = None)]
struct Args {
    /// Node server configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the bridge binary and its configuration
    #[arg(long)]
    bin_dir: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "hkisy_node=trace" (RUST_LOG takes precedence)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => NodeServerConfig::default(),
    };
    if let Some(bin_dir) = args.bin_dir {
        config.bin_dir = bin_dir;
    }

    init_logging_from_config(config.logging.as_ref(), args.log_filter.as_deref());
    install_panic_hook();

    info!("Starting hkisy-node {}", env!("CARGO_PKG_VERSION"));

    let framework = Arc::new(StdioFramework::stdout());
    let server = NodeServer::new(config, framework)?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), tx));

    server.run(rx, wait_for_shutdown_signal()).await;
    Ok(())
}
