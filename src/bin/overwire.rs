//! Interactive debug console for the overlay control channel.
//!
//! Brings the renderer up, then forwards stdin lines to it as text
//! messages. Useful for poking at a renderer without a telemetry host.

use anyhow::Result;
use clap::Parser;
use overwire::config::ConfigStore;
use overwire::{AlwaysActive, OverlayHost};
use serde_json::json;
use std::io::{self, BufRead};
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "overwire")]
#[command(version)]
#[command(about = "Debug console for the overlay control channel", long_about = None)]
struct Cli {
    /// Renderer address to connect to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Renderer port to connect to (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// JSON config file merged over the built-in defaults
    #[arg(long, env = "OVERWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging for this crate
    #[arg(long)]
    debug: bool,

    /// Extra arguments passed to the renderer when it is launched
    #[arg(trailing_var_arg = true)]
    renderer_args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter_directives = if cli.debug {
        "info,overwire=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let mut store = match cli.config.as_deref() {
        Some(path) => ConfigStore::load(path),
        None => ConfigStore::with_defaults(),
    };
    if let Some(host) = &cli.host {
        store.set("server.address", json!(host));
    }
    if let Some(port) = cli.port {
        store.set("server.port", json!(port));
    }

    let host = OverlayHost::from_config(&store, Box::new(AlwaysActive), cli.renderer_args.clone())?;
    if let Err(err) = host.start() {
        eprintln!("overlay unavailable, will keep retrying per message: {err}");
    }

    println!("overwire console: type text to display, 'exit' to quit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if let Err(err) = host
            .overlay()
            .send_message("debug", line, "red", 100, 100, None, None)
        {
            eprintln!("send failed: {err}");
        }
    }

    host.stop();
    Ok(())
}
