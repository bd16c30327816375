//! motelog command-line interface.
//!
//! `motelog scan` lists advertising motes; `motelog run` connects to
//! every matching mote and logs its telemetry to rotating per-device CSV
//! files until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use motelog_core::Transport;
use motelog_core::ble::BleTransport;
use motelog_core::fleet::{FleetConfig, FleetController};

mod config;

use config::{Config, RunOverrides};

#[derive(Parser)]
#[command(name = "motelog")]
#[command(author, version, about = "Telemetry logger for BLE sensor motes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for advertising motes and list them
    Scan {
        /// Scan window in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// List every advertising device, ignoring the name filter
        #[arg(long)]
        all: bool,
    },

    /// Connect to every matching mote and log telemetry until interrupted
    Run {
        /// Substring an advertised name must contain
        #[arg(short, long)]
        name: Option<String>,

        /// Maximum number of concurrent connections
        #[arg(long)]
        max: Option<usize>,

        /// Stop, rescan, and reconnect the whole fleet every N minutes
        #[arg(long)]
        rescan: Option<u64>,

        /// Directory for per-device log files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Connect attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { timeout, all } => cmd_scan(&config, timeout, all).await,
        Commands::Run {
            name,
            max,
            rescan,
            out,
            timeout,
        } => {
            let fleet_config = config.fleet_config(RunOverrides {
                name_filter: name,
                max_connections: max,
                rescan_minutes: rescan,
                log_dir: out,
                timeout_secs: timeout,
            })?;
            cmd_run(fleet_config).await
        }
    }
}

/// One discovery pass, printed as a name / address / RSSI table.
async fn cmd_scan(config: &Config, timeout: u64, all: bool) -> Result<()> {
    let transport = BleTransport::new()
        .await
        .context("failed to open Bluetooth adapter")?;

    let advertisements = transport
        .discover(Duration::from_secs(timeout))
        .await
        .context("scan failed")?;

    let filter = if all { "" } else { config.name_filter.as_str() };
    let mut shown = 0;
    let mut seen = std::collections::HashSet::new();
    println!("{:<24} {:<28} {}", "NAME", "ADDRESS", "RSSI");
    for advert in advertisements {
        if !advert.identity.name.contains(filter) {
            continue;
        }
        if !seen.insert(advert.identity.address.clone()) {
            continue;
        }
        let name = if advert.identity.name.is_empty() {
            "(unnamed)"
        } else {
            advert.identity.name.as_str()
        };
        let rssi = advert
            .rssi
            .map_or_else(|| "n/a".to_string(), |rssi| format!("{rssi} dBm"));
        println!("{:<24} {:<28} {}", name, advert.identity.address, rssi);
        shown += 1;
    }

    if shown == 0 {
        println!("No devices found. Try --all or a longer --timeout.");
    }
    Ok(())
}

/// Discover, connect, and log until Ctrl-C.
async fn cmd_run(config: FleetConfig) -> Result<()> {
    let transport = Arc::new(
        BleTransport::new()
            .await
            .context("failed to open Bluetooth adapter")?,
    );
    let fleet = FleetController::new(transport, config);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    // A failed startup (e.g. no devices discovered) exits non-zero;
    // cancellation-driven shutdown returns cleanly.
    fleet.run(shutdown).await?;
    Ok(())
}
