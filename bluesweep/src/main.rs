//! Bluetooth discovery tool
//!
//! Scans classic/paired and BLE devices at the same time and prints one
//! merged list.

mod presenter;

use std::process::ExitCode;
use std::time::Duration;

use bluesweep_core::{DEFAULT_SCAN_DURATION, ScanConfig, ScanController, ScanReport, SessionError};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::presenter::{ConsolePresenter, spawn_progress};

#[derive(Parser)]
#[command(name = "bluesweep")]
#[command(about = "Discover nearby Bluetooth devices, classic and BLE, as one list")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan session and list what was found
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = DEFAULT_SCAN_DURATION.as_secs())]
        duration: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Leave classic/paired discovery out
        #[arg(long)]
        no_classic: bool,
        /// Leave BLE advertisement discovery out
        #[arg(long)]
        no_ble: bool,
    },
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "bluesweep=debug" } else { "bluesweep=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(default.parse()?))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Scan {
            duration,
            json,
            no_classic,
            no_ble,
        } => {
            let config = ScanConfig {
                duration: Duration::from_secs(duration),
                ..ScanConfig::default()
            };
            Ok(scan(config, json, no_classic, no_ble).await)
        }
    }
}

async fn scan(config: ScanConfig, json: bool, no_classic: bool, no_ble: bool) -> ExitCode {
    let (query, watcher) = if no_classic {
        bluesweep_platform::unsupported_classic("disabled with --no-classic")
    } else {
        bluesweep_platform::classic_backend()
    };
    let listener = if no_ble {
        bluesweep_platform::unsupported_ble("disabled with --no-ble")
    } else {
        bluesweep_platform::ble_backend()
    };

    let presenter = ConsolePresenter::new(json, config.duration);
    let controller = ScanController::with_platform(config, query, watcher, listener);

    let progress = (!json).then(|| spawn_progress(controller.store()));
    let result = controller.begin(&presenter).await;
    if let Some(progress) = progress {
        progress.abort();
    }

    ExitCode::from(exit_status(&result))
}

/// The presenter has already shown any failure, so it is not printed again.
fn exit_status(result: &Result<ScanReport, SessionError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
