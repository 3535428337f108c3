//! Terminal presentation of a scan session

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bluesweep_core::{DeviceStore, Presenter, ScanReport, SessionFailure};
use tokio::task::JoinHandle;
use tracing::error;

pub struct ConsolePresenter {
    json: bool,
    duration: Duration,
}

impl ConsolePresenter {
    pub fn new(json: bool, duration: Duration) -> Self {
        Self { json, duration }
    }
}

impl Presenter for ConsolePresenter {
    fn scan_started(&self) {
        eprintln!(
            "Scanning for Bluetooth devices ({} seconds)...",
            self.duration.as_secs()
        );
    }

    fn show_report(&self, report: &ScanReport) {
        // ends the progress line
        eprintln!();
        if self.json {
            match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "could not serialize report"),
            }
            return;
        }

        println!("{}", report.summary());
        for device in report.devices() {
            println!("  {} ({}) {}", device.name, device.id, device.status);
        }
    }

    fn show_failure(&self, failure: &SessionFailure) {
        eprintln!("\nScan failed: {}", failure.message);
        eprintln!("{}", failure.guidance);
    }

    fn scan_finished(&self) {
        eprintln!("Scan complete.");
    }
}

/// Keep a running device count on stderr while the session scans
pub fn spawn_progress(store: Arc<DeviceStore>) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        let mut shown = 0;
        while changes.changed().await.is_ok() {
            let count = store.len().await;
            if count != shown {
                shown = count;
                eprint!("\r  {count} device(s) so far");
                let _ = std::io::stderr().flush();
            }
        }
    })
}
