//! What a finished session hands to the presentation layer

use serde::Serialize;

use crate::record::DeviceRecord;

pub const NO_DEVICES_MESSAGE: &str =
    "No devices found. Check that Bluetooth is on and nearby devices are discoverable.";

pub const TROUBLESHOOTING_GUIDANCE: &str = "Make sure Bluetooth is turned on, that this \
    program is allowed to use it, and that nearby devices are powered on and in pairing or \
    discoverable mode. Then start a new scan.";

/// Finalized result of one scan session
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    count: usize,
    message: String,
    devices: Vec<DeviceRecord>,
}

impl ScanReport {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        let count = devices.len();
        let message = match count {
            0 => NO_DEVICES_MESSAGE.to_string(),
            n => format!("Found {n} Device(s)"),
        };
        Self {
            count,
            message,
            devices,
        }
    }

    /// Records in first-discovery order
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// "Found N Device(s)", or [`NO_DEVICES_MESSAGE`] for an empty scan
    pub fn summary(&self) -> &str {
        &self.message
    }
}

/// A session that could not finish. Only these reach the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    pub message: String,
    pub guidance: String,
}

impl SessionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            guidance: TROUBLESHOOTING_GUIDANCE.to_string(),
        }
    }
}

/// Display side of a scan session
pub trait Presenter: Send + Sync {
    fn scan_started(&self);

    fn show_report(&self, report: &ScanReport);

    fn show_failure(&self, failure: &SessionFailure);

    /// Always called last, success or not; back to the pre-scan state.
    fn scan_finished(&self);
}
