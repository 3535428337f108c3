//! Bluesweep Core - merge engine for Bluetooth device discovery
//!
//! Two discovery channels run side by side for one bounded scan session:
//! classic enumeration (already-paired devices plus a live watcher) and
//! BLE advertisement listening. Both feed normalized observations into a
//! single [`DeviceStore`], which keeps one record per device in
//! first-discovery order.
//!
//! # Example
//!
//! ```ignore
//! use bluesweep_core::{ScanConfig, ScanController};
//!
//! let controller = ScanController::with_platform(
//!     ScanConfig::default(),
//!     Box::new(paired_query),
//!     Box::new(watcher),
//!     Box::new(listener),
//! );
//! let report = controller.begin(&presenter).await?;
//! println!("{}", report.summary());
//! ```

mod error;
mod intake;
pub mod platform;
mod record;
mod report;
mod session;
pub mod source;
mod store;

#[cfg(test)]
mod testing;

pub use error::{SessionError, SourceError, SourceKind};
pub use intake::{Intake, IntakeClosed, Observation, ObservationSink};
pub use platform::{PlatformError, ScanningMode};
pub use record::{DeviceRecord, PLACEHOLDER_NAME, is_placeholder, name_or_placeholder};
pub use report::{
    NO_DEVICES_MESSAGE, Presenter, ScanReport, SessionFailure, TROUBLESHOOTING_GUIDANCE,
};
pub use session::{
    DEFAULT_INTAKE_CAPACITY, DEFAULT_SCAN_DURATION, ScanConfig, ScanController, SessionState,
};
pub use store::DeviceStore;
