//! Bluesweep Platform
//!
//! Bluetooth stack backends for the discovery sources in `bluesweep-core`:
//! a btleplug advertisement listener, and classic/paired discovery through
//! BlueZ on Linux (the `bluez` feature).
//!
//! # Example
//!
//! ```ignore
//! use bluesweep_core::{ScanConfig, ScanController};
//!
//! let (query, watcher) = bluesweep_platform::classic_backend();
//! let listener = bluesweep_platform::ble_backend();
//! let controller = ScanController::with_platform(ScanConfig::default(), query, watcher, listener);
//! ```

pub mod ble;
#[cfg(all(target_os = "linux", feature = "bluez"))]
pub mod bluez;
mod unsupported;

pub use ble::BtleplugListener;
pub use unsupported::Unsupported;

use bluesweep_core::platform::{AdvertisementListener, DeviceWatcher, PairedDeviceQuery};

/// Paired-device query and enumeration watcher for this build
#[cfg(all(target_os = "linux", feature = "bluez"))]
pub fn classic_backend() -> (Box<dyn PairedDeviceQuery>, Box<dyn DeviceWatcher>) {
    (
        Box::new(bluez::BluezPairedQuery),
        Box::new(bluez::BluezWatcher::new()),
    )
}

/// Paired-device query and enumeration watcher for this build
#[cfg(not(all(target_os = "linux", feature = "bluez")))]
pub fn classic_backend() -> (Box<dyn PairedDeviceQuery>, Box<dyn DeviceWatcher>) {
    unsupported_classic("classic discovery needs BlueZ (Linux, `bluez` feature)")
}

pub fn unsupported_classic(
    reason: &str,
) -> (Box<dyn PairedDeviceQuery>, Box<dyn DeviceWatcher>) {
    let backend = Unsupported::new(reason);
    (Box::new(backend.clone()), Box::new(backend))
}

pub fn ble_backend() -> Box<dyn AdvertisementListener> {
    Box::new(BtleplugListener::new())
}

pub fn unsupported_ble(reason: &str) -> Box<dyn AdvertisementListener> {
    Box::new(Unsupported::new(reason))
}
