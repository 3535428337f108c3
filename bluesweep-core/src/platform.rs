//! Platform discovery collaborators
//!
//! These traits are the boundary to the operating system's Bluetooth
//! stack. Concrete implementations live in `bluesweep-platform`; the
//! discovery sources in this crate only see the traits.

use tokio::sync::mpsc;

/// Errors raised by a platform collaborator
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("not supported on this platform: {0}")]
    Unsupported(String),

    #[error("no Bluetooth adapter found")]
    AdapterNotFound,

    #[error("invalid state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PlatformError {
    pub fn backend(
        context: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            context,
            source: source.into(),
        }
    }
}

/// An already-paired device returned by the bulk query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    /// Platform-assigned endpoint identifier
    pub id: String,
    pub name: String,
}

/// A device reported by the enumeration watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    /// `None` when the platform did not report connectivity
    pub is_connected: Option<bool>,
}

/// Changed properties of a device the watcher already reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfoUpdate {
    pub id: String,
    /// `Some` only when connectivity is among the changed properties
    pub is_connected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEvent {
    Added(DeviceInfo),
    Updated(DeviceInfoUpdate),
    EnumerationCompleted,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherStatus {
    Created,
    Started,
    EnumerationCompleted,
    Stopping,
    Stopped,
    Aborted,
}

impl WatcherStatus {
    /// A stop request is only valid while the watcher is running
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Started | Self::EnumerationCompleted)
    }
}

/// One received advertisement packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised local name, possibly empty
    pub local_name: String,
    /// 48-bit hardware address
    pub address: u64,
    /// Received signal strength in dBm
    pub rssi: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanningMode {
    /// Solicit scan responses, which carries more device names
    #[default]
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Created,
    Started,
    Stopped,
    Aborted,
}

/// One-shot query for devices already paired with this host
#[async_trait::async_trait]
pub trait PairedDeviceQuery: Send + Sync {
    async fn find_paired(&self) -> Result<Vec<PairedDevice>, PlatformError>;
}

/// Long-lived classic device enumeration
#[async_trait::async_trait]
pub trait DeviceWatcher: Send {
    fn status(&self) -> WatcherStatus;

    /// Start enumerating; events arrive on the returned channel until the
    /// watcher stops.
    async fn start(&mut self) -> Result<mpsc::Receiver<WatcherEvent>, PlatformError>;

    async fn stop(&mut self) -> Result<(), PlatformError>;
}

/// Continuous BLE advertisement listener
#[async_trait::async_trait]
pub trait AdvertisementListener: Send {
    fn status(&self) -> ListenerStatus;

    /// Start listening; one [`Advertisement`] per received packet, no
    /// deduplication.
    async fn start(
        &mut self,
        mode: ScanningMode,
    ) -> Result<mpsc::Receiver<Advertisement>, PlatformError>;

    async fn stop(&mut self) -> Result<(), PlatformError>;
}
