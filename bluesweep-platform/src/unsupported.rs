//! Stand-in collaborator for a discovery channel this build cannot serve

use tokio::sync::mpsc;

use bluesweep_core::platform::{
    Advertisement, AdvertisementListener, DeviceWatcher, ListenerStatus, PairedDevice,
    PairedDeviceQuery, PlatformError, ScanningMode, WatcherEvent, WatcherStatus,
};

/// Fails every start with [`PlatformError::Unsupported`]. The session logs
/// that and carries on with the other channel.
#[derive(Debug, Clone)]
pub struct Unsupported {
    reason: String,
}

impl Unsupported {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> PlatformError {
        PlatformError::Unsupported(self.reason.clone())
    }
}

#[async_trait::async_trait]
impl PairedDeviceQuery for Unsupported {
    async fn find_paired(&self) -> Result<Vec<PairedDevice>, PlatformError> {
        Err(self.error())
    }
}

#[async_trait::async_trait]
impl DeviceWatcher for Unsupported {
    fn status(&self) -> WatcherStatus {
        WatcherStatus::Created
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<WatcherEvent>, PlatformError> {
        Err(self.error())
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::InvalidState {
            expected: "started",
            actual: "never started".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl AdvertisementListener for Unsupported {
    fn status(&self) -> ListenerStatus {
        ListenerStatus::Created
    }

    async fn start(
        &mut self,
        _mode: ScanningMode,
    ) -> Result<mpsc::Receiver<Advertisement>, PlatformError> {
        Err(self.error())
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::InvalidState {
            expected: "started",
            actual: "never started".to_string(),
        })
    }
}
