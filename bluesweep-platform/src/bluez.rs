//! Classic discovery through bluetoothd (BlueZ), via bluer
//!
//! Device ids are adapter addresses rendered `AA:BB:CC:DD:EE:FF`.

use std::pin::Pin;

use bluer::{Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty, Session};
use futures::stream::SelectAll;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bluesweep_core::platform::{
    DeviceInfo, DeviceInfoUpdate, DeviceWatcher, PairedDevice, PairedDeviceQuery, PlatformError,
    WatcherEvent, WatcherStatus,
};

const WATCHER_BUFFER: usize = 64;

type ChangeStream = Pin<Box<dyn Stream<Item = (Address, DeviceEvent)> + Send>>;

async fn default_adapter() -> Result<Adapter, PlatformError> {
    let session = Session::new()
        .await
        .map_err(|e| PlatformError::backend("connecting to bluetoothd", e))?;
    session
        .default_adapter()
        .await
        .map_err(|e| PlatformError::backend("opening default adapter", e))
}

/// Real name only; bluetoothd's alias falls back to the address
async fn device_name(device: &Device) -> String {
    match device.name().await {
        Ok(Some(name)) => name,
        _ => String::new(),
    }
}

/// Devices bluetoothd has a pairing for
pub struct BluezPairedQuery;

#[async_trait::async_trait]
impl PairedDeviceQuery for BluezPairedQuery {
    async fn find_paired(&self) -> Result<Vec<PairedDevice>, PlatformError> {
        let adapter = default_adapter().await?;
        let addresses = adapter
            .device_addresses()
            .await
            .map_err(|e| PlatformError::backend("listing known devices", e))?;

        let mut paired = Vec::new();
        for address in addresses {
            let device = adapter
                .device(address)
                .map_err(|e| PlatformError::backend("opening device", e))?;
            match device.is_paired().await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!(%address, error = %e, "could not read pairing state");
                    continue;
                }
            }
            paired.push(PairedDevice {
                id: address.to_string(),
                name: device_name(&device).await,
            });
        }
        debug!(count = paired.len(), "paired devices found");
        Ok(paired)
    }
}

/// Live enumeration: an adapter discovery session plus a property stream
/// per discovered device.
pub struct BluezWatcher {
    status: WatcherStatus,
    task: Option<JoinHandle<()>>,
}

impl BluezWatcher {
    pub fn new() -> Self {
        Self {
            status: WatcherStatus::Created,
            task: None,
        }
    }
}

impl BluezWatcher {
    /// A watch task that ended on its own leaves the watcher restartable.
    fn ensure_startable(&self) -> Result<(), PlatformError> {
        let status = self.status();
        if status.can_stop() {
            return Err(PlatformError::InvalidState {
                expected: "created or stopped",
                actual: format!("{status:?}"),
            });
        }
        Ok(())
    }
}

impl Default for BluezWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceWatcher for BluezWatcher {
    fn status(&self) -> WatcherStatus {
        match &self.task {
            Some(task) if task.is_finished() && self.status.can_stop() => WatcherStatus::Aborted,
            _ => self.status,
        }
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<WatcherEvent>, PlatformError> {
        self.ensure_startable()?;
        if let Some(finished) = self.task.take() {
            let _ = finished.await;
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(WATCHER_BUFFER);
        let task = tokio::spawn(watch(ready_tx, tx));

        match ready_rx.await {
            Ok(Ok(())) => {
                self.task = Some(task);
                self.status = WatcherStatus::Started;
                Ok(rx)
            }
            Ok(Err(e)) => {
                self.status = WatcherStatus::Aborted;
                Err(e)
            }
            Err(_) => {
                self.status = WatcherStatus::Aborted;
                Err(PlatformError::backend(
                    "starting device discovery",
                    "watcher task ended before discovery started",
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        self.status = WatcherStatus::Stopping;
        // Dropping the discovery stream ends the bluetoothd discovery session.
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.status = WatcherStatus::Stopped;
        Ok(())
    }
}

async fn watch(
    ready: oneshot::Sender<Result<(), PlatformError>>,
    tx: mpsc::Sender<WatcherEvent>,
) {
    let adapter = match default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let discovery = match adapter.discover_devices().await {
        Ok(discovery) => discovery,
        Err(e) => {
            let _ = ready.send(Err(PlatformError::backend("starting device discovery", e)));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut discovery = Box::pin(discovery);
    let mut changes: SelectAll<ChangeStream> = SelectAll::new();

    loop {
        tokio::select! {
            Some(event) = discovery.next() => {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                let device = match adapter.device(address) {
                    Ok(device) => device,
                    Err(e) => {
                        debug!(%address, error = %e, "could not open discovered device");
                        continue;
                    }
                };
                let info = DeviceInfo {
                    id: address.to_string(),
                    name: device_name(&device).await,
                    is_connected: device.is_connected().await.ok(),
                };
                if tx.send(WatcherEvent::Added(info)).await.is_err() {
                    return;
                }
                match device.events().await {
                    Ok(events) => changes.push(Box::pin(events.map(move |event| (address, event)))),
                    Err(e) => debug!(%address, error = %e, "no property stream for device"),
                }
            }
            Some((address, event)) = changes.next() => {
                let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event else {
                    continue;
                };
                let update = DeviceInfoUpdate {
                    id: address.to_string(),
                    is_connected: Some(connected),
                };
                if tx.send(WatcherEvent::Updated(update)).await.is_err() {
                    return;
                }
            }
            else => break,
        }
    }

    warn!("bluetoothd discovery stream ended");
    let _ = tx.send(WatcherEvent::Stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_with(task: JoinHandle<()>) -> BluezWatcher {
        BluezWatcher {
            status: WatcherStatus::Started,
            task: Some(task),
        }
    }

    #[tokio::test]
    async fn finished_watch_task_allows_restart() {
        let watcher = started_with(tokio::spawn(async {}));
        while watcher.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tokio::task::yield_now().await;
        }

        assert_eq!(watcher.status(), WatcherStatus::Aborted);
        assert!(watcher.ensure_startable().is_ok());
    }

    #[tokio::test]
    async fn running_watch_task_blocks_restart() {
        let watcher = started_with(tokio::spawn(std::future::pending()));
        assert!(matches!(
            watcher.ensure_startable(),
            Err(PlatformError::InvalidState { .. })
        ));
    }
}
