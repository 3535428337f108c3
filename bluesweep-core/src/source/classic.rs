//! Classic and paired device discovery

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{DiscoverySource, Handler};
use crate::error::{SourceError, SourceKind};
use crate::intake::ObservationSink;
use crate::platform::{DeviceWatcher, PairedDeviceQuery, WatcherEvent};
use crate::record::name_or_placeholder;

pub const PAIRED: &str = "Paired";
pub const CONNECTED: &str = "Connected";
pub const AVAILABLE: &str = "Available";

/// Status for a watcher-reported device. Missing connectivity reads as
/// "Available".
pub fn connectivity_status(is_connected: Option<bool>) -> &'static str {
    if is_connected == Some(true) {
        CONNECTED
    } else {
        AVAILABLE
    }
}

/// Bulk paired-device query followed by a live enumeration watcher
pub struct ClassicSource {
    query: Box<dyn PairedDeviceQuery>,
    watcher: Box<dyn DeviceWatcher>,
    handler: Option<Handler>,
}

impl ClassicSource {
    pub fn new(query: Box<dyn PairedDeviceQuery>, watcher: Box<dyn DeviceWatcher>) -> Self {
        Self {
            query,
            watcher,
            handler: None,
        }
    }
}

#[async_trait::async_trait]
impl DiscoverySource for ClassicSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Classic
    }

    async fn start(&mut self, sink: ObservationSink) -> Result<(), SourceError> {
        let paired = submit_paired(self.query.as_ref(), &sink).await;
        info!(paired, "paired devices submitted");

        let events = self.watcher.start().await.map_err(|error| SourceError::Start {
            kind: SourceKind::Classic,
            error,
        })?;
        let forward = forward_watcher_events(events, sink);
        self.handler = Some(Handler::spawn(SourceKind::Classic, forward));
        debug!("classic watcher started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SourceError> {
        if let Some(handler) = self.handler.take() {
            handler.unregister().await;
        }

        let status = self.watcher.status();
        if !status.can_stop() {
            debug!(?status, "classic watcher not running, skipping stop");
            return Ok(());
        }

        self.watcher.stop().await.map_err(|error| SourceError::Stop {
            kind: SourceKind::Classic,
            error,
        })?;
        debug!("classic watcher stopped");
        Ok(())
    }
}

/// Submit every already-paired device. A failed query counts as zero
/// devices.
async fn submit_paired(query: &dyn PairedDeviceQuery, sink: &ObservationSink) -> usize {
    let devices = match query.find_paired().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "paired device query failed");
            return 0;
        }
    };

    let mut submitted = 0;
    for device in devices {
        let name = name_or_placeholder(&device.name);
        if sink.upsert(device.id, name, PAIRED).await.is_err() {
            break;
        }
        submitted += 1;
    }
    submitted
}

async fn forward_watcher_events(mut events: mpsc::Receiver<WatcherEvent>, sink: ObservationSink) {
    while let Some(event) = events.recv().await {
        let sent = match event {
            WatcherEvent::Added(info) => {
                let status = connectivity_status(info.is_connected);
                sink.upsert(info.id, name_or_placeholder(&info.name), status)
                    .await
            }
            // Without a connectivity change there is nothing to record, and a
            // partial update never creates a record: it has no name.
            WatcherEvent::Updated(update) => match update.is_connected {
                Some(connected) => {
                    sink.update_status(update.id, connectivity_status(Some(connected)))
                        .await
                }
                None => Ok(()),
            },
            WatcherEvent::EnumerationCompleted => {
                debug!("classic enumeration completed");
                Ok(())
            }
            WatcherEvent::Stopped => {
                debug!("classic watcher reported stop");
                break;
            }
        };
        if sent.is_err() {
            break;
        }
    }
}
