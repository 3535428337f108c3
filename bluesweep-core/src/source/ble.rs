//! BLE advertisement discovery

use tokio::sync::mpsc;
use tracing::debug;

use super::{DiscoverySource, Handler};
use crate::error::{SourceError, SourceKind};
use crate::intake::ObservationSink;
use crate::platform::{Advertisement, AdvertisementListener, ListenerStatus, ScanningMode};
use crate::record::name_or_placeholder;

/// Identity of an advertising device: its 48-bit address as 12 uppercase
/// hex digits, so every packet from one device maps to the same id.
pub fn advertisement_id(address: u64) -> String {
    format!("{:012X}", address & 0xFFFF_FFFF_FFFF)
}

pub fn signal_status(rssi: i16) -> String {
    format!("Signal: {rssi} dBm")
}

/// Continuous advertisement listener. Every packet is forwarded; the store
/// collapses repeats.
pub struct BleSource {
    listener: Box<dyn AdvertisementListener>,
    mode: ScanningMode,
    handler: Option<Handler>,
}

impl BleSource {
    pub fn new(listener: Box<dyn AdvertisementListener>, mode: ScanningMode) -> Self {
        Self {
            listener,
            mode,
            handler: None,
        }
    }
}

#[async_trait::async_trait]
impl DiscoverySource for BleSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Ble
    }

    async fn start(&mut self, sink: ObservationSink) -> Result<(), SourceError> {
        let advertisements =
            self.listener
                .start(self.mode)
                .await
                .map_err(|error| SourceError::Start {
                    kind: SourceKind::Ble,
                    error,
                })?;
        let forward = forward_advertisements(advertisements, sink);
        self.handler = Some(Handler::spawn(SourceKind::Ble, forward));
        debug!(mode = ?self.mode, "ble listener started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SourceError> {
        if let Some(handler) = self.handler.take() {
            handler.unregister().await;
        }

        let status = self.listener.status();
        if status != ListenerStatus::Started {
            debug!(?status, "ble listener not running, skipping stop");
            return Ok(());
        }

        self.listener.stop().await.map_err(|error| SourceError::Stop {
            kind: SourceKind::Ble,
            error,
        })?;
        debug!("ble listener stopped");
        Ok(())
    }
}

async fn forward_advertisements(
    mut advertisements: mpsc::Receiver<Advertisement>,
    sink: ObservationSink,
) {
    while let Some(advertisement) = advertisements.recv().await {
        let sent = sink
            .upsert(
                advertisement_id(advertisement.address),
                name_or_placeholder(&advertisement.local_name),
                signal_status(advertisement.rssi),
            )
            .await;
        if sent.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::intake::Intake;
    use crate::record::PLACEHOLDER_NAME;
    use crate::store::DeviceStore;
    use crate::testing::{FakeListener, settle};

    fn adv(name: &str, address: u64, rssi: i16) -> Advertisement {
        Advertisement {
            local_name: name.to_string(),
            address,
            rssi,
        }
    }

    #[test]
    fn id_is_fixed_width_uppercase_hex() {
        assert_eq!(advertisement_id(0x1122), "000000001122");
        assert_eq!(advertisement_id(0xA1B2_C3D4_E5F6), "A1B2C3D4E5F6");
        assert_eq!(advertisement_id(0x1122), advertisement_id(0x1122));
    }

    #[test]
    fn status_embeds_signal_strength() {
        assert_eq!(signal_status(-62), "Signal: -62 dBm");
    }

    #[tokio::test]
    async fn repeated_advertisements_collapse_to_one_record() {
        let listener = FakeListener::scripted(vec![
            adv("", 0x1122, -70),
            adv("Tag", 0x1122, -65),
            adv("", 0x1122, -61),
            adv("", 0x3344, -80),
        ]);
        let mut source = BleSource::new(Box::new(listener), ScanningMode::Active);

        let store = Arc::new(DeviceStore::new());
        let intake = Intake::spawn(store.clone(), 64);
        source.start(intake.sink()).await.unwrap();
        settle().await;
        source.stop().await.unwrap();
        intake.close().await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "000000001122");
        assert_eq!(snapshot[0].name, "Tag");
        assert_eq!(snapshot[0].status, "Signal: -61 dBm");
        assert_eq!(snapshot[1].name, PLACEHOLDER_NAME);
    }

    #[tokio::test]
    async fn start_failure_leaves_nothing_to_stop() {
        let listener = FakeListener::failing_start();
        let stops = listener.stop_calls();
        let mut source = BleSource::new(Box::new(listener), ScanningMode::Active);

        let store = Arc::new(DeviceStore::new());
        let intake = Intake::spawn(store, 8);
        let err = source.start(intake.sink()).await.unwrap_err();
        assert_eq!(err.kind(), SourceKind::Ble);

        source.stop().await.unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        intake.close().await.unwrap();
    }

    #[tokio::test]
    async fn stop_failure_is_reported_once() {
        let listener = FakeListener::failing_stop(vec![adv("Tag", 1, -50)]);
        let stops = listener.stop_calls();
        let mut source = BleSource::new(Box::new(listener), ScanningMode::Active);

        let store = Arc::new(DeviceStore::new());
        let intake = Intake::spawn(store, 8);
        source.start(intake.sink()).await.unwrap();
        assert!(matches!(
            source.stop().await,
            Err(SourceError::Stop { kind: SourceKind::Ble, .. })
        ));
        // The listener aborted; a second stop must not reach it.
        source.stop().await.unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        intake.close().await.unwrap();
    }
}
