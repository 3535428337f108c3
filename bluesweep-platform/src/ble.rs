//! BLE advertisement listener on top of btleplug

use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use bluesweep_core::platform::{
    Advertisement, AdvertisementListener, ListenerStatus, PlatformError, ScanningMode,
};

const ADVERTISEMENT_BUFFER: usize = 256;

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, PlatformError> {
    let manager = Manager::new()
        .await
        .map_err(|e| PlatformError::backend("creating Bluetooth manager", e))?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| PlatformError::backend("listing Bluetooth adapters", e))?;
    adapters.into_iter().next().ok_or(PlatformError::AdapterNotFound)
}

/// 48-bit address as an integer, first octet most significant
pub fn address_to_u64(address: BDAddr) -> u64 {
    address
        .into_inner()
        .iter()
        .fold(0, |acc, &octet| (acc << 8) | u64::from(octet))
}

/// Listens for advertisements on the first adapter btleplug finds.
///
/// The adapter is looked up on the first `start`, so a missing radio is a
/// start failure rather than a construction failure. btleplug backends
/// always scan actively; passive scanning is refused.
pub struct BtleplugListener {
    adapter: Option<Adapter>,
    status: ListenerStatus,
    pump: Option<JoinHandle<()>>,
}

impl BtleplugListener {
    pub fn new() -> Self {
        Self {
            adapter: None,
            status: ListenerStatus::Created,
            pump: None,
        }
    }

    async fn adapter(&mut self) -> Result<Adapter, PlatformError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }
        let adapter = get_adapter().await?;
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    /// A pump that ended on its own leaves the listener restartable.
    fn ensure_startable(&self) -> Result<(), PlatformError> {
        let status = self.status();
        if status == ListenerStatus::Started {
            return Err(PlatformError::InvalidState {
                expected: "created or stopped",
                actual: format!("{status:?}"),
            });
        }
        Ok(())
    }
}

impl Default for BtleplugListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AdvertisementListener for BtleplugListener {
    fn status(&self) -> ListenerStatus {
        match &self.pump {
            Some(pump) if pump.is_finished() && self.status == ListenerStatus::Started => {
                ListenerStatus::Aborted
            }
            _ => self.status,
        }
    }

    async fn start(
        &mut self,
        mode: ScanningMode,
    ) -> Result<mpsc::Receiver<Advertisement>, PlatformError> {
        self.ensure_startable()?;
        if mode == ScanningMode::Passive {
            return Err(PlatformError::Unsupported("passive BLE scanning".to_string()));
        }

        let adapter = self.adapter().await?;
        let events = adapter
            .events()
            .await
            .map_err(|e| PlatformError::backend("subscribing to adapter events", e))?;
        if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
            self.status = ListenerStatus::Aborted;
            return Err(PlatformError::backend("starting BLE scan", e));
        }

        if let Some(finished) = self.pump.take() {
            let _ = finished.await;
        }
        let (tx, rx) = mpsc::channel(ADVERTISEMENT_BUFFER);
        self.pump = Some(tokio::spawn(pump(adapter, events, tx)));
        self.status = ListenerStatus::Started;
        debug!("btleplug scan started");
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
        let adapter = self
            .adapter
            .as_ref()
            .ok_or_else(|| PlatformError::InvalidState {
                expected: "started",
                actual: format!("{:?}", self.status),
            })?;
        let stopped = adapter.stop_scan().await;
        self.status = ListenerStatus::Stopped;
        stopped.map_err(|e| PlatformError::backend("stopping BLE scan", e))?;
        debug!("btleplug scan stopped");
        Ok(())
    }
}

/// One advertisement per discovery/update event. Each such event means
/// btleplug has just received a packet from the peripheral. The scan is
/// halted when the pump ends without being aborted.
async fn pump<S>(adapter: Adapter, mut events: S, tx: mpsc::Sender<Advertisement>)
where
    S: Stream<Item = CentralEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        match advertisement(&adapter, &id).await {
            Ok(Some(advertisement)) => {
                if tx.send(advertisement).await.is_err() {
                    break;
                }
            }
            Ok(None) => trace!(?id, "advertisement without signal reading"),
            Err(e) => debug!(?id, error = %e, "could not read peripheral properties"),
        }
    }
    if let Err(e) = adapter.stop_scan().await {
        debug!(error = %e, "could not stop BLE scan after pump ended");
    }
}

async fn advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
) -> Result<Option<Advertisement>, btleplug::Error> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(props) = peripheral.properties().await? else {
        return Ok(None);
    };
    let Some(rssi) = props.rssi else {
        return Ok(None);
    };
    Ok(Some(Advertisement {
        local_name: props.local_name.unwrap_or_default(),
        address: address_to_u64(props.address),
        rssi,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_octets_are_big_endian() {
        let address = BDAddr::from([0x00, 0x00, 0x00, 0x00, 0x11, 0x22]);
        assert_eq!(address_to_u64(address), 0x1122);

        let address = BDAddr::from([0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]);
        assert_eq!(address_to_u64(address), 0xA1B2_C3D4_E5F6);
        assert_eq!(
            bluesweep_core::source::advertisement_id(address_to_u64(address)),
            "A1B2C3D4E5F6"
        );
    }

    #[tokio::test]
    async fn passive_mode_is_refused() {
        let mut listener = BtleplugListener::new();
        let err = listener.start(ScanningMode::Passive).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(_)));
        assert_eq!(listener.status(), ListenerStatus::Created);
    }

    fn started_with(pump: JoinHandle<()>) -> BtleplugListener {
        BtleplugListener {
            adapter: None,
            status: ListenerStatus::Started,
            pump: Some(pump),
        }
    }

    #[tokio::test]
    async fn finished_pump_allows_restart() {
        let listener = started_with(tokio::spawn(async {}));
        while listener.pump.as_ref().is_some_and(|pump| !pump.is_finished()) {
            tokio::task::yield_now().await;
        }

        assert_eq!(listener.status(), ListenerStatus::Aborted);
        assert!(listener.ensure_startable().is_ok());
    }

    #[tokio::test]
    async fn running_pump_blocks_restart() {
        let listener = started_with(tokio::spawn(std::future::pending()));
        assert!(matches!(
            listener.ensure_startable(),
            Err(PlatformError::InvalidState { .. })
        ));
    }
}
