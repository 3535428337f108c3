//! Scripted platform collaborators for tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::platform::{
    Advertisement, AdvertisementListener, DeviceWatcher, ListenerStatus, PairedDevice,
    PairedDeviceQuery, PlatformError, ScanningMode, WatcherEvent, WatcherStatus,
};

/// Let spawned handler and intake tasks run until they are idle
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn radio_off() -> PlatformError {
    PlatformError::Unsupported("radio is off".to_string())
}

#[derive(Default)]
pub struct FakeQuery {
    devices: Vec<PairedDevice>,
    fail: bool,
}

impl FakeQuery {
    pub fn returning(devices: Vec<PairedDevice>) -> Self {
        Self {
            devices,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            devices: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl PairedDeviceQuery for FakeQuery {
    async fn find_paired(&self) -> Result<Vec<PairedDevice>, PlatformError> {
        if self.fail {
            return Err(radio_off());
        }
        Ok(self.devices.clone())
    }
}

/// Emits its script on start, then stays open like a live watcher
pub struct FakeWatcher {
    script: Vec<WatcherEvent>,
    fail_start: bool,
    panic_start: bool,
    status: WatcherStatus,
    tx: Option<mpsc::Sender<WatcherEvent>>,
    stops: Arc<AtomicUsize>,
}

impl FakeWatcher {
    pub fn scripted(script: Vec<WatcherEvent>) -> Self {
        Self {
            script,
            fail_start: false,
            panic_start: false,
            status: WatcherStatus::Created,
            tx: None,
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn panicking_start() -> Self {
        Self {
            panic_start: true,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn stop_calls(&self) -> Arc<AtomicUsize> {
        self.stops.clone()
    }
}

#[async_trait::async_trait]
impl DeviceWatcher for FakeWatcher {
    fn status(&self) -> WatcherStatus {
        self.status
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<WatcherEvent>, PlatformError> {
        if self.panic_start {
            panic!("radio driver crashed");
        }
        if self.fail_start {
            self.status = WatcherStatus::Aborted;
            return Err(radio_off());
        }
        self.status = WatcherStatus::Started;
        let (tx, rx) = mpsc::channel(self.script.len().max(1));
        for event in self.script.drain(..) {
            if let WatcherEvent::EnumerationCompleted = event {
                self.status = WatcherStatus::EnumerationCompleted;
            }
            tx.try_send(event).expect("script fits the channel");
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        assert!(self.status.can_stop(), "stop called on inactive watcher");
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.tx = None;
        self.status = WatcherStatus::Stopped;
        Ok(())
    }
}

pub struct FakeListener {
    script: Vec<Advertisement>,
    fail_start: bool,
    panic_start: bool,
    fail_stop: bool,
    status: ListenerStatus,
    tx: Option<mpsc::Sender<Advertisement>>,
    stops: Arc<AtomicUsize>,
}

impl FakeListener {
    pub fn scripted(script: Vec<Advertisement>) -> Self {
        Self {
            script,
            fail_start: false,
            panic_start: false,
            fail_stop: false,
            status: ListenerStatus::Created,
            tx: None,
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn panicking_start() -> Self {
        Self {
            panic_start: true,
            ..Self::scripted(Vec::new())
        }
    }

    pub fn failing_stop(script: Vec<Advertisement>) -> Self {
        Self {
            fail_stop: true,
            ..Self::scripted(script)
        }
    }

    pub fn stop_calls(&self) -> Arc<AtomicUsize> {
        self.stops.clone()
    }
}

#[async_trait::async_trait]
impl AdvertisementListener for FakeListener {
    fn status(&self) -> ListenerStatus {
        self.status
    }

    async fn start(
        &mut self,
        mode: ScanningMode,
    ) -> Result<mpsc::Receiver<Advertisement>, PlatformError> {
        assert_eq!(mode, ScanningMode::Active);
        if self.panic_start {
            panic!("radio driver crashed");
        }
        if self.fail_start {
            self.status = ListenerStatus::Aborted;
            return Err(radio_off());
        }
        let (tx, rx) = mpsc::channel(self.script.len().max(1));
        for advertisement in self.script.drain(..) {
            tx.try_send(advertisement).expect("script fits the channel");
        }
        self.tx = Some(tx);
        self.status = ListenerStatus::Started;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), PlatformError> {
        assert_eq!(self.status, ListenerStatus::Started, "stop called on inactive listener");
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.tx = None;
        if self.fail_stop {
            self.status = ListenerStatus::Aborted;
            return Err(radio_off());
        }
        self.status = ListenerStatus::Stopped;
        Ok(())
    }
}
