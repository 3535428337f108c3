//! Scan session controller
//!
//! One session runs `Idle -> Scanning -> Finalizing -> Idle`: clear the
//! store, start every discovery source, wait out the fixed scan duration,
//! stop the sources and hand the store's snapshot to the presenter.
//! A source that fails to start or stop is logged and the session goes on
//! without it. A source that panics while starting, or a broken intake,
//! ends the session with an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use crate::error::SessionError;
use crate::intake::Intake;
use crate::platform::{AdvertisementListener, DeviceWatcher, PairedDeviceQuery, ScanningMode};
use crate::report::{Presenter, ScanReport, SessionFailure};
use crate::source::{BleSource, ClassicSource, DiscoverySource};
use crate::store::DeviceStore;

pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(8);

pub const DEFAULT_INTAKE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// How long sources run before the session is finalized
    pub duration: Duration,
    pub scanning_mode: ScanningMode,
    /// Observations that may queue before sources are slowed down
    pub intake_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SCAN_DURATION,
            scanning_mode: ScanningMode::Active,
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Finalizing,
}

/// Puts the controller back to `Idle` however the session ends
struct ReturnToIdle<'a>(&'a watch::Sender<SessionState>);

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SessionState::Idle);
    }
}

/// Tells the presenter the session is over, even when `begin` is dropped
struct FinishScan<'a, P: Presenter + ?Sized>(&'a P);

impl<P: Presenter + ?Sized> Drop for FinishScan<'_, P> {
    fn drop(&mut self) {
        self.0.scan_finished();
    }
}

pub struct ScanController {
    config: ScanConfig,
    store: Arc<DeviceStore>,
    sources: Mutex<Vec<Box<dyn DiscoverySource>>>,
    state: watch::Sender<SessionState>,
}

impl ScanController {
    pub fn new(config: ScanConfig, sources: Vec<Box<dyn DiscoverySource>>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            store: Arc::new(DeviceStore::new()),
            sources: Mutex::new(sources),
            state,
        }
    }

    /// Controller over the classic/paired source followed by the BLE source
    pub fn with_platform(
        config: ScanConfig,
        query: Box<dyn PairedDeviceQuery>,
        watcher: Box<dyn DeviceWatcher>,
        listener: Box<dyn AdvertisementListener>,
    ) -> Self {
        let mode = config.scanning_mode;
        Self::new(
            config,
            vec![
                Box::new(ClassicSource::new(query, watcher)),
                Box::new(BleSource::new(listener, mode)),
            ],
        )
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<DeviceStore> {
        self.store.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run one full session.
    ///
    /// Rejected with [`SessionError::Busy`] unless the controller is
    /// `Idle`. The presenter sees `scan_started`, then either the report or
    /// a failure, then `scan_finished`. If the returned future is dropped
    /// mid-scan the presenter still sees `scan_finished`.
    pub async fn begin<P>(&self, presenter: &P) -> Result<ScanReport, SessionError>
    where
        P: Presenter + ?Sized,
    {
        let acquired = self.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Scanning;
                true
            } else {
                false
            }
        });
        if !acquired {
            warn!(state = ?self.state(), "scan requested while a session is running");
            return Err(SessionError::Busy);
        }
        let _idle = ReturnToIdle(&self.state);

        presenter.scan_started();
        let _finished = FinishScan(presenter);
        let result = self.run().await;
        match &result {
            Ok(report) => presenter.show_report(report),
            Err(e) => {
                error!(error = %e, "scan session failed");
                presenter.show_failure(&SessionFailure::new(e.to_string()));
            }
        }
        result
    }

    async fn run(&self) -> Result<ScanReport, SessionError> {
        let mut sources = self.sources.lock().await;

        // Leftovers from an interrupted session must not feed this one.
        stop_all(&mut sources).await;
        self.store.clear().await;

        let intake = Intake::spawn(self.store.clone(), self.config.intake_capacity);
        let mut started = 0;
        let mut panicked = None;
        for source in sources.iter_mut() {
            let kind = source.kind();
            match AssertUnwindSafe(source.start(intake.sink()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {
                    started += 1;
                    info!(source = %kind, "discovery source started");
                }
                Ok(Err(e)) => warn!(source = %kind, error = %e, "discovery source unavailable"),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(source = %kind, %message, "discovery source panicked while starting");
                    panicked = Some(SessionError::SourcePanicked { kind, message });
                    break;
                }
            }
        }
        if let Some(e) = panicked {
            self.state.send_replace(SessionState::Finalizing);
            stop_all(&mut sources).await;
            intake.close().await?;
            return Err(e);
        }
        if started == 0 {
            warn!("no discovery source could be started");
        }
        info!(duration = ?self.config.duration, started, "scanning");

        tokio::time::sleep(self.config.duration).await;

        self.state.send_replace(SessionState::Finalizing);
        stop_all(&mut sources).await;
        let applied = intake.close().await?;

        let report = ScanReport::new(self.store.snapshot().await);
        info!(devices = report.count(), observations = applied, "scan finished");
        Ok(report)
    }
}

async fn stop_all(sources: &mut [Box<dyn DiscoverySource>]) {
    for source in sources.iter_mut() {
        let kind = source.kind();
        match AssertUnwindSafe(source.stop()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(source = %kind, error = %e, "discovery source did not stop cleanly")
            }
            Err(panic) => warn!(
                source = %kind,
                message = %panic_message(panic.as_ref()),
                "discovery source panicked while stopping"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
