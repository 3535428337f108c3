//! Discovery sources: turn platform events into [`Observation`]s
//!
//! [`Observation`]: crate::intake::Observation

mod ble;
mod classic;

pub use ble::{BleSource, advertisement_id, signal_status};
pub use classic::{AVAILABLE, CONNECTED, ClassicSource, PAIRED, connectivity_status};

use tokio::task::{JoinError, JoinHandle};
use tracing::warn;

use crate::error::{SourceError, SourceKind};
use crate::intake::ObservationSink;

#[async_trait::async_trait]
pub trait DiscoverySource: Send {
    fn kind(&self) -> SourceKind;

    /// Start discovering. Observations flow into `sink` until [`stop`].
    ///
    /// [`stop`]: DiscoverySource::stop
    async fn start(&mut self, sink: ObservationSink) -> Result<(), SourceError>;

    /// Unregister event handling, then halt the platform collaborator.
    /// Calling this on a source that is not running is a no-op.
    async fn stop(&mut self) -> Result<(), SourceError>;
}

/// Task forwarding platform events into the sink
struct Handler {
    kind: SourceKind,
    task: JoinHandle<()>,
}

impl Handler {
    fn spawn<F>(kind: SourceKind, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            kind,
            task: tokio::spawn(future),
        }
    }

    /// Once this returns, no further observation is sent by this handler.
    /// Returns the panic if the handler died on its own.
    async fn unregister(self) -> Option<JoinError> {
        self.task.abort();
        match self.task.await {
            Err(e) if e.is_panic() => {
                warn!(source = %self.kind, error = %e, "event handler panicked");
                Some(e)
            }
            _ => None,
        }
    }
}
