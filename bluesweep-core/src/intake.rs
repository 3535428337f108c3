//! Observation intake: the single serialized entry point into the store
//!
//! Discovery sources never touch the store. They push normalized
//! [`Observation`]s through an [`ObservationSink`], and one consumer task
//! applies them to the [`DeviceStore`] in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace};

use crate::store::DeviceStore;

/// A normalized discovery observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Full observation: insert, or merge into an existing record
    Upsert {
        id: String,
        name: String,
        status: String,
    },
    /// Partial observation: status change for a record that should already
    /// exist. Dropped when it doesn't.
    StatusUpdate { id: String, status: String },
}

/// Returned by [`ObservationSink::send`] once the intake has been closed
#[derive(Debug, thiserror::Error)]
#[error("observation intake is closed")]
pub struct IntakeClosed;

/// Producer handle handed to discovery sources
#[derive(Debug, Clone)]
pub struct ObservationSink {
    tx: mpsc::Sender<Observation>,
}

impl ObservationSink {
    pub async fn send(&self, observation: Observation) -> Result<(), IntakeClosed> {
        self.tx.send(observation).await.map_err(|_| IntakeClosed)
    }

    pub async fn upsert(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        status: impl Into<String>,
    ) -> Result<(), IntakeClosed> {
        self.send(Observation::Upsert {
            id: id.into(),
            name: name.into(),
            status: status.into(),
        })
        .await
    }

    pub async fn update_status(
        &self,
        id: impl Into<String>,
        status: impl Into<String>,
    ) -> Result<(), IntakeClosed> {
        self.send(Observation::StatusUpdate {
            id: id.into(),
            status: status.into(),
        })
        .await
    }
}

/// Running intake task for one session
pub struct Intake {
    tx: mpsc::Sender<Observation>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl Intake {
    pub fn spawn(store: Arc<DeviceStore>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(store, rx, shutdown_rx));
        Self { tx, shutdown, task }
    }

    pub fn sink(&self) -> ObservationSink {
        ObservationSink {
            tx: self.tx.clone(),
        }
    }

    /// Stop accepting observations, apply what is already queued, and wait
    /// for the consumer task. Returns the number of observations applied.
    pub async fn close(self) -> Result<usize, JoinError> {
        drop(self.tx);
        let _ = self.shutdown.send(());
        self.task.await
    }
}

async fn run(
    store: Arc<DeviceStore>,
    mut rx: mpsc::Receiver<Observation>,
    mut shutdown: oneshot::Receiver<()>,
) -> usize {
    let mut applied = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            observation = rx.recv() => match observation {
                Some(observation) => {
                    apply(&store, observation).await;
                    applied += 1;
                }
                None => break,
            },
        }
    }

    rx.close();
    while let Ok(observation) = rx.try_recv() {
        apply(&store, observation).await;
        applied += 1;
    }
    debug!(applied, "observation intake closed");
    applied
}

async fn apply(store: &DeviceStore, observation: Observation) {
    match observation {
        Observation::Upsert { id, name, status } => {
            let record = store.upsert(&id, &name, &status).await;
            trace!(id = %record.id, name = %record.name, status = %record.status, "upsert");
        }
        Observation::StatusUpdate { id, status } => {
            if store.update_status(&id, &status).await.is_none() {
                debug!(id = %id, "dropping status update for unseen device");
            }
        }
    }
}
