//! Device store: the one place discovered devices live during a session

use std::collections::HashMap;

use tokio::sync::{RwLock, watch};

use crate::record::DeviceRecord;

#[derive(Default)]
struct Records {
    /// First-discovery order
    ordered: Vec<DeviceRecord>,
    /// id -> position in `ordered`
    index: HashMap<String, usize>,
}

/// Ordered, identity-keyed collection of discovered devices.
///
/// Every mutation happens under a single write lock, so upserts arriving
/// from both discovery sources are serialized and a reader never sees a
/// half-updated record. Observers get a coarse revision counter through
/// [`DeviceStore::subscribe`] rather than per-field notifications.
pub struct DeviceStore {
    records: RwLock<Records>,
    revision: watch::Sender<u64>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            records: RwLock::new(Records::default()),
            revision,
        }
    }

    /// Insert a new record, or merge into the existing one with the same id.
    ///
    /// New records are appended, so the snapshot order is first-discovery
    /// order no matter how often a record changes afterwards.
    pub async fn upsert(&self, id: &str, name: &str, status: &str) -> DeviceRecord {
        let record = {
            let mut records = self.records.write().await;
            match records.index.get(id).copied() {
                Some(pos) => {
                    let record = &mut records.ordered[pos];
                    record.merge(name, status);
                    record.clone()
                }
                None => {
                    let record = DeviceRecord::new(id, name, status);
                    let pos = records.ordered.len();
                    records.ordered.push(record.clone());
                    records.index.insert(id.to_string(), pos);
                    record
                }
            }
        };
        self.bump();
        record
    }

    /// Overwrite the status of an existing record. Returns `None`, and
    /// changes nothing, when no record with `id` exists.
    pub async fn update_status(&self, id: &str, status: &str) -> Option<DeviceRecord> {
        let record = {
            let mut records = self.records.write().await;
            let pos = records.index.get(id).copied()?;
            let record = &mut records.ordered[pos];
            record.status = status.to_string();
            record.clone()
        };
        self.bump();
        Some(record)
    }

    pub async fn clear(&self) {
        {
            let mut records = self.records.write().await;
            records.ordered.clear();
            records.index.clear();
        }
        self.bump();
    }

    pub async fn get(&self, id: &str) -> Option<DeviceRecord> {
        let records = self.records.read().await;
        records.index.get(id).map(|&pos| records.ordered[pos].clone())
    }

    /// Current records in first-discovery order
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        self.records.read().await.ordered.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Revision counter, bumped on every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
