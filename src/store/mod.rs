//! In-memory address state store.
//!
//! Holds the last successfully derived [`AddressSnapshot`] per address. Writers
//! are the per-address collection workers; readers are the aggregation and
//! publishing steps. There is no removal path: a snapshot lives until the
//! process exits, mirroring the exported metric series.

use metrics::gauge;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::derive::AddressSnapshot;

/// Store lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No snapshot has been recorded for the address yet
    #[error("No snapshot for address {0}")]
    NotFound(String),
}

/// Address to latest snapshot map
#[derive(Debug, Default)]
pub struct AddressStore {
    snapshots: RwLock<HashMap<String, AddressSnapshot>>,
}

impl AddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot for its address, returning the previous one
    pub fn put(&self, snapshot: AddressSnapshot) -> Option<AddressSnapshot> {
        let (previous, entries) = {
            let mut snapshots = self.snapshots.write();
            let previous = snapshots.insert(snapshot.address.clone(), snapshot);
            (previous, snapshots.len())
        };
        gauge!("dill_store_entries", entries as f64);
        previous
    }

    pub fn get(&self, address: &str) -> Result<AddressSnapshot, StoreError> {
        self.snapshots
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }

    /// Point-in-time copy of every snapshot, in no particular order
    pub fn list(&self) -> Vec<AddressSnapshot> {
        self.snapshots.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}
