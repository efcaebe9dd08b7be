//! Holder for the current ledger snapshot.
//!
//! RULE: Ingestion replaces the snapshot wholesale; nobody edits it.
//! Engine calls take an `Arc<Dataset>` from `snapshot()` and keep it
//! for the duration of the call, so a concurrent `replace()` never
//! changes data under a running engine.

use crate::{
    dataset::Dataset,
    error::{LedgerError, LedgerResult},
};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new snapshot. Returns the previous one, if any.
    pub fn replace(&self, dataset: Dataset) -> Option<Arc<Dataset>> {
        let rows = dataset.row_count();
        let next = Arc::new(dataset);
        let prev = match self.current.write() {
            Ok(mut guard) => guard.replace(next),
            Err(poisoned) => poisoned.into_inner().replace(next),
        };
        log::info!("dataset_store: installed snapshot with {rows} rows");
        prev
    }

    /// The current snapshot, or `DatasetUnavailable` before the first upload.
    pub fn snapshot(&self) -> LedgerResult<Arc<Dataset>> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().ok_or(LedgerError::DatasetUnavailable)
    }

    pub fn clear(&self) {
        match self.current.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
