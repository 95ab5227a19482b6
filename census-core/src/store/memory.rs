//! In-process dataset backend.
//!
//! Sealed datasets are published to the owning store's shelf so they can be
//! re-opened by key for the rest of the process lifetime.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{
    check_kind, track_origin, EntryRange, OperationDataSet, OperationEntry, OperationMetadata,
    StoreError, StoreResult,
};

pub(crate) struct ShelfItem {
    pub(crate) metadata: OperationMetadata,
    pub(crate) entries: Arc<dyn Any + Send + Sync>,
}

/// Sealed in-memory datasets by key.
pub(crate) type Shelf = Arc<Mutex<HashMap<String, ShelfItem>>>;

pub(crate) fn new_shelf() -> Shelf {
    Arc::new(Mutex::new(HashMap::new()))
}

pub struct MemoryDataSet<E: OperationEntry> {
    metadata: OperationMetadata,
    entries: Arc<Vec<E>>,
    buffer: Vec<E>,
    batch_size: usize,
    sealed: bool,
    last_origin: Option<usize>,
    shelf: Option<Shelf>,
}

impl<E: OperationEntry> MemoryDataSet<E> {
    /// A detached dataset, not reachable through any store.
    pub fn new(metadata: OperationMetadata, batch_size: usize) -> StoreResult<Self> {
        check_kind::<E>(&metadata)?;
        Ok(Self {
            metadata,
            entries: Arc::new(Vec::new()),
            buffer: Vec::with_capacity(batch_size.max(1)),
            batch_size: batch_size.max(1),
            sealed: false,
            last_origin: None,
            shelf: None,
        })
    }

    pub(crate) fn on_shelf(
        metadata: OperationMetadata,
        batch_size: usize,
        shelf: Shelf,
    ) -> StoreResult<Self> {
        let mut ds = Self::new(metadata, batch_size)?;
        ds.shelf = Some(shelf);
        Ok(ds)
    }

    /// Re-open a sealed dataset from the shelf.
    pub(crate) fn from_shelf(shelf: &Shelf, key: &str) -> StoreResult<Self> {
        let guard = shelf.lock().unwrap_or_else(PoisonError::into_inner);
        let item = guard
            .get(key)
            .ok_or_else(|| StoreError::UnknownOperation(key.to_string()))?;
        check_kind::<E>(&item.metadata)?;

        let entries = Arc::clone(&item.entries)
            .downcast::<Vec<E>>()
            .map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                message: "stored entries do not match the requested entry type".into(),
            })?;

        Ok(Self {
            metadata: item.metadata.clone(),
            entries,
            buffer: Vec::new(),
            batch_size: 1,
            sealed: true,
            last_origin: None,
            shelf: None,
        })
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        debug!(
            "{}: flushing {} entries",
            self.metadata.key,
            self.buffer.len()
        );
        Arc::make_mut(&mut self.entries).append(&mut self.buffer);
    }
}

impl<E: OperationEntry> OperationDataSet<E> for MemoryDataSet<E> {
    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn add_entry(&mut self, entry: E) -> StoreResult<()> {
        if self.sealed {
            return Err(StoreError::Sealed(self.metadata.key.clone()));
        }
        track_origin(&mut self.last_origin, &entry, &self.metadata.key);
        self.buffer.push(entry);
        if self.buffer.len() >= self.batch_size {
            self.flush();
        }
        Ok(())
    }

    fn finish_writing(&mut self) -> StoreResult<()> {
        if self.sealed {
            return Err(StoreError::Sealed(self.metadata.key.clone()));
        }
        self.flush();
        self.metadata.n_entries = self.entries.len();

        if let Some(shelf) = self.shelf.take() {
            let mut guard = shelf.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.contains_key(&self.metadata.key) {
                return Err(StoreError::AlreadyExists(self.metadata.key.clone()));
            }
            let entries: Arc<dyn Any + Send + Sync> = self.entries.clone();
            guard.insert(
                self.metadata.key.clone(),
                ShelfItem {
                    metadata: self.metadata.clone(),
                    entries,
                },
            );
        }

        self.sealed = true;
        Ok(())
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn n_entries(&self) -> usize {
        self.entries.len() + self.buffer.len()
    }

    fn get_entries(&self, range: EntryRange) -> StoreResult<Vec<E>> {
        if !self.sealed {
            return Err(StoreError::NotSealed(self.metadata.key.clone()));
        }
        let r = range.resolve(self.entries.len())?;
        Ok(self.entries[r].to_vec())
    }
}
