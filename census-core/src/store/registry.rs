//! The operation store: one explicit object that owns dataset lookup.
//!
//! Constructed once and passed by reference to every pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::PoisonError;

use tracing::info;

use super::file::{self, FileDataSet};
use super::memory::{new_shelf, MemoryDataSet, Shelf};
use super::{OperationDataSet, OperationEntry, OperationKind, OperationMetadata, StoreError, StoreResult};

/// Where datasets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Directory(PathBuf),
}

/// Default number of entries buffered before a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

pub struct OperationStore {
    backend: StoreBackend,
    shelf: Shelf,
    batch_size: usize,
    counter: AtomicUsize,
}

impl OperationStore {
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            shelf: new_shelf(),
            batch_size: DEFAULT_BATCH_SIZE,
            counter: AtomicUsize::new(1),
        }
    }

    /// A store rooted at `path`, created if missing. Datasets already sealed
    /// there are visible immediately.
    pub fn directory(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        info!("Operation store at {}", path.display());
        Ok(Self {
            backend: StoreBackend::Directory(path),
            shelf: new_shelf(),
            batch_size: DEFAULT_BATCH_SIZE,
            counter: AtomicUsize::new(1),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn backend(&self) -> &StoreBackend {
        &self.backend
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// New writable dataset using the store's batch size.
    pub fn create<E: OperationEntry>(
        &self,
        metadata: OperationMetadata,
    ) -> StoreResult<Box<dyn OperationDataSet<E>>> {
        self.create_batched(metadata, self.batch_size)
    }

    /// New writable dataset flushing every `batch_size` entries.
    pub fn create_batched<E: OperationEntry>(
        &self,
        metadata: OperationMetadata,
        batch_size: usize,
    ) -> StoreResult<Box<dyn OperationDataSet<E>>> {
        if self.contains(&metadata.key) {
            return Err(StoreError::AlreadyExists(metadata.key));
        }
        match &self.backend {
            StoreBackend::Memory => Ok(Box::new(MemoryDataSet::on_shelf(
                metadata,
                batch_size,
                self.shelf.clone(),
            )?)),
            StoreBackend::Directory(dir) => {
                Ok(Box::new(FileDataSet::create(dir.clone(), metadata, batch_size)?))
            }
        }
    }

    /// Re-open a sealed dataset by key.
    pub fn open<E: OperationEntry>(&self, key: &str) -> StoreResult<Box<dyn OperationDataSet<E>>> {
        match &self.backend {
            StoreBackend::Memory => Ok(Box::new(MemoryDataSet::from_shelf(&self.shelf, key)?)),
            StoreBackend::Directory(dir) => Ok(Box::new(FileDataSet::open(dir.clone(), key)?)),
        }
    }

    pub fn metadata(&self, key: &str) -> StoreResult<OperationMetadata> {
        match &self.backend {
            StoreBackend::Memory => self
                .shelf
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .map(|item| item.metadata.clone())
                .ok_or_else(|| StoreError::UnknownOperation(key.to_string())),
            StoreBackend::Directory(dir) => file::read_metadata(dir, key),
        }
    }

    /// Whether a sealed dataset with this key exists.
    pub fn contains(&self, key: &str) -> bool {
        match &self.backend {
            StoreBackend::Memory => self
                .shelf
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(key),
            StoreBackend::Directory(dir) => file::meta_path(dir, key).exists(),
        }
    }

    /// Metadata of every sealed dataset, sorted by key.
    pub fn list(&self) -> StoreResult<Vec<OperationMetadata>> {
        let mut out: Vec<OperationMetadata> = match &self.backend {
            StoreBackend::Memory => self
                .shelf
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .map(|item| item.metadata.clone())
                .collect(),
            StoreBackend::Directory(dir) => {
                let mut found = Vec::new();
                for dirent in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
                    let dirent = dirent.map_err(|e| StoreError::io(dir, e))?;
                    let name = dirent.file_name();
                    if let Some(key) = name.to_str().and_then(file::key_of_meta_file) {
                        found.push(file::read_metadata(dir, key)?);
                    }
                }
                found
            }
        };
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    /// Sealed datasets of one kind, sorted by key.
    pub fn list_kind(&self, kind: OperationKind) -> StoreResult<Vec<OperationMetadata>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect())
    }

    /// A fresh key `<kind>-<n>` not used by any sealed dataset.
    pub fn next_key(&self, kind: OperationKind) -> String {
        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let key = format!("{}-{}", kind.slug(), n);
            if !self.contains(&key) {
                return key;
            }
        }
    }
}
