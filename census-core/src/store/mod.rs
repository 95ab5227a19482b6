//! Append-only operation datasets.
//!
//! Every pipeline writes its per-marker (or per-sample) results into an
//! [`OperationDataSet`]: entries are appended in origin order, buffered in
//! fixed-size batches, and sealed with `finish_writing`. A sealed dataset is
//! read-only and can be re-opened by key for range reads.
//!
//! Backends:
//! - [`memory::MemoryDataSet`]: entries kept in process memory.
//! - [`file::FileDataSet`]: length-prefixed bincode records on disk, read
//!   back through a memory map.
//!
//! [`registry::OperationStore`] selects the backend and hands out datasets.

pub mod file;
pub mod memory;
pub mod registry;

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::{OperationStore, StoreBackend};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Operation {0} is sealed; no further entries can be added")]
    Sealed(String),

    #[error("Operation {0} is still being written")]
    NotSealed(String),

    #[error("Operation {0} already exists")]
    AlreadyExists(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation {key} is a {found} dataset, expected one of {expected}")]
    KindMismatch {
        key: String,
        expected: String,
        found: OperationKind,
    },

    #[error("Range {from}..{to} out of bounds for operation of {len} entries")]
    OutOfRange { from: usize, to: usize, len: usize },

    #[error("Operation {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operation types a dataset can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    QaMarkers,
    QaSamples,
    MarkerCensus,
    HardyWeinberg,
    AllelicTest,
    GenotypicTest,
    TrendTest,
}

impl OperationKind {
    /// Short identifier used in generated operation keys.
    pub fn slug(self) -> &'static str {
        match self {
            OperationKind::QaMarkers => "qa-markers",
            OperationKind::QaSamples => "qa-samples",
            OperationKind::MarkerCensus => "census",
            OperationKind::HardyWeinberg => "hw",
            OperationKind::AllelicTest => "allelic",
            OperationKind::GenotypicTest => "genotypic",
            OperationKind::TrendTest => "trend",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Header of an operation dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// Unique key the dataset is addressed by.
    pub key: String,
    pub kind: OperationKind,
    /// Matrix or operation this one was derived from.
    pub parent: String,
    pub description: String,
    pub n_markers: usize,
    pub n_samples: usize,
    pub n_chromosomes: usize,
    /// Operation parameters (thresholds, source operation keys, ...).
    pub params: serde_json::Value,
    /// Number of entries; set when the dataset is sealed.
    pub n_entries: usize,
}

impl OperationMetadata {
    pub fn new(key: impl Into<String>, kind: OperationKind, parent: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            parent: parent.into(),
            description: String::new(),
            n_markers: 0,
            n_samples: 0,
            n_chromosomes: 0,
            params: serde_json::Value::Null,
            n_entries: 0,
        }
    }

    pub fn with_counts(mut self, n_markers: usize, n_samples: usize, n_chromosomes: usize) -> Self {
        self.n_markers = n_markers;
        self.n_samples = n_samples;
        self.n_chromosomes = n_chromosomes;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// A record type that can be stored in an operation dataset.
pub trait OperationEntry:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Operation kinds whose datasets hold this entry type.
    const KINDS: &'static [OperationKind];

    /// Index of the marker or sample this entry was computed from, in the
    /// source matrix.
    fn origin_index(&self) -> usize;
}

/// Entries arrive in strictly increasing origin order; checked in debug
/// builds only.
pub(crate) fn track_origin<E: OperationEntry>(
    last: &mut Option<usize>,
    entry: &E,
    key: &str,
) {
    let origin = entry.origin_index();
    debug_assert!(
        last.map_or(true, |prev| prev < origin),
        "{}: origin index {} added after {:?}",
        key,
        origin,
        last
    );
    *last = Some(origin);
}

pub(crate) fn check_kind<E: OperationEntry>(metadata: &OperationMetadata) -> StoreResult<()> {
    if E::KINDS.contains(&metadata.kind) {
        Ok(())
    } else {
        Err(StoreError::KindMismatch {
            key: metadata.key.clone(),
            expected: E::KINDS
                .iter()
                .map(|k| k.slug())
                .collect::<Vec<_>>()
                .join("/"),
            found: metadata.kind,
        })
    }
}

/// Half-open entry range; an open bound extends to the start / end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryRange {
    from: Option<usize>,
    to: Option<usize>,
}

impl EntryRange {
    /// Every entry.
    pub const ALL: EntryRange = EntryRange {
        from: None,
        to: None,
    };

    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Build from index sentinels: a negative bound is open, so `(-1, -1)`
    /// is the whole range.
    pub fn from_sentinels(from: i64, to: i64) -> Self {
        Self {
            from: usize::try_from(from).ok(),
            to: usize::try_from(to).ok(),
        }
    }

    /// Concrete bounds for a dataset of `len` entries.
    pub fn resolve(self, len: usize) -> StoreResult<Range<usize>> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(len);
        if from > to || to > len {
            return Err(StoreError::OutOfRange { from, to, len });
        }
        Ok(from..to)
    }
}

impl From<Range<usize>> for EntryRange {
    fn from(r: Range<usize>) -> Self {
        EntryRange::new(r.start, r.end)
    }
}

/// Append-only dataset of operation entries.
///
/// Entries must be added in origin order. Reads are only served once the
/// dataset is sealed. Dropping a dataset that was never sealed discards
/// whatever was written.
pub trait OperationDataSet<E: OperationEntry>: Send {
    fn metadata(&self) -> &OperationMetadata;

    /// Append one entry; flushes the write buffer when it fills up.
    fn add_entry(&mut self, entry: E) -> StoreResult<()>;

    /// Flush the remaining buffered entries and seal the dataset.
    fn finish_writing(&mut self) -> StoreResult<()>;

    fn is_sealed(&self) -> bool;

    /// Entries added so far (buffered or flushed).
    fn n_entries(&self) -> usize;

    /// Entries in `range`, in insertion order.
    fn get_entries(&self, range: EntryRange) -> StoreResult<Vec<E>>;

    /// Key of the dataset.
    fn key(&self) -> &str {
        &self.metadata().key
    }
}

/// Add every entry of an iterator.
pub fn add_all<E, D>(dataset: &mut D, entries: impl IntoIterator<Item = E>) -> StoreResult<()>
where
    E: OperationEntry,
    D: OperationDataSet<E> + ?Sized,
{
    for entry in entries {
        dataset.add_entry(entry)?;
    }
    Ok(())
}

/// Visit a sealed dataset in consecutive ranges of at most `chunk` entries,
/// so consumers never hold more than one chunk in memory.
pub fn for_each_chunk<E, D, F>(dataset: &D, chunk: usize, mut f: F) -> anyhow::Result<()>
where
    E: OperationEntry,
    D: OperationDataSet<E> + ?Sized,
    F: FnMut(Vec<E>) -> anyhow::Result<()>,
{
    let chunk = chunk.max(1);
    let n = dataset.n_entries();
    let mut start = 0;
    while start < n {
        let end = (start + chunk).min(n);
        f(dataset.get_entries(EntryRange::new(start, end))?)?;
        start = end;
    }
    Ok(())
}

/// Project one field out of every entry, reading in store batches.
pub fn column<E, D, T, F>(dataset: &D, f: F) -> StoreResult<Vec<T>>
where
    E: OperationEntry,
    D: OperationDataSet<E> + ?Sized,
    F: Fn(&E) -> T,
{
    const CHUNK: usize = 65_536;
    let n = dataset.n_entries();
    let mut out = Vec::with_capacity(n);
    let mut start = 0;
    while start < n {
        let end = (start + CHUNK).min(n);
        out.extend(dataset.get_entries(EntryRange::new(start, end))?.iter().map(&f));
        start = end;
    }
    Ok(out)
}
