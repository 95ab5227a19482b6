//! Directory-backed dataset backend.
//!
//! Layout of one dataset `<key>` inside the store directory:
//! - `<key>.entries.bin`: records back to back, each a u64 LE payload
//!   length followed by the bincode payload.
//! - `<key>.offsets.bin`: n + 1 u64 LE record start offsets, the last one
//!   being the total length of the entries file.
//! - `<key>.meta.json`: [`OperationMetadata`], written last; its presence
//!   marks the dataset as sealed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use super::{
    check_kind, track_origin, EntryRange, OperationDataSet, OperationEntry, OperationMetadata,
    StoreError, StoreResult,
};

const ENTRIES_SUFFIX: &str = "entries.bin";
const OFFSETS_SUFFIX: &str = "offsets.bin";
const META_SUFFIX: &str = "meta.json";
const LEN_PREFIX: usize = std::mem::size_of::<u64>();

pub(crate) fn dataset_path(dir: &Path, key: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}.{}", key, suffix))
}

pub(crate) fn meta_path(dir: &Path, key: &str) -> PathBuf {
    dataset_path(dir, key, META_SUFFIX)
}

/// Key of a metadata file name, if it is one.
pub(crate) fn key_of_meta_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(META_SUFFIX)
        .and_then(|s| s.strip_suffix('.'))
}

pub(crate) fn read_metadata(dir: &Path, key: &str) -> StoreResult<OperationMetadata> {
    let path = meta_path(dir, key);
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::UnknownOperation(key.to_string()))
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Remove the data files of a dataset whose writer died before sealing.
fn remove_stale_files(dir: &Path, key: &str) -> StoreResult<()> {
    for suffix in [ENTRIES_SUFFIX, OFFSETS_SUFFIX] {
        let path = dataset_path(dir, key, suffix);
        match fs::remove_file(&path) {
            Ok(()) => warn!("Removed {} left by an unfinished run", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }
    Ok(())
}

struct Writer {
    out: BufWriter<File>,
    offsets: Vec<u64>,
    position: u64,
}

pub struct FileDataSet<E: OperationEntry> {
    dir: PathBuf,
    metadata: OperationMetadata,
    batch_size: usize,
    buffer: Vec<E>,
    writer: Option<Writer>,
    /// Record offsets of a sealed dataset.
    offsets: Vec<u64>,
    mmap: Option<Mmap>,
    n_entries: usize,
    sealed: bool,
    last_origin: Option<usize>,
    _entry: PhantomData<fn() -> E>,
}

impl<E: OperationEntry> FileDataSet<E> {
    /// Start a new dataset in `dir`. Fails if a sealed dataset with the same
    /// key exists there; data files of an unsealed one are removed first.
    pub fn create(
        dir: impl Into<PathBuf>,
        metadata: OperationMetadata,
        batch_size: usize,
    ) -> StoreResult<Self> {
        check_kind::<E>(&metadata)?;
        let dir = dir.into();

        if meta_path(&dir, &metadata.key).exists() {
            return Err(StoreError::AlreadyExists(metadata.key));
        }
        remove_stale_files(&dir, &metadata.key)?;
        let entries_path = dataset_path(&dir, &metadata.key, ENTRIES_SUFFIX);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&entries_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(metadata.key))
            }
            Err(e) => return Err(StoreError::io(entries_path, e)),
        };

        let batch_size = batch_size.max(1);
        Ok(Self {
            dir,
            metadata,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            writer: Some(Writer {
                out: BufWriter::new(file),
                offsets: vec![0],
                position: 0,
            }),
            offsets: Vec::new(),
            mmap: None,
            n_entries: 0,
            sealed: false,
            last_origin: None,
            _entry: PhantomData,
        })
    }

    /// Open a sealed dataset for reading.
    pub fn open(dir: impl Into<PathBuf>, key: &str) -> StoreResult<Self> {
        let dir = dir.into();
        let metadata = read_metadata(&dir, key)?;
        check_kind::<E>(&metadata)?;

        let corrupt = |message: String| StoreError::Corrupt {
            key: key.to_string(),
            message,
        };

        let offsets_path = dataset_path(&dir, key, OFFSETS_SUFFIX);
        let raw = fs::read(&offsets_path).map_err(|e| StoreError::io(&offsets_path, e))?;
        if raw.len() % LEN_PREFIX != 0 {
            return Err(corrupt(format!(
                "offsets file length {} is not a multiple of {}",
                raw.len(),
                LEN_PREFIX
            )));
        }
        let offsets: Vec<u64> = raw
            .chunks_exact(LEN_PREFIX)
            .map(|c| {
                let mut b = [0u8; LEN_PREFIX];
                b.copy_from_slice(c);
                u64::from_le_bytes(b)
            })
            .collect();
        if offsets.len() != metadata.n_entries + 1 {
            return Err(corrupt(format!(
                "{} offsets recorded for {} entries",
                offsets.len(),
                metadata.n_entries
            )));
        }

        let entries_path = dataset_path(&dir, key, ENTRIES_SUFFIX);
        let file = File::open(&entries_path).map_err(|e| StoreError::io(&entries_path, e))?;
        let len = file
            .metadata()
            .map_err(|e| StoreError::io(&entries_path, e))?
            .len();
        let expected = offsets.last().copied().unwrap_or(0);
        if len != expected {
            return Err(corrupt(format!(
                "entries file holds {} bytes, offsets expect {}",
                len, expected
            )));
        }

        // Zero-length files cannot be mapped on every platform.
        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file) }.map_err(|e| StoreError::io(&entries_path, e))?)
        };

        debug!("Opened {} ({} entries, {} bytes)", key, metadata.n_entries, len);

        Ok(Self {
            dir,
            n_entries: metadata.n_entries,
            metadata,
            batch_size: 1,
            buffer: Vec::new(),
            writer: None,
            offsets,
            mmap,
            sealed: true,
            last_origin: None,
            _entry: PhantomData,
        })
    }

    fn flush(&mut self) -> StoreResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let path = dataset_path(&self.dir, &self.metadata.key, ENTRIES_SUFFIX);
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::Sealed(self.metadata.key.clone()))?;

        for entry in self.buffer.drain(..) {
            let payload = bincode::serialize(&entry)?;
            writer
                .out
                .write_all(&(payload.len() as u64).to_le_bytes())
                .and_then(|_| writer.out.write_all(&payload))
                .map_err(|e| StoreError::io(&path, e))?;
            writer.position += (LEN_PREFIX + payload.len()) as u64;
            writer.offsets.push(writer.position);
        }
        debug!(
            "{}: flushed batch, {} entries on disk",
            self.metadata.key,
            writer.offsets.len() - 1
        );
        Ok(())
    }

    fn record(&self, index: usize) -> StoreResult<E> {
        let corrupt = |message: &str| StoreError::Corrupt {
            key: self.metadata.key.clone(),
            message: format!("entry {}: {}", index, message),
        };
        let bytes: &[u8] = self.mmap.as_deref().unwrap_or(&[]);
        let start = self.offsets[index] as usize;
        let end = self.offsets[index + 1] as usize;
        if start + LEN_PREFIX > end || end > bytes.len() {
            return Err(corrupt("record bounds out of range"));
        }

        let mut len = [0u8; LEN_PREFIX];
        len.copy_from_slice(&bytes[start..start + LEN_PREFIX]);
        let payload = &bytes[start + LEN_PREFIX..end];
        if u64::from_le_bytes(len) != payload.len() as u64 {
            return Err(corrupt("length prefix disagrees with offsets"));
        }
        Ok(bincode::deserialize(payload)?)
    }

    fn discard(&self) {
        for suffix in [ENTRIES_SUFFIX, OFFSETS_SUFFIX, META_SUFFIX] {
            let path = dataset_path(&self.dir, &self.metadata.key, suffix);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

impl<E: OperationEntry> OperationDataSet<E> for FileDataSet<E> {
    fn metadata(&self) -> &OperationMetadata {
        &self.metadata
    }

    fn add_entry(&mut self, entry: E) -> StoreResult<()> {
        if self.sealed {
            return Err(StoreError::Sealed(self.metadata.key.clone()));
        }
        track_origin(&mut self.last_origin, &entry, &self.metadata.key);
        self.buffer.push(entry);
        self.n_entries += 1;
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish_writing(&mut self) -> StoreResult<()> {
        if self.sealed {
            return Err(StoreError::Sealed(self.metadata.key.clone()));
        }
        self.flush()?;

        let Writer {
            mut out, offsets, ..
        } = self
            .writer
            .take()
            .ok_or_else(|| StoreError::Sealed(self.metadata.key.clone()))?;

        let entries_path = dataset_path(&self.dir, &self.metadata.key, ENTRIES_SUFFIX);
        out.flush().map_err(|e| StoreError::io(&entries_path, e))?;
        drop(out);

        let offsets_path = dataset_path(&self.dir, &self.metadata.key, OFFSETS_SUFFIX);
        let raw: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        fs::write(&offsets_path, raw).map_err(|e| StoreError::io(&offsets_path, e))?;

        self.metadata.n_entries = self.n_entries;
        let meta = meta_path(&self.dir, &self.metadata.key);
        let json = serde_json::to_vec_pretty(&self.metadata)?;
        fs::write(&meta, json).map_err(|e| StoreError::io(&meta, e))?;

        let total = offsets.last().copied().unwrap_or(0);
        if total > 0 {
            let file = File::open(&entries_path).map_err(|e| StoreError::io(&entries_path, e))?;
            self.mmap =
                Some(unsafe { Mmap::map(&file) }.map_err(|e| StoreError::io(&entries_path, e))?);
        }
        self.offsets = offsets;
        self.sealed = true;

        debug!(
            "Sealed {} with {} entries ({} bytes)",
            self.metadata.key, self.n_entries, total
        );
        Ok(())
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn n_entries(&self) -> usize {
        self.n_entries
    }

    fn get_entries(&self, range: EntryRange) -> StoreResult<Vec<E>> {
        if !self.sealed {
            return Err(StoreError::NotSealed(self.metadata.key.clone()));
        }
        range
            .resolve(self.n_entries)?
            .map(|i| self.record(i))
            .collect()
    }
}

impl<E: OperationEntry> Drop for FileDataSet<E> {
    fn drop(&mut self) {
        if !self.sealed {
            debug!("Discarding unsealed dataset {}", self.metadata.key);
            self.discard();
        }
    }
}
