//! Settings and plumbing shared by every pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::progress::{NoProgress, ProgressSink};
use crate::store::OperationStore;

pub const MIN_BATCH_SIZE: usize = 16;
pub const MAX_BATCH_SIZE: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on markers held in memory at once; drives read chunk
    /// and write batch sizes.
    pub max_markers_in_memory: usize,
    /// Process marker chunks on the rayon pool.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_markers_in_memory: 100_000,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    /// Entries per read chunk / write batch, clamped to
    /// `[MIN_BATCH_SIZE, MAX_BATCH_SIZE]`.
    pub fn batch_size(&self) -> usize {
        self.max_markers_in_memory.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }
}

/// Cooperative cancellation, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// A sealed dataset was written under `key`.
    Completed { key: String, n_entries: usize },
    /// Filtering left no markers or no samples; nothing was written.
    NoDataRemaining,
    /// The cancel flag was raised; the partial dataset was discarded.
    Cancelled,
}

impl PipelineOutcome {
    /// Key of the written dataset, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Completed { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// What a pipeline run needs besides its own inputs.
pub struct PipelineContext<'a> {
    pub store: &'a OperationStore,
    pub progress: &'a dyn ProgressSink,
    pub cancel: CancelFlag,
    pub config: PipelineConfig,
}

impl<'a> PipelineContext<'a> {
    /// Default config, no progress, never cancelled.
    pub fn new(store: &'a OperationStore) -> Self {
        Self {
            store,
            progress: &NoProgress,
            cancel: CancelFlag::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
