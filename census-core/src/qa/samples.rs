//! Per-sample quality assurance.
//!
//! Streams the matrix markers-major and keeps three counters per sample:
//! applicable calls, missing calls and heterozygous calls. A call on a
//! marker that does not apply to the sample (female on Y) is not counted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use census_geno::allele::is_missing;
use census_geno::Genotype;

use crate::decision::decide_all;
use crate::pipeline::{PipelineContext, PipelineOutcome};
use crate::progress::fraction;
use crate::qa::markers::count_distinct;
use crate::source::StudySource;
use crate::store::{
    column, OperationDataSet, OperationEntry, OperationKind, OperationMetadata, StoreResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSamplesEntry {
    /// Sample index in the full matrix sample list.
    pub index: usize,
    pub key: String,
    pub missing_count: u32,
    pub missing_ratio: f64,
    pub heterozygous_count: u32,
    pub heterozygosity_ratio: f64,
}

impl OperationEntry for QaSamplesEntry {
    const KINDS: &'static [OperationKind] = &[OperationKind::QaSamples];

    fn origin_index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SampleCounters {
    counted: u32,
    missing: u32,
    heterozygous: u32,
}

impl SampleCounters {
    fn add(&mut self, gt: &Genotype) {
        self.counted += 1;
        match (is_missing(gt[0]), is_missing(gt[1])) {
            (true, true) => self.missing += 1,
            (false, false) if gt[0] != gt[1] => self.heterozygous += 1,
            _ => {}
        }
    }

    fn missing_ratio(&self) -> f64 {
        if self.counted == 0 {
            0.0
        } else {
            self.missing as f64 / self.counted as f64
        }
    }

    fn heterozygosity_ratio(&self) -> f64 {
        let called = self.counted - self.missing;
        if called == 0 {
            0.0
        } else {
            self.heterozygous as f64 / called as f64
        }
    }
}

/// Run sample QA over every sample of `source.matrix`.
///
/// Any sample subset on the matrix is cleared first, so entry indices are
/// positions in the full sample list.
pub fn run_qa_samples(source: &mut StudySource, ctx: &PipelineContext) -> Result<PipelineOutcome> {
    source.matrix.clear_sample_subset();

    let phenotypes = source.view_phenotypes();
    let samples = source.matrix.sample_keys().to_vec();
    let n_samples = samples.len();
    let n_markers = source.matrix.n_markers();
    let n_chromosomes = count_distinct(&source.matrix.marker_chromosomes()?);
    info!("QA samples: {} samples over {} markers", n_samples, n_markers);

    let key = ctx.store.next_key(OperationKind::QaSamples);
    let metadata = OperationMetadata::new(&key, OperationKind::QaSamples, &source.name)
        .with_counts(n_markers, n_samples, n_chromosomes)
        .with_description(format!("Sample QA over {} samples", n_samples));
    let mut dataset = ctx
        .store
        .create_batched::<QaSamplesEntry>(metadata, ctx.config.batch_size())?;

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    let mut counters = vec![SampleCounters::default(); n_samples];
    let mut genotypes: Vec<Genotype> = Vec::with_capacity(n_samples);
    for index in 0..n_markers {
        let marker = source.matrix.marker_info(index)?;
        source
            .matrix
            .read_marker_into(index, &mut genotypes)
            .with_context(|| format!("Failed to read marker {} ({})", index, marker.id))?;

        let decisions = decide_all(&marker.chromosome(), &phenotypes.sexes);
        for ((counter, gt), decision) in counters.iter_mut().zip(&genotypes).zip(decisions) {
            if decision.counts_toward_missing() {
                counter.add(gt);
            }
        }
        ctx.progress.report(fraction(index, n_markers), index);
    }

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    for (index, (sample, c)) in samples.iter().zip(&counters).enumerate() {
        dataset.add_entry(QaSamplesEntry {
            index,
            key: sample.to_string(),
            missing_count: c.missing,
            missing_ratio: c.missing_ratio(),
            heterozygous_count: c.heterozygous,
            heterozygosity_ratio: c.heterozygosity_ratio(),
        })?;
    }
    dataset.finish_writing()?;

    info!("QA samples: wrote {}", key);
    Ok(PipelineOutcome::Completed {
        key,
        n_entries: dataset.n_entries(),
    })
}

/// Typed reads over a sealed sample QA dataset.
pub trait QaSamplesReader {
    fn missing_ratios(&self) -> StoreResult<Vec<f64>>;
    fn heterozygosity_ratios(&self) -> StoreResult<Vec<f64>>;
    fn sample_keys(&self) -> StoreResult<Vec<String>>;
}

impl<T> QaSamplesReader for T
where
    T: OperationDataSet<QaSamplesEntry> + ?Sized,
{
    fn missing_ratios(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.missing_ratio)
    }

    fn heterozygosity_ratios(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.heterozygosity_ratio)
    }

    fn sample_keys(&self) -> StoreResult<Vec<String>> {
        column(self, |e| e.key.clone())
    }
}
