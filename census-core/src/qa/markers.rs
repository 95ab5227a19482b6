//! Per-marker quality assurance.
//!
//! One entry per marker in stored order: missing ratio, mismatch state,
//! major/minor alleles with frequencies, and the compact allele and
//! genotype histograms.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use census_geno::{Chromosome, Genotype};

use crate::pipeline::{PipelineContext, PipelineOutcome};
use crate::progress::fraction;
use crate::source::StudySource;
use crate::stats::reducer::summarize;
use crate::stats::RawMarkerStatistics;
use crate::store::{
    column, OperationDataSet, OperationEntry, OperationKind, OperationMetadata, StoreResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaMarkersEntry {
    /// Marker index in the source matrix.
    pub index: usize,
    pub key: String,
    pub chromosome: Chromosome,
    /// Missing calls over the samples in the matrix view.
    pub missing_ratio: f64,
    pub mismatch: bool,
    pub major: u8,
    pub major_frequency: f64,
    /// `'0'` for monomorphic, empty or mismatched markers.
    pub minor: u8,
    pub minor_frequency: f64,
    /// `[major, minor, missing, other]` allele occurrences.
    pub allele_histogram: [u32; 4],
    /// Ordered genotypes over `(major, minor, missing)` plus remainder.
    pub genotype_histogram: [u32; 10],
}

impl OperationEntry for QaMarkersEntry {
    const KINDS: &'static [OperationKind] = &[OperationKind::QaMarkers];

    fn origin_index(&self) -> usize {
        self.index
    }
}

/// Build the QA entry of one marker from a gathered accumulator.
pub fn qa_entry_from_raw(
    index: usize,
    key: &str,
    chromosome: Chromosome,
    raw: &RawMarkerStatistics,
    n_samples: usize,
) -> QaMarkersEntry {
    let summary = summarize(raw);
    let missing_ratio = if n_samples == 0 {
        0.0
    } else {
        summary.missing_count as f64 / n_samples as f64
    };

    QaMarkersEntry {
        index,
        key: key.to_string(),
        chromosome,
        missing_ratio,
        mismatch: summary.alleles.mismatch,
        major: summary.alleles.major,
        major_frequency: summary.alleles.major_frequency,
        minor: summary.alleles.minor,
        minor_frequency: summary.alleles.minor_frequency(),
        allele_histogram: summary.allele_histogram,
        genotype_histogram: summary.genotype_histogram,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QaStage {
    Initializing,
    Running,
    Finalizing,
    Completed,
}

/// Run marker QA over the current view of `source.matrix`.
pub fn run_qa_markers(source: &mut StudySource, ctx: &PipelineContext) -> Result<PipelineOutcome> {
    let mut stage = QaStage::Initializing;
    info!("QA markers: {:?}", stage);

    let phenotypes = source.view_phenotypes();
    let n_markers = source.matrix.n_markers();
    let n_samples = source.matrix.n_samples();
    let chromosomes = source.matrix.marker_chromosomes()?;
    let n_chromosomes = count_distinct(&chromosomes);

    let key = ctx.store.next_key(OperationKind::QaMarkers);
    let metadata = OperationMetadata::new(&key, OperationKind::QaMarkers, &source.name)
        .with_counts(n_markers, n_samples, n_chromosomes)
        .with_description(format!(
            "Marker QA over {} markers x {} samples",
            n_markers, n_samples
        ));
    let mut dataset = ctx
        .store
        .create_batched::<QaMarkersEntry>(metadata, ctx.config.batch_size())?;

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    stage = QaStage::Running;
    info!("QA markers: {:?} ({} markers)", stage, n_markers);

    let mut raw = RawMarkerStatistics::new();
    let mut genotypes: Vec<Genotype> = Vec::with_capacity(n_samples);
    for index in 0..n_markers {
        let marker = source.matrix.marker_info(index)?;
        source
            .matrix
            .read_marker_into(index, &mut genotypes)
            .with_context(|| format!("Failed to read marker {} ({})", index, marker.id))?;

        let chrom = marker.chromosome();
        raw.gather(&chrom, &phenotypes.sexes, &phenotypes.affections, &genotypes);
        dataset.add_entry(qa_entry_from_raw(index, &marker.id, chrom, &raw, n_samples))?;

        ctx.progress.report(fraction(index, n_markers), index);
    }

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    stage = QaStage::Finalizing;
    info!("QA markers: {:?}", stage);
    dataset.finish_writing()?;

    stage = QaStage::Completed;
    info!("QA markers: {:?}, wrote {}", stage, key);
    Ok(PipelineOutcome::Completed {
        key,
        n_entries: dataset.n_entries(),
    })
}

pub(crate) fn count_distinct(labels: &[String]) -> usize {
    labels
        .iter()
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// Typed reads over a sealed marker QA dataset.
pub trait QaMarkersReader {
    fn missing_ratios(&self) -> StoreResult<Vec<f64>>;
    fn mismatch_states(&self) -> StoreResult<Vec<bool>>;
    fn known_alleles(&self) -> StoreResult<Vec<(u8, u8)>>;
}

impl<T> QaMarkersReader for T
where
    T: OperationDataSet<QaMarkersEntry> + ?Sized,
{
    fn missing_ratios(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.missing_ratio)
    }

    fn mismatch_states(&self) -> StoreResult<Vec<bool>> {
        column(self, |e| e.mismatch)
    }

    fn known_alleles(&self) -> StoreResult<Vec<(u8, u8)>> {
        column(self, |e| (e.major, e.minor))
    }
}
