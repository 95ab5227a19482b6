//! Marker census pipeline: PICK -> PROCESS -> WRITE -> DONE.
//!
//! PROCESS reads retained markers in chunks of the configured batch size.
//! Each chunk is counted sequentially or on the rayon pool (one accumulator
//! per worker); results are appended in marker order either way.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use census_geno::sample::SamplePhenotypes;
use census_geno::{Genotype, MarkerInfo};

use super::pick::{pick, CensusThresholds, PickOutcome, Selection};
use super::{census_from_statistics, CensusEntry};
use crate::pipeline::{PipelineContext, PipelineOutcome};
use crate::progress::fraction;
use crate::qa::markers::count_distinct;
use crate::source::StudySource;
use crate::stats::RawMarkerStatistics;
use crate::store::{add_all, OperationDataSet, OperationKind, OperationMetadata};

/// Inputs of one census run besides the matrix.
#[derive(Debug, Clone, Serialize)]
pub struct CensusRequest {
    /// Key of the marker QA dataset.
    pub qa_markers: String,
    /// Key of the sample QA dataset.
    pub qa_samples: String,
    pub thresholds: CensusThresholds,
}

impl CensusRequest {
    pub fn new(qa_markers: impl Into<String>, qa_samples: impl Into<String>) -> Self {
        Self {
            qa_markers: qa_markers.into(),
            qa_samples: qa_samples.into(),
            thresholds: CensusThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: CensusThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CensusStage {
    Pick,
    Process,
    Write,
    Done,
}

struct MarkerRead {
    index: usize,
    info: MarkerInfo,
    genotypes: Vec<Genotype>,
}

fn census_entry(
    raw: &mut RawMarkerStatistics,
    marker: &MarkerRead,
    phenotypes: &SamplePhenotypes,
) -> CensusEntry {
    let chromosome = marker.info.chromosome();
    raw.gather(
        &chromosome,
        &phenotypes.sexes,
        &phenotypes.affections,
        &marker.genotypes,
    );
    let (major, minor, census) = census_from_statistics(raw);
    CensusEntry {
        index: marker.index,
        key: marker.info.id.clone(),
        chromosome,
        major,
        minor,
        census,
    }
}

/// Run a census over the markers and samples that pass the QA thresholds.
///
/// Returns [`PipelineOutcome::NoDataRemaining`] without writing anything
/// when PICK leaves no markers or no samples.
pub fn run_census(
    source: &mut StudySource,
    request: &CensusRequest,
    ctx: &PipelineContext,
) -> Result<PipelineOutcome> {
    let mut stage = CensusStage::Pick;
    info!("Census: {:?}", stage);
    let selection = match pick(
        ctx.store,
        &request.qa_markers,
        &request.qa_samples,
        &request.thresholds,
    )? {
        PickOutcome::Selected(selection) => selection,
        PickOutcome::NoDataRemaining => return Ok(PipelineOutcome::NoDataRemaining),
    };
    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    stage = CensusStage::Process;
    info!(
        "Census: {:?} ({} markers x {} samples)",
        stage,
        selection.markers.len(),
        selection.samples.len()
    );

    source
        .matrix
        .set_sample_subset(&selection.samples)
        .context("Failed to apply the retained sample subset")?;
    let result = process_and_write(source, request, &selection, ctx);
    source.matrix.clear_sample_subset();
    result
}

fn process_and_write(
    source: &mut StudySource,
    request: &CensusRequest,
    selection: &Selection,
    ctx: &PipelineContext,
) -> Result<PipelineOutcome> {
    let phenotypes = source.view_phenotypes();
    let batch_size = ctx.config.batch_size();

    let chromosomes = selection
        .markers
        .iter()
        .map(|&i| source.matrix.marker_info(i).map(|m| m.chrom))
        .collect::<Result<Vec<_>>>()?;

    let key = ctx.store.next_key(OperationKind::MarkerCensus);
    let metadata = OperationMetadata::new(&key, OperationKind::MarkerCensus, &request.qa_markers)
        .with_counts(
            selection.markers.len(),
            selection.samples.len(),
            count_distinct(&chromosomes),
        )
        .with_description(format!("Marker census from {}", request.qa_markers))
        .with_params(serde_json::to_value(request)?);
    let mut dataset = ctx
        .store
        .create_batched::<CensusEntry>(metadata, batch_size)?;

    let n_markers = selection.markers.len();
    let mut done = 0usize;
    let mut raw = RawMarkerStatistics::with_categories();

    for chunk in selection.markers.chunks(batch_size) {
        let mut reads = Vec::with_capacity(chunk.len());
        for &index in chunk {
            let info = source.matrix.marker_info(index)?;
            let genotypes = source
                .matrix
                .read_marker(index)
                .with_context(|| format!("Failed to read marker {} ({})", index, info.id))?;
            reads.push(MarkerRead {
                index,
                info,
                genotypes,
            });
        }

        let entries: Vec<CensusEntry> = if ctx.config.parallel {
            reads
                .par_iter()
                .map_init(RawMarkerStatistics::with_categories, |raw, m| {
                    census_entry(raw, m, &phenotypes)
                })
                .collect()
        } else {
            reads
                .iter()
                .map(|m| census_entry(&mut raw, m, &phenotypes))
                .collect()
        };

        add_all(dataset.as_mut(), entries)?;
        done += chunk.len();
        debug!("Census: {}/{} markers counted", done, n_markers);
        ctx.progress
            .report(fraction(done - 1, n_markers), chunk[chunk.len() - 1]);
    }

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    let mut stage = CensusStage::Write;
    info!("Census: {:?}", stage);
    dataset.finish_writing()?;

    stage = CensusStage::Done;
    info!("Census: {:?}, wrote {} ({} markers)", stage, key, dataset.n_entries());
    Ok(PipelineOutcome::Completed {
        key,
        n_entries: dataset.n_entries(),
    })
}
