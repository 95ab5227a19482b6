//! Hardy-Weinberg equilibrium test on census CONTROL and ALTERNATE counts.
//!
//! With n = AA + Aa + aa and pA = (2 AA + Aa) / 2n, the expected counts are
//! n pA^2, 2n pA pa and n pa^2. The statistic is a 1 df Pearson chi-square
//! over the terms with non-zero expectation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::census::{Census, CensusEntry};
use crate::pipeline::{PipelineContext, PipelineOutcome};
use crate::progress::fraction;
use crate::store::{
    column, for_each_chunk, OperationDataSet, OperationEntry, OperationKind, OperationMetadata,
    StoreResult,
};
use crate::util::math::chi_square_pvalue;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HwResult {
    pub p_value: f64,
    pub observed_het: f64,
    pub expected_het: f64,
}

impl HwResult {
    const UNDEFINED: HwResult = HwResult {
        p_value: f64::NAN,
        observed_het: f64::NAN,
        expected_het: f64::NAN,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardyWeinbergEntry {
    pub index: usize,
    pub key: String,
    pub control: HwResult,
    pub alternate: HwResult,
}

impl OperationEntry for HardyWeinbergEntry {
    const KINDS: &'static [OperationKind] = &[OperationKind::HardyWeinberg];

    fn origin_index(&self) -> usize {
        self.index
    }
}

pub fn hardy_weinberg(census: &Census) -> HwResult {
    let (aa_major, het, aa_minor) = (
        census.hom_major as f64,
        census.het as f64,
        census.hom_minor as f64,
    );
    let n = aa_major + het + aa_minor;
    if n == 0.0 {
        return HwResult::UNDEFINED;
    }

    let p = (2.0 * aa_major + het) / (2.0 * n);
    let q = 1.0 - p;
    let observed = [aa_major, het, aa_minor];
    let expected = [n * p * p, 2.0 * n * p * q, n * q * q];

    let statistic: f64 = observed
        .iter()
        .zip(&expected)
        .filter(|&(_, &e)| e > 0.0)
        .map(|(&o, &e)| (o - e).powi(2) / e)
        .sum();

    HwResult {
        p_value: chi_square_pvalue(statistic, 1.0),
        observed_het: het / n,
        expected_het: 2.0 * p * q,
    }
}

fn entry_for(census: &CensusEntry) -> HardyWeinbergEntry {
    HardyWeinbergEntry {
        index: census.index,
        key: census.key.clone(),
        control: hardy_weinberg(&census.census.control),
        alternate: hardy_weinberg(&census.census.alternate),
    }
}

/// Test every marker of the census dataset `census_key`.
pub fn run_hardy_weinberg(census_key: &str, ctx: &PipelineContext) -> Result<PipelineOutcome> {
    let census = ctx
        .store
        .open::<CensusEntry>(census_key)
        .with_context(|| format!("Failed to open census {}", census_key))?;
    let source = census.metadata();
    let n_markers = census.n_entries();
    info!("Hardy-Weinberg: {} markers from {}", n_markers, census_key);

    let key = ctx.store.next_key(OperationKind::HardyWeinberg);
    let metadata = OperationMetadata::new(&key, OperationKind::HardyWeinberg, census_key)
        .with_counts(source.n_markers, source.n_samples, source.n_chromosomes)
        .with_description(format!("Hardy-Weinberg test on {}", census_key));
    let batch_size = ctx.config.batch_size();
    let mut dataset = ctx
        .store
        .create_batched::<HardyWeinbergEntry>(metadata, batch_size)?;

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    let mut done = 0usize;
    for_each_chunk(&*census, batch_size, |chunk| {
        for entry in &chunk {
            dataset.add_entry(entry_for(entry))?;
        }
        done += chunk.len();
        if let Some(last) = chunk.last() {
            ctx.progress.report(fraction(done - 1, n_markers), last.index);
        }
        Ok(())
    })?;

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }
    dataset.finish_writing()?;

    info!("Hardy-Weinberg: wrote {}", key);
    Ok(PipelineOutcome::Completed {
        key,
        n_entries: dataset.n_entries(),
    })
}

/// Typed reads over a sealed Hardy-Weinberg dataset.
pub trait HardyWeinbergReader {
    fn control_p_values(&self) -> StoreResult<Vec<f64>>;
    fn alternate_p_values(&self) -> StoreResult<Vec<f64>>;
}

impl<T> HardyWeinbergReader for T
where
    T: OperationDataSet<HardyWeinbergEntry> + ?Sized,
{
    fn control_p_values(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.control.p_value)
    }

    fn alternate_p_values(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.alternate.p_value)
    }
}
