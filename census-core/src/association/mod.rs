//! Case/control association tests on a marker census.
//!
//! Markers whose ALTERNATE Hardy-Weinberg p-value falls below the threshold
//! are skipped; every other marker gets one entry, with NaN statistics where
//! its tables make a test undefined.

pub mod allelic;
pub mod genotypic;
pub mod report;
pub mod trend;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::census::{Census, CensusEntry};
use crate::hardy_weinberg::HardyWeinbergEntry;
use crate::pipeline::{PipelineContext, PipelineOutcome};
use crate::progress::fraction;
use crate::store::{
    column, EntryRange, OperationDataSet, OperationEntry, OperationKind, OperationMetadata,
    StoreResult,
};

pub use allelic::allelic_test;
pub use genotypic::genotypic_test;
pub use report::{write_result_line, write_results_header};
pub use trend::trend_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationTest {
    Allelic,
    Genotypic,
    Trend,
}

impl AssociationTest {
    pub fn kind(self) -> OperationKind {
        match self {
            AssociationTest::Allelic => OperationKind::AllelicTest,
            AssociationTest::Genotypic => OperationKind::GenotypicTest,
            AssociationTest::Trend => OperationKind::TrendTest,
        }
    }

    pub fn run(self, case: &Census, control: &Census) -> TestResult {
        match self {
            AssociationTest::Allelic => allelic_test(case, control),
            AssociationTest::Genotypic => genotypic_test(case, control),
            AssociationTest::Trend => trend_test(case, control),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub odds_ratio: f64,
    /// Heterozygote odds ratio (genotypic test only).
    pub odds_ratio_het: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationEntry {
    pub index: usize,
    pub key: String,
    pub test: AssociationTest,
    pub result: TestResult,
}

impl OperationEntry for AssociationEntry {
    const KINDS: &'static [OperationKind] = &[
        OperationKind::AllelicTest,
        OperationKind::GenotypicTest,
        OperationKind::TrendTest,
    ];

    fn origin_index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssociationRequest {
    pub census: String,
    pub hardy_weinberg: String,
    pub test: AssociationTest,
    /// Minimum ALTERNATE Hardy-Weinberg p-value; defaults to
    /// `0.05 / n_markers`.
    pub hw_threshold: Option<f64>,
}

impl AssociationRequest {
    pub fn new(
        census: impl Into<String>,
        hardy_weinberg: impl Into<String>,
        test: AssociationTest,
    ) -> Self {
        Self {
            census: census.into(),
            hardy_weinberg: hardy_weinberg.into(),
            test,
            hw_threshold: None,
        }
    }

    pub fn with_hw_threshold(mut self, threshold: f64) -> Self {
        self.hw_threshold = Some(threshold);
        self
    }
}

/// Run one association test over a census and its Hardy-Weinberg result.
pub fn run_association(
    request: &AssociationRequest,
    ctx: &PipelineContext,
) -> Result<PipelineOutcome> {
    let census = ctx
        .store
        .open::<CensusEntry>(&request.census)
        .with_context(|| format!("Failed to open census {}", request.census))?;
    let hw = ctx
        .store
        .open::<HardyWeinbergEntry>(&request.hardy_weinberg)
        .with_context(|| format!("Failed to open Hardy-Weinberg {}", request.hardy_weinberg))?;

    let n_markers = census.n_entries();
    if hw.n_entries() != n_markers {
        bail!(
            "{} has {} entries but census {} has {}",
            request.hardy_weinberg,
            hw.n_entries(),
            request.census,
            n_markers
        );
    }
    let threshold = request
        .hw_threshold
        .unwrap_or(0.05 / n_markers.max(1) as f64);
    info!(
        "{:?} test on {} markers, HW threshold {:e}",
        request.test, n_markers, threshold
    );

    let kind = request.test.kind();
    let key = ctx.store.next_key(kind);
    let source = census.metadata();
    let mut params = serde_json::to_value(request)?;
    params["hw_threshold"] = serde_json::json!(threshold);
    let metadata = OperationMetadata::new(&key, kind, &request.census)
        .with_counts(source.n_markers, source.n_samples, source.n_chromosomes)
        .with_description(format!("{:?} test on {}", request.test, request.census))
        .with_params(params);
    let batch_size = ctx.config.batch_size();
    let mut dataset = ctx
        .store
        .create_batched::<AssociationEntry>(metadata, batch_size)?;

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }

    let mut skipped = 0usize;
    let mut start = 0;
    while start < n_markers {
        let end = (start + batch_size).min(n_markers);
        let range = EntryRange::new(start, end);
        let markers = census.get_entries(range)?;
        let hw_results = hw.get_entries(range)?;

        for (marker, hw_result) in markers.iter().zip(&hw_results) {
            if marker.index != hw_result.index {
                bail!(
                    "{} is not aligned with census {} at marker {}",
                    request.hardy_weinberg,
                    request.census,
                    marker.key
                );
            }
            if hw_result.alternate.p_value < threshold {
                skipped += 1;
                continue;
            }
            dataset.add_entry(AssociationEntry {
                index: marker.index,
                key: marker.key.clone(),
                test: request.test,
                result: request
                    .test
                    .run(&marker.census.case, &marker.census.control),
            })?;
        }

        ctx.progress
            .report(fraction(end - 1, n_markers), markers[markers.len() - 1].index);
        start = end;
    }

    if ctx.cancelled() {
        return Ok(PipelineOutcome::Cancelled);
    }
    dataset.finish_writing()?;

    info!(
        "{:?} test: wrote {} ({} markers, {} skipped for Hardy-Weinberg)",
        request.test,
        key,
        dataset.n_entries(),
        skipped
    );
    Ok(PipelineOutcome::Completed {
        key,
        n_entries: dataset.n_entries(),
    })
}

/// Typed reads over a sealed association dataset.
pub trait AssociationReader {
    fn p_values(&self) -> StoreResult<Vec<f64>>;
    fn odds_ratios(&self) -> StoreResult<Vec<f64>>;
}

impl<T> AssociationReader for T
where
    T: OperationDataSet<AssociationEntry> + ?Sized,
{
    fn p_values(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.result.p_value)
    }

    fn odds_ratios(&self) -> StoreResult<Vec<f64>> {
        column(self, |e| e.result.odds_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::CensusFull;
    use crate::hardy_weinberg::run_hardy_weinberg;
    use crate::store::OperationStore;
    use census_geno::Chromosome;

    fn census(aa: u32, het: u32, bb: u32) -> Census {
        Census {
            hom_major: aa,
            het,
            hom_minor: bb,
            missing: None,
        }
    }

    fn write_census(store: &OperationStore, rows: &[(Census, Census)]) -> String {
        let key = store.next_key(OperationKind::MarkerCensus);
        let meta = OperationMetadata::new(&key, OperationKind::MarkerCensus, "qa");
        let mut ds = store.create::<CensusEntry>(meta).unwrap();
        for (i, (case, control)) in rows.iter().enumerate() {
            ds.add_entry(CensusEntry {
                index: i * 2,
                key: format!("rs{}", i),
                chromosome: Chromosome::Autosome(1),
                major: b'A',
                minor: b'G',
                census: CensusFull {
                    all: Census {
                        hom_major: case.hom_major + control.hom_major,
                        het: case.het + control.het,
                        hom_minor: case.hom_minor + control.hom_minor,
                        missing: Some(0),
                    },
                    case: *case,
                    control: *control,
                    alternate: *control,
                },
            })
            .unwrap();
        }
        ds.finish_writing().unwrap();
        key
    }

    #[test]
    fn test_hw_filter_and_all_tests() {
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let census_key = write_census(
            &store,
            &[
                (census(10, 20, 30), census(25, 50, 25)),
                // controls far from equilibrium: skipped
                (census(10, 20, 30), census(50, 0, 50)),
                (census(10, 0, 0), census(9, 0, 0)),
            ],
        );
        let hw_key = run_hardy_weinberg(&census_key, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();

        for test in [
            AssociationTest::Allelic,
            AssociationTest::Genotypic,
            AssociationTest::Trend,
        ] {
            let request = AssociationRequest::new(&census_key, &hw_key, test);
            let outcome = run_association(&request, &ctx).unwrap();
            let ds = store.open::<AssociationEntry>(outcome.key().unwrap()).unwrap();
            assert_eq!(ds.metadata().kind, test.kind());

            let entries = ds.get_entries(EntryRange::ALL).unwrap();
            assert_eq!(
                entries.iter().map(|e| e.index).collect::<Vec<_>>(),
                vec![0, 4]
            );
            let p = ds.p_values().unwrap();
            assert!((0.0..=1.0).contains(&p[0]));
            assert!(p[1].is_nan());
        }
    }

    #[test]
    fn test_explicit_threshold_keeps_everything() {
        let store = OperationStore::in_memory();
        let ctx = PipelineContext::new(&store);
        let census_key = write_census(&store, &[(census(1, 2, 3), census(50, 0, 50))]);
        let hw_key = run_hardy_weinberg(&census_key, &ctx)
            .unwrap()
            .key()
            .unwrap()
            .to_string();
        let request = AssociationRequest::new(&census_key, &hw_key, AssociationTest::Allelic)
            .with_hw_threshold(0.0);
        let outcome = run_association(&request, &ctx).unwrap();
        assert!(matches!(outcome, PipelineOutcome::Completed { n_entries: 1, .. }));
    }
}
