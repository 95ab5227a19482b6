//! PICK: select markers and samples from prior QA results.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::qa::{QaMarkersEntry, QaSamplesEntry};
use crate::store::{EntryRange, OperationStore};

/// Exclusion thresholds. A marker or sample is dropped when a ratio is
/// strictly greater than its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CensusThresholds {
    pub marker_missing_ratio_max: f64,
    pub sample_missing_ratio_max: f64,
    pub sample_heterozygosity_ratio_max: f64,
    pub discard_mismatches: bool,
}

impl Default for CensusThresholds {
    fn default() -> Self {
        Self {
            marker_missing_ratio_max: 0.05,
            sample_missing_ratio_max: 0.05,
            sample_heterozygosity_ratio_max: 0.5,
            discard_mismatches: true,
        }
    }
}

impl CensusThresholds {
    pub fn excludes_marker(&self, missing_ratio: f64, mismatch: bool) -> bool {
        (self.discard_mismatches && mismatch) || missing_ratio > self.marker_missing_ratio_max
    }

    pub fn excludes_sample(&self, missing_ratio: f64, heterozygosity_ratio: f64) -> bool {
        missing_ratio > self.sample_missing_ratio_max
            || heterozygosity_ratio > self.sample_heterozygosity_ratio_max
    }
}

/// Retained markers and samples, as indices into the source matrix, in
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub markers: Vec<usize>,
    pub samples: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Selected(Selection),
    /// Every marker or every sample was excluded.
    NoDataRemaining,
}

/// Apply `thresholds` to per-marker and per-sample QA values.
///
/// `markers` holds `(index, missing_ratio, mismatch)`; `samples` holds
/// `(index, missing_ratio, heterozygosity_ratio)`.
pub fn pick_from_values(
    markers: &[(usize, f64, bool)],
    samples: &[(usize, f64, f64)],
    thresholds: &CensusThresholds,
) -> PickOutcome {
    let samples: Vec<usize> = samples
        .iter()
        .filter(|&&(_, missing, het)| !thresholds.excludes_sample(missing, het))
        .map(|&(i, _, _)| i)
        .collect();
    if samples.is_empty() {
        return PickOutcome::NoDataRemaining;
    }

    let markers: Vec<usize> = markers
        .iter()
        .filter(|&&(_, missing, mismatch)| !thresholds.excludes_marker(missing, mismatch))
        .map(|&(i, _, _)| i)
        .collect();
    if markers.is_empty() {
        return PickOutcome::NoDataRemaining;
    }

    PickOutcome::Selected(Selection { markers, samples })
}

/// Read the QA datasets `qa_markers` and `qa_samples` and apply
/// `thresholds`.
pub fn pick(
    store: &OperationStore,
    qa_markers: &str,
    qa_samples: &str,
    thresholds: &CensusThresholds,
) -> Result<PickOutcome> {
    let marker_qa: Vec<(usize, f64, bool)> = store
        .open::<QaMarkersEntry>(qa_markers)
        .and_then(|ds| ds.get_entries(EntryRange::ALL))
        .with_context(|| format!("Failed to read marker QA {}", qa_markers))?
        .iter()
        .map(|e| (e.index, e.missing_ratio, e.mismatch))
        .collect();
    let sample_qa: Vec<(usize, f64, f64)> = store
        .open::<QaSamplesEntry>(qa_samples)
        .and_then(|ds| ds.get_entries(EntryRange::ALL))
        .with_context(|| format!("Failed to read sample QA {}", qa_samples))?
        .iter()
        .map(|e| (e.index, e.missing_ratio, e.heterozygosity_ratio))
        .collect();

    let mut outcome = pick_from_values(&marker_qa, &sample_qa, thresholds);
    if let PickOutcome::Selected(selection) = &mut outcome {
        selection.markers.sort_unstable();
        selection.samples.sort_unstable();
        info!(
            "PICK: kept {}/{} markers and {}/{} samples",
            selection.markers.len(),
            marker_qa.len(),
            selection.samples.len(),
            sample_qa.len()
        );
    } else {
        info!("PICK: no data remaining after QA thresholds");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_strict() {
        let t = CensusThresholds::default();
        assert!(!t.excludes_marker(0.05, false));
        assert!(t.excludes_marker(0.0500001, false));
        assert!(t.excludes_marker(0.0, true));
        assert!(!t.excludes_sample(0.05, 0.5));
        assert!(t.excludes_sample(0.0, 0.51));

        let lenient = CensusThresholds {
            discard_mismatches: false,
            ..t
        };
        assert!(!lenient.excludes_marker(0.0, true));
    }

    #[test]
    fn test_pick_from_values() {
        let markers = [(0, 0.0, false), (1, 0.2, false), (2, 0.01, true), (3, 0.05, false)];
        let samples = [(0, 0.0, 0.3), (1, 0.1, 0.3), (2, 0.0, 0.9)];
        let outcome = pick_from_values(&markers, &samples, &CensusThresholds::default());
        assert_eq!(
            outcome,
            PickOutcome::Selected(Selection {
                markers: vec![0, 3],
                samples: vec![0],
            })
        );
    }

    #[test]
    fn test_no_data_remaining() {
        let markers = [(0, 0.0, false)];
        let samples = [(0, 0.5, 0.0), (1, 0.6, 0.0)];
        let t = CensusThresholds::default();
        assert_eq!(
            pick_from_values(&markers, &samples, &t),
            PickOutcome::NoDataRemaining
        );

        let ok_samples = [(0, 0.0, 0.0)];
        let bad_markers = [(0, 0.9, false), (1, 0.0, true)];
        assert_eq!(
            pick_from_values(&bad_markers, &ok_samples, &t),
            PickOutcome::NoDataRemaining
        );
        assert_eq!(pick_from_values(&[], &ok_samples, &t), PickOutcome::NoDataRemaining);
    }
}
