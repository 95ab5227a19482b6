//! Marker census: AA / Aa / aa counts per subject category.
//!
//! Every census entry carries four [`Census`] records sharing one pair of
//! known alleles, determined from the ALL category:
//! - ALL: every applicable sample, with its missing count.
//! - CASE: affected samples.
//! - CONTROL: unaffected samples.
//! - ALTERNATE: unaffected samples at fully counted loci (Hardy-Weinberg
//!   eligible).
//!
//! Only ALL records a missing count; the other three leave it absent.

pub mod pick;
pub mod pipeline;

use serde::{Deserialize, Serialize};

use census_geno::allele::MISSING;
use census_geno::Chromosome;

use crate::stats::reducer::{
    classify_major_minor, extract_allele_counts, extract_contingency,
    leave_no_single_zero_allele_behind,
};
use crate::stats::{Category, Contingency, RawMarkerStatistics};
use crate::store::{column, OperationDataSet, OperationEntry, OperationKind, StoreResult};

pub use pick::{pick, pick_from_values, CensusThresholds, PickOutcome, Selection};
pub use pipeline::{run_census, CensusRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Census {
    pub hom_major: u32,
    pub het: u32,
    pub hom_minor: u32,
    pub missing: Option<u32>,
}

impl Census {
    fn of(contingency: Contingency, missing: Option<u32>) -> Self {
        Self {
            hom_major: contingency.hom_major,
            het: contingency.het,
            hom_minor: contingency.hom_minor,
            missing,
        }
    }

    /// AA + Aa + aa.
    pub fn called(&self) -> u32 {
        self.hom_major + self.het + self.hom_minor
    }

    /// Called plus missing samples.
    pub fn total(&self) -> u32 {
        self.called() + self.missing.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CensusFull {
    pub all: Census,
    pub case: Census,
    pub control: Census,
    pub alternate: Census,
}

/// Which record of a [`CensusFull`] to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CensusCategory {
    All,
    Case,
    Control,
    Alternate,
}

impl CensusFull {
    pub fn get(&self, category: CensusCategory) -> &Census {
        match category {
            CensusCategory::All => &self.all,
            CensusCategory::Case => &self.case,
            CensusCategory::Control => &self.control,
            CensusCategory::Alternate => &self.alternate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusEntry {
    /// Marker index in the source matrix.
    pub index: usize,
    pub key: String,
    pub chromosome: Chromosome,
    pub major: u8,
    pub minor: u8,
    pub census: CensusFull,
}

impl OperationEntry for CensusEntry {
    const KINDS: &'static [OperationKind] = &[OperationKind::MarkerCensus];

    fn origin_index(&self) -> usize {
        self.index
    }
}

/// Known alleles and the four-way census of a gathered marker.
///
/// A mismatched marker gets all-zero records and `'0'/'0'` alleles.
pub fn census_from_statistics(raw: &RawMarkerStatistics) -> (u8, u8, CensusFull) {
    debug_assert!(raw.tracks_categories(), "census needs per-category tables");
    let alleles = classify_major_minor(&extract_allele_counts(raw));
    if alleles.mismatch {
        let full = CensusFull {
            all: Census {
                missing: Some(0),
                ..Census::default()
            },
            ..CensusFull::default()
        };
        return (MISSING, MISSING, full);
    }

    let (major, minor) = (alleles.major, alleles.minor);
    let count = |category| extract_contingency(raw.genotype_counts(category), major, minor);

    let full = CensusFull {
        all: Census::of(count(Category::All), Some(raw.missing_count())),
        case: Census::of(count(Category::Case), None),
        control: Census::of(count(Category::Control), None),
        alternate: Census::of(count(Category::HardyWeinberg), None),
    };
    let (major, minor) = leave_no_single_zero_allele_behind(major, minor);
    (major, minor, full)
}

/// Typed reads over a sealed census dataset.
pub trait CensusReader {
    fn census_by_category(&self, category: CensusCategory) -> StoreResult<Vec<Census>>;
    fn known_alleles(&self) -> StoreResult<Vec<(u8, u8)>>;
}

impl<T> CensusReader for T
where
    T: OperationDataSet<CensusEntry> + ?Sized,
{
    fn census_by_category(&self, category: CensusCategory) -> StoreResult<Vec<Census>> {
        column(self, |e| *e.census.get(category))
    }

    fn known_alleles(&self) -> StoreResult<Vec<(u8, u8)>> {
        column(self, |e| (e.major, e.minor))
    }
}
