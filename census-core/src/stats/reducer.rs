//! Reduction of raw ordinal counts to per-marker derived values.
//!
//! Labels:
//! - `major` / `minor`: the more / less frequent of at most two observed
//!   non-missing alleles. Equal counts go to the lower allele byte.
//! - mismatch: more than two distinct non-missing alleles. A normal data
//!   outcome, reported as `major = minor = '0'` and frequency 0.
//! - contingency: homozygous-major (AA), heterozygous (Aa) and
//!   homozygous-minor (aa) genotype counts. Half-missing genotypes are
//!   folded into the homozygous bucket of their called allele.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use census_geno::allele::{
    is_missing, ordinal_of, symbol_of, ALPHABET_SIZE, MISSING, MISSING_ORDINAL,
};

use super::raw::{Category, GenotypeTable, RawMarkerStatistics};

/// Major/minor classification of one marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MajorMinor {
    pub major: u8,
    pub minor: u8,
    pub major_frequency: f64,
    pub mismatch: bool,
}

impl MajorMinor {
    pub fn minor_frequency(&self) -> f64 {
        1.0 - self.major_frequency
    }
}

/// AA / Aa / aa genotype counts relative to a marker's known alleles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contingency {
    pub hom_major: u32,
    pub het: u32,
    pub hom_minor: u32,
}

impl Contingency {
    pub fn total(&self) -> u32 {
        self.hom_major + self.het + self.hom_minor
    }
}

/// Non-missing allele counts keyed by allele byte, zero counts dropped.
pub fn extract_allele_counts(raw: &RawMarkerStatistics) -> BTreeMap<u8, u32> {
    raw.allele_counts()
        .iter()
        .enumerate()
        .filter(|&(ord, &count)| ord != MISSING_ORDINAL && count > 0)
        .map(|(ord, &count)| (symbol_of(ord), count))
        .collect()
}

pub fn classify_major_minor(allele_counts: &BTreeMap<u8, u32>) -> MajorMinor {
    let alleles: Vec<(u8, u32)> = allele_counts
        .iter()
        .filter(|&(&a, &c)| !is_missing(a) && c > 0)
        .map(|(&a, &c)| (a, c))
        .collect();

    match alleles.as_slice() {
        [] => MajorMinor {
            major: MISSING,
            minor: MISSING,
            major_frequency: 0.0,
            mismatch: false,
        },
        &[(allele, _)] => MajorMinor {
            major: allele,
            minor: MISSING,
            major_frequency: 1.0,
            mismatch: false,
        },
        &[(a, count_a), (b, count_b)] => {
            // Ascending byte order: `a` wins ties.
            let (major, major_count, minor, minor_count) = if count_a >= count_b {
                (a, count_a, b, count_b)
            } else {
                (b, count_b, a, count_a)
            };
            MajorMinor {
                major,
                minor,
                major_frequency: major_count as f64 / (major_count + minor_count) as f64,
                mismatch: false,
            }
        }
        _ => MajorMinor {
            major: MISSING,
            minor: MISSING,
            major_frequency: 0.0,
            mismatch: true,
        },
    }
}

/// AA / Aa / aa counts from one genotype table.
pub fn extract_contingency(table: &GenotypeTable, major: u8, minor: u8) -> Contingency {
    if is_missing(major) {
        return Contingency::default();
    }
    let m = ordinal_of(major);
    let z = MISSING_ORDINAL;

    let hom_major = table[m][m] + table[m][z] + table[z][m];
    if is_missing(minor) || minor == major {
        return Contingency {
            hom_major,
            het: 0,
            hom_minor: 0,
        };
    }

    let n = ordinal_of(minor);
    Contingency {
        hom_major,
        het: table[m][n] + table[n][m],
        hom_minor: table[n][n] + table[n][z] + table[z][n],
    }
}

/// If exactly one of the two alleles is the missing symbol, replace it with
/// the other one, so a monomorphic marker reports `X/X` instead of `X/0`.
pub fn leave_no_single_zero_allele_behind(major: u8, minor: u8) -> (u8, u8) {
    match (is_missing(major), is_missing(minor)) {
        (true, false) => (minor, minor),
        (false, true) => (major, major),
        _ => (major, minor),
    }
}

/// `[major, minor, missing, other]` allele occurrence counts.
///
/// `other` is whatever the three named symbols do not account for out of
/// two alleles per counted sample.
pub fn compact_allele_histogram(raw: &RawMarkerStatistics, major: u8, minor: u8) -> [u32; 4] {
    let counts = raw.allele_counts();
    let named = |allele: u8| -> u32 {
        if is_missing(allele) {
            0
        } else {
            counts[ordinal_of(allele)]
        }
    };

    let major_count = named(major);
    let minor_count = if minor == major { 0 } else { named(minor) };
    let missing_count = counts[MISSING_ORDINAL];
    let expected = 2 * raw.counted_samples();
    let other = expected.saturating_sub(major_count + minor_count + missing_count);

    [major_count, minor_count, missing_count, other]
}

/// The 9 ordered genotypes over `(major, minor, missing)`, row-major, plus
/// a remainder slot for genotypes outside that dictionary.
///
/// A symbol repeated in the dictionary (e.g. `minor == '0'` on a
/// monomorphic marker) leaves its repeated rows and columns at zero, so no
/// genotype is counted twice.
pub fn compact_genotype_histogram(
    table: &GenotypeTable,
    counted_samples: u32,
    major: u8,
    minor: u8,
) -> [u32; 10] {
    let dictionary = dictionary_ordinals(major, minor);
    let mut histogram = [0u32; 10];
    let mut sum = 0u32;

    for (i, row) in dictionary.iter().enumerate() {
        for (j, col) in dictionary.iter().enumerate() {
            if let (Some(r), Some(c)) = (row, col) {
                let count = table[*r][*c];
                histogram[i * 3 + j] = count;
                sum += count;
            }
        }
    }
    histogram[9] = counted_samples.saturating_sub(sum);
    histogram
}

fn dictionary_ordinals(major: u8, minor: u8) -> [Option<usize>; 3] {
    let mut seen = [false; ALPHABET_SIZE];
    let mut out = [None; 3];
    for (slot, symbol) in [major, minor, MISSING].into_iter().enumerate() {
        let ord = ordinal_of(symbol);
        if !seen[ord] {
            seen[ord] = true;
            out[slot] = Some(ord);
        }
    }
    out
}

/// Everything a QA entry needs from one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSummary {
    pub alleles: MajorMinor,
    /// `None` for mismatched markers.
    pub contingency: Option<Contingency>,
    pub missing_count: u32,
    pub allele_histogram: [u32; 4],
    pub genotype_histogram: [u32; 10],
}

/// Reduce the ALL category of a completed accumulator.
pub fn summarize(raw: &RawMarkerStatistics) -> MarkerSummary {
    let alleles = classify_major_minor(&extract_allele_counts(raw));
    let table = raw.genotype_counts(Category::All);

    let contingency = if alleles.mismatch {
        None
    } else {
        Some(extract_contingency(table, alleles.major, alleles.minor))
    };

    MarkerSummary {
        alleles,
        contingency,
        missing_count: raw.missing_count(),
        allele_histogram: compact_allele_histogram(raw, alleles.major, alleles.minor),
        genotype_histogram: compact_genotype_histogram(
            table,
            raw.counted_samples(),
            alleles.major,
            alleles.minor,
        ),
    }
}
