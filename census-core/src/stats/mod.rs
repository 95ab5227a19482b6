//! Per-marker allele and genotype statistics.
//!
//! `raw` accumulates ordinal-indexed counts for one marker at a time;
//! `reducer` turns a completed accumulator into major/minor alleles,
//! mismatch state, contingency counts and compact histograms.

pub mod raw;
pub mod reducer;

pub use raw::{Category, GenotypeTable, RawMarkerStatistics};
pub use reducer::{Contingency, MajorMinor};
