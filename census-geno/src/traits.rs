//! Core traits for genotype matrix access.

use anyhow::Result;

use crate::allele::Genotype;
use crate::chromosome::Chromosome;
use crate::sample::SampleKey;

/// Information about a genetic marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerInfo {
    /// Chromosome label as stored (e.g. "1", "22", "X").
    pub chrom: String,
    /// Position in base pairs.
    pub pos: u64,
    /// Marker ID (e.g. rsID).
    pub id: String,
}

impl MarkerInfo {
    pub fn new(chrom: impl Into<String>, pos: u64, id: impl Into<String>) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            id: id.into(),
        }
    }

    pub fn chromosome(&self) -> Chromosome {
        Chromosome::parse(&self.chrom)
    }
}

/// A samples x markers matrix of allele-byte genotypes, read markers-major.
///
/// Implementations keep at most one marker's worth of genotypes decoded at a
/// time. A sample subset narrows every later read to the given samples
/// without copying the matrix.
pub trait GenotypeMatrix: Send {
    /// Total number of markers.
    fn n_markers(&self) -> usize;

    /// Number of samples in the current view.
    fn n_samples(&self) -> usize;

    /// Sample keys of the current view, in view order.
    fn sample_keys(&self) -> &[SampleKey];

    /// Restrict subsequent reads to `indices`, given as positions in the
    /// full (unsubsetted) sample list.
    fn set_sample_subset(&mut self, indices: &[usize]) -> Result<()>;

    /// Drop any sample subset.
    fn clear_sample_subset(&mut self);

    /// Marker metadata without reading genotypes.
    fn marker_info(&self, index: usize) -> Result<MarkerInfo>;

    /// Decode the genotypes of marker `index` for the current view into
    /// `out`, replacing its contents.
    fn read_marker_into(&mut self, index: usize, out: &mut Vec<Genotype>) -> Result<()>;

    /// Decode the genotypes of marker `index` for the current view.
    fn read_marker(&mut self, index: usize) -> Result<Vec<Genotype>> {
        let mut out = Vec::with_capacity(self.n_samples());
        self.read_marker_into(index, &mut out)?;
        Ok(out)
    }

    /// Chromosome labels of every marker, in marker order.
    fn marker_chromosomes(&self) -> Result<Vec<String>> {
        (0..self.n_markers())
            .map(|i| self.marker_info(i).map(|m| m.chrom))
            .collect()
    }
}
