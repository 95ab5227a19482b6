//! In-memory genotype matrix.
//!
//! Holds every genotype for every marker. Meant for small datasets, tests,
//! and as a target for importers that build a matrix marker by marker.

use anyhow::{bail, Result};

use crate::allele::{is_valid_genotype, Genotype};
use crate::sample::SampleKey;
use crate::traits::{GenotypeMatrix, MarkerInfo};

#[derive(Debug, Clone)]
pub struct MemoryMatrix {
    markers: Vec<MarkerInfo>,
    /// genotypes[marker][sample], full sample list.
    genotypes: Vec<Vec<Genotype>>,
    all_samples: Vec<SampleKey>,
    samples: Vec<SampleKey>,
    sample_subset: Option<Vec<usize>>,
}

impl MemoryMatrix {
    /// Create an empty matrix for samples without family IDs.
    pub fn new(sample_ids: Vec<String>) -> Self {
        Self::with_sample_keys(sample_ids.into_iter().map(SampleKey::of_sample).collect())
    }

    pub fn with_sample_keys(samples: Vec<SampleKey>) -> Self {
        Self {
            markers: Vec::new(),
            genotypes: Vec::new(),
            all_samples: samples.clone(),
            samples,
            sample_subset: None,
        }
    }

    /// Append one marker. `genotypes` must hold one cell per sample of the
    /// full sample list, each built from alphabet bytes.
    pub fn push_marker(&mut self, info: MarkerInfo, genotypes: Vec<Genotype>) -> Result<()> {
        if genotypes.len() != self.all_samples.len() {
            bail!(
                "Marker {} has {} genotypes, expected {}",
                info.id,
                genotypes.len(),
                self.all_samples.len()
            );
        }
        if let Some(pos) = genotypes.iter().position(|gt| !is_valid_genotype(gt)) {
            let gt = genotypes[pos];
            bail!(
                "Marker {} sample {}: genotype {}{} is outside the allele alphabet",
                info.id,
                self.all_samples[pos],
                gt[0] as char,
                gt[1] as char
            );
        }
        self.markers.push(info);
        self.genotypes.push(genotypes);
        Ok(())
    }

    /// Build a matrix from markers and marker-major genotypes.
    pub fn from_markers(
        sample_ids: Vec<String>,
        markers: Vec<MarkerInfo>,
        genotypes: Vec<Vec<Genotype>>,
    ) -> Result<Self> {
        if markers.len() != genotypes.len() {
            bail!(
                "{} markers but {} genotype rows",
                markers.len(),
                genotypes.len()
            );
        }
        let mut matrix = Self::new(sample_ids);
        for (info, row) in markers.into_iter().zip(genotypes) {
            matrix.push_marker(info, row)?;
        }
        Ok(matrix)
    }

}

impl GenotypeMatrix for MemoryMatrix {
    fn n_markers(&self) -> usize {
        self.markers.len()
    }

    fn n_samples(&self) -> usize {
        self.samples.len()
    }

    fn sample_keys(&self) -> &[SampleKey] {
        &self.samples
    }

    fn set_sample_subset(&mut self, indices: &[usize]) -> Result<()> {
        let n = self.all_samples.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            bail!("Sample index {} out of range ({})", bad, n);
        }
        self.samples = indices
            .iter()
            .map(|&i| self.all_samples[i].clone())
            .collect();
        self.sample_subset = Some(indices.to_vec());
        Ok(())
    }

    fn clear_sample_subset(&mut self) {
        self.sample_subset = None;
        self.samples = self.all_samples.clone();
    }

    fn marker_info(&self, index: usize) -> Result<MarkerInfo> {
        match self.markers.get(index) {
            Some(info) => Ok(info.clone()),
            None => bail!("Marker index {} out of range ({})", index, self.markers.len()),
        }
    }

    fn read_marker_into(&mut self, index: usize, out: &mut Vec<Genotype>) -> Result<()> {
        let row = match self.genotypes.get(index) {
            Some(row) => row,
            None => bail!("Marker index {} out of range ({})", index, self.markers.len()),
        };
        out.clear();
        match &self.sample_subset {
            Some(indices) => out.extend(indices.iter().map(|&i| row[i])),
            None => out.extend_from_slice(row),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("S{}", i)).collect()
    }

    #[test]
    fn test_push_and_read() {
        let mut m = MemoryMatrix::new(ids(3));
        m.push_marker(
            MarkerInfo::new("1", 100, "rs1"),
            vec![*b"AA", *b"AG", *b"00"],
        )
        .unwrap();
        assert_eq!(m.n_markers(), 1);
        assert_eq!(m.read_marker(0).unwrap(), vec![*b"AA", *b"AG", *b"00"]);
        assert!(m.read_marker(1).is_err());
    }

    #[test]
    fn test_rejects_foreign_alleles() {
        let mut m = MemoryMatrix::new(ids(2));
        let err = m
            .push_marker(MarkerInfo::new("1", 1, "rs1"), vec![*b"AA", *b"NN"])
            .unwrap_err();
        assert!(err.to_string().contains("outside the allele alphabet"));
    }

    #[test]
    fn test_rejects_wrong_width() {
        let mut m = MemoryMatrix::new(ids(2));
        assert!(m
            .push_marker(MarkerInfo::new("1", 1, "rs1"), vec![*b"AA"])
            .is_err());
    }

    #[test]
    fn test_sample_subset() {
        let mut m = MemoryMatrix::new(ids(4));
        m.push_marker(
            MarkerInfo::new("2", 5, "rs9"),
            vec![*b"AA", *b"AC", *b"CC", *b"00"],
        )
        .unwrap();

        m.set_sample_subset(&[3, 1]).unwrap();
        assert_eq!(m.n_samples(), 2);
        assert_eq!(
            m.sample_keys(),
            &[SampleKey::of_sample("S4"), SampleKey::of_sample("S2")]
        );
        assert_eq!(m.read_marker(0).unwrap(), vec![*b"00", *b"AC"]);

        assert!(m.set_sample_subset(&[4]).is_err());

        m.clear_sample_subset();
        assert_eq!(m.n_samples(), 4);
    }
}
