//! PLINK bed/bim/fam reader using memory-mapped files.
//!
//! PLINK binary format consists of three files:
//! - .bed: Binary genotype data (2 bits per genotype, packed)
//! - .bim: Variant information (chrom, id, cm, pos, a1, a2)
//! - .fam: Sample information (fid, iid, father, mother, sex, pheno)
//!
//! Genotypes are decoded to allele-byte pairs using the .bim alleles, so
//! only single-character alleles from the allele alphabet are accepted.
//!
//! Reference: https://www.cog-genomics.org/plink/1.9/formats#bed

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;

use crate::allele::{parse_allele, Genotype, MISSING_GENOTYPE};
use crate::sample::{Affection, SampleInfo, SampleKey, SampleRegistry, Sex};
use crate::traits::{GenotypeMatrix, MarkerInfo};

/// PLINK BIM file entry (one per variant).
#[derive(Debug, Clone)]
pub struct BimEntry {
    pub chrom: String,
    pub id: String,
    pub cm: f64,
    pub pos: u64,
    pub allele1: u8,
    pub allele2: u8,
}

/// PLINK FAM file entry (one per sample).
#[derive(Debug, Clone)]
pub struct FamEntry {
    pub fid: String,
    pub iid: String,
    pub father: String,
    pub mother: String,
    pub sex: Sex,
    pub affection: Affection,
}

impl FamEntry {
    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.fid.clone(), self.iid.clone())
    }
}

/// Reader for PLINK bed/bim/fam files.
pub struct PlinkReader {
    /// Memory-mapped .bed file.
    mmap: Mmap,
    /// Variant information from .bim file.
    bim: Vec<BimEntry>,
    /// Sample information from .fam file.
    fam: Vec<FamEntry>,
    /// Number of samples (total, before subsetting).
    n_samples_total: usize,
    /// Number of bytes per marker in the bed file.
    bytes_per_marker: usize,
    /// (FID, IID) of the current view.
    samples: Vec<SampleKey>,
    /// Indices of selected samples (None = all samples).
    sample_subset: Option<Vec<usize>>,
}

impl PlinkReader {
    /// Open PLINK files from a base path (without extension).
    /// Will look for .bed, .bim, .fam files.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base = base_path.as_ref();
        let bed_path = base.with_extension("bed");
        let bim_path = base.with_extension("bim");
        let fam_path = base.with_extension("fam");

        let fam = Self::parse_fam(&fam_path)?;
        let n_samples = fam.len();

        let bim = Self::parse_bim(&bim_path)?;

        let bed_file = std::fs::File::open(&bed_path)
            .with_context(|| format!("Failed to open bed file: {}", bed_path.display()))?;
        // SAFETY: the mapping is read-only and the file is not modified while mapped.
        let mmap = unsafe { Mmap::map(&bed_file)? };

        if mmap.len() < 3 {
            bail!("Bed file too small");
        }
        if mmap[0] != 0x6C || mmap[1] != 0x1B {
            bail!("Invalid PLINK bed file magic number");
        }
        if mmap[2] != 0x01 {
            bail!("Only SNP-major bed files are supported (mode byte = 0x01)");
        }

        let bytes_per_marker = n_samples.div_ceil(4);
        let expected_size = 3 + bytes_per_marker * bim.len();
        if mmap.len() < expected_size {
            bail!(
                "Bed file too small: expected at least {} bytes, got {}",
                expected_size,
                mmap.len()
            );
        }

        let samples: Vec<SampleKey> = fam.iter().map(FamEntry::key).collect();

        tracing::debug!(
            "Opened PLINK fileset {}: {} markers x {} samples",
            base.display(),
            bim.len(),
            n_samples
        );

        Ok(Self {
            mmap,
            bim,
            fam,
            n_samples_total: n_samples,
            bytes_per_marker,
            samples,
            sample_subset: None,
        })
    }

    /// Parse a .fam file. A (FID, IID) pair may appear only once.
    fn parse_fam(path: &Path) -> Result<Vec<FamEntry>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fam file: {}", path.display()))?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                bail!("Fam file line {} has fewer than 6 fields", line_num + 1);
            }
            let entry = FamEntry {
                fid: fields[0].to_string(),
                iid: fields[1].to_string(),
                father: fields[2].to_string(),
                mother: fields[3].to_string(),
                sex: Sex::from_code(fields[4]),
                affection: Affection::from_code(fields[5]),
            };
            if !seen.insert(entry.key()) {
                bail!(
                    "Fam file line {} repeats sample {} of family {}",
                    line_num + 1,
                    entry.iid,
                    entry.fid
                );
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Parse a .bim file.
    fn parse_bim(path: &Path) -> Result<Vec<BimEntry>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bim file: {}", path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                bail!("Bim file line {} has fewer than 6 fields", line_num + 1);
            }
            let allele = |text: &str| -> Result<u8> {
                match parse_allele(text) {
                    Some(a) => Ok(a),
                    None => bail!(
                        "Bim file line {}: allele '{}' of {} is not a single-byte allele",
                        line_num + 1,
                        text,
                        fields[1]
                    ),
                }
            };
            entries.push(BimEntry {
                chrom: fields[0].to_string(),
                id: fields[1].to_string(),
                cm: fields[2].parse().unwrap_or(0.0),
                pos: fields[3].parse().unwrap_or(0),
                allele1: allele(fields[4])?,
                allele2: allele(fields[5])?,
            });
        }
        Ok(entries)
    }

    /// Decode a single genotype from the bed file.
    #[inline]
    fn decode_genotype(byte: u8, offset: usize, allele1: u8, allele2: u8) -> Genotype {
        let bits = (byte >> (offset * 2)) & 0x03;
        match bits {
            0b00 => [allele1, allele1],
            0b01 => MISSING_GENOTYPE,
            0b10 => [allele1, allele2],
            0b11 => [allele2, allele2],
            _ => unreachable!(),
        }
    }

    #[inline]
    fn decode_sample(&self, offset: usize, sample_idx: usize, bim: &BimEntry) -> Genotype {
        let byte = self.mmap[offset + sample_idx / 4];
        Self::decode_genotype(byte, sample_idx % 4, bim.allele1, bim.allele2)
    }

    /// Sample registry built from the .fam file (sex and affection columns).
    pub fn sample_registry(&self) -> SampleRegistry {
        SampleRegistry::from_samples(self.fam.iter().map(|f| SampleInfo {
            family_id: f.fid.clone(),
            sample_id: f.iid.clone(),
            father_id: f.father.clone(),
            mother_id: f.mother.clone(),
            sex: f.sex,
            affection: f.affection,
            ..Default::default()
        }))
    }
}

impl GenotypeMatrix for PlinkReader {
    fn n_markers(&self) -> usize {
        self.bim.len()
    }

    fn n_samples(&self) -> usize {
        match &self.sample_subset {
            Some(indices) => indices.len(),
            None => self.n_samples_total,
        }
    }

    fn sample_keys(&self) -> &[SampleKey] {
        &self.samples
    }

    fn set_sample_subset(&mut self, indices: &[usize]) -> Result<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples_total) {
            bail!("Sample index {} out of range ({})", bad, self.n_samples_total);
        }
        self.samples = indices.iter().map(|&i| self.fam[i].key()).collect();
        self.sample_subset = Some(indices.to_vec());
        Ok(())
    }

    fn clear_sample_subset(&mut self) {
        self.sample_subset = None;
        self.samples = self.fam.iter().map(FamEntry::key).collect();
    }

    fn marker_info(&self, index: usize) -> Result<MarkerInfo> {
        if index >= self.bim.len() {
            bail!("Marker index {} out of range ({})", index, self.bim.len());
        }
        let bim = &self.bim[index];
        Ok(MarkerInfo {
            chrom: bim.chrom.clone(),
            pos: bim.pos,
            id: bim.id.clone(),
        })
    }

    fn read_marker_into(&mut self, index: usize, out: &mut Vec<Genotype>) -> Result<()> {
        if index >= self.bim.len() {
            bail!("Marker index {} out of range ({})", index, self.bim.len());
        }

        let bim = &self.bim[index];
        let offset = 3 + index * self.bytes_per_marker;
        out.clear();

        match &self.sample_subset {
            Some(indices) => {
                out.extend(indices.iter().map(|&i| self.decode_sample(offset, i, bim)));
            }
            None => {
                out.extend((0..self.n_samples_total).map(|i| self.decode_sample(offset, i, bim)));
            }
        }
        Ok(())
    }
}
