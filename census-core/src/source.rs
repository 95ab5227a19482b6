//! A genotype matrix together with the sample metadata used to count it.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use census_geno::phenotype::load_phenotype_override;
use census_geno::plink::PlinkReader;
use census_geno::sample::SamplePhenotypes;
use census_geno::{GenotypeMatrix, SampleRegistry};

pub struct StudySource {
    /// Name recorded as the parent of operations run directly on the matrix.
    pub name: String,
    pub matrix: Box<dyn GenotypeMatrix>,
    pub registry: SampleRegistry,
    /// Per-run sex / affection replacements; never written back.
    pub overrides: Option<SampleRegistry>,
}

impl StudySource {
    pub fn new(
        name: impl Into<String>,
        matrix: Box<dyn GenotypeMatrix>,
        registry: SampleRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            matrix,
            registry,
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: SampleRegistry) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Open a PLINK fileset; sample metadata comes from its `.fam`.
    pub fn from_plink(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let reader = PlinkReader::new(prefix)
            .with_context(|| format!("Failed to open PLINK fileset {}", prefix.display()))?;
        let registry = reader.sample_registry();
        let name = prefix
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| prefix.display().to_string());
        info!(
            "Loaded {}: {} markers x {} samples",
            name,
            reader.n_markers(),
            reader.n_samples()
        );
        Ok(Self::new(name, Box::new(reader), registry))
    }

    /// Load a phenotype override file and attach it.
    pub fn with_override_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let overrides = load_phenotype_override(path)
            .with_context(|| format!("Failed to read phenotype file {}", path.display()))?;
        Ok(self.with_overrides(overrides))
    }

    /// Sex and affection of the samples in the matrix's current view.
    pub fn view_phenotypes(&self) -> SamplePhenotypes {
        self.registry
            .resolve(self.matrix.sample_keys(), self.overrides.as_ref())
    }
}
