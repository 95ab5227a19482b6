//! census-geno: Genotype I/O abstraction for census-rs
//!
//! Provides the allele codec, the chromosome vocabulary, a unified
//! GenotypeMatrix trait with in-memory and PLINK bed/bim/fam
//! implementations, and sample registry / phenotype override handling.

pub mod allele;
pub mod chromosome;
pub mod memory;
pub mod phenotype;
pub mod plink;
pub mod sample;
pub mod traits;

pub use allele::Genotype;
pub use chromosome::Chromosome;
pub use sample::{Affection, SampleInfo, SampleKey, SampleRegistry, Sex};
pub use traits::{GenotypeMatrix, MarkerInfo};
