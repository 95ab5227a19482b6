//! Chromosome- and sex-aware counting rules.
//!
//! Decides how one sample's genotype at one marker enters the census
//! tallies:
//!
//! | chromosome                 | male          | female          | unknown         |
//! |----------------------------|---------------|-----------------|-----------------|
//! | autosome, XY, MT, other    | CountFull     | CountFull       | CountFull       |
//! | X                          | CountMaleHalf | CountFemaleOnly | CountFemaleOnly |
//! | Y                          | CountMaleHalf | Exclude         | CountMaleHalf   |
//!
//! Only two properties of the outcome are consumed by the counting code:
//! whether the call is Hardy-Weinberg eligible and whether it is applicable
//! at all (an `Exclude`d call is neither counted nor missing). Every counted
//! call has weight 1; there is no fractional weighting of hemizygous males.

use census_geno::{Chromosome, Sex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CensusDecision {
    /// Diploid locus, counted for every sample.
    CountFull,
    /// Hemizygous male locus (X or Y in a male).
    CountMaleHalf,
    /// X locus in a female (or sample of unknown sex).
    CountFemaleOnly,
    /// Locus not applicable to this sample (female on Y).
    Exclude,
}

impl CensusDecision {
    pub fn decide(chrom: &Chromosome, sex: Sex) -> Self {
        match chrom {
            Chromosome::X => match sex {
                Sex::Male => CensusDecision::CountMaleHalf,
                Sex::Female | Sex::Unknown => CensusDecision::CountFemaleOnly,
            },
            Chromosome::Y => match sex {
                Sex::Female => CensusDecision::Exclude,
                Sex::Male | Sex::Unknown => CensusDecision::CountMaleHalf,
            },
            Chromosome::Autosome(_)
            | Chromosome::PseudoAutosomal
            | Chromosome::Mitochondrial
            | Chromosome::Other(_) => CensusDecision::CountFull,
        }
    }

    /// Whether the call may enter the Hardy-Weinberg eligible tally.
    #[inline]
    pub fn counts_toward_hardy_weinberg(self) -> bool {
        self == CensusDecision::CountFull
    }

    /// Whether the call is applicable to the sample at all. A missing
    /// genotype in a non-applicable call is not a missing call.
    #[inline]
    pub fn counts_toward_missing(self) -> bool {
        self != CensusDecision::Exclude
    }
}

/// Decisions for every sample at one chromosome, in sample order.
pub fn decide_all(chrom: &Chromosome, sexes: &[Sex]) -> Vec<CensusDecision> {
    sexes
        .iter()
        .map(|&sex| CensusDecision::decide(chrom, sex))
        .collect()
}
