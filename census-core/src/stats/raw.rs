//! Reusable per-marker count accumulator.
//!
//! One instance is cleared and refilled for every marker. Reuse only saves
//! the allocation; `gather` always starts from a cleared state, so nothing
//! from a previous marker can leak into the next.

use census_geno::allele::{ordinal_of, ALPHABET_SIZE, MISSING_ORDINAL};
use census_geno::{Affection, Chromosome, Genotype, Sex};

use crate::decision::CensusDecision;

/// Ordered-genotype counts: `table[first_ordinal][second_ordinal]`.
pub type GenotypeTable = [[u32; ALPHABET_SIZE]; ALPHABET_SIZE];

const EMPTY_TABLE: GenotypeTable = [[0; ALPHABET_SIZE]; ALPHABET_SIZE];

/// Subject categories a genotype table can be split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    All,
    Case,
    Control,
    /// Unaffected samples at a fully counted (diploid) locus.
    HardyWeinberg,
}

#[derive(Debug, Clone)]
pub struct RawMarkerStatistics {
    allele_counts: [u32; ALPHABET_SIZE],
    all: GenotypeTable,
    case: GenotypeTable,
    control: GenotypeTable,
    hardy_weinberg: GenotypeTable,
    /// Samples whose call was applicable (decision not `Exclude`).
    counted_samples: u32,
    by_category: bool,
}

impl Default for RawMarkerStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMarkerStatistics {
    /// Accumulator for the ALL category only (QA).
    pub fn new() -> Self {
        Self {
            allele_counts: [0; ALPHABET_SIZE],
            all: EMPTY_TABLE,
            case: EMPTY_TABLE,
            control: EMPTY_TABLE,
            hardy_weinberg: EMPTY_TABLE,
            counted_samples: 0,
            by_category: false,
        }
    }

    /// Accumulator that also splits genotypes by case / control /
    /// Hardy-Weinberg eligibility (census).
    pub fn with_categories() -> Self {
        Self {
            by_category: true,
            ..Self::new()
        }
    }

    pub fn tracks_categories(&self) -> bool {
        self.by_category
    }

    pub fn clear(&mut self) {
        self.allele_counts = [0; ALPHABET_SIZE];
        self.all = EMPTY_TABLE;
        if self.by_category {
            self.case = EMPTY_TABLE;
            self.control = EMPTY_TABLE;
            self.hardy_weinberg = EMPTY_TABLE;
        }
        self.counted_samples = 0;
    }

    /// Clear, then count every sample's genotype at one marker.
    ///
    /// `sexes` and `genotypes` are aligned to the same sample order;
    /// `affections` must be aligned too when categories are tracked and is
    /// ignored otherwise.
    ///
    /// # Panics
    /// On misaligned inputs or genotype bytes outside the allele alphabet.
    pub fn gather(
        &mut self,
        chrom: &Chromosome,
        sexes: &[Sex],
        affections: &[Affection],
        genotypes: &[Genotype],
    ) {
        assert_eq!(
            sexes.len(),
            genotypes.len(),
            "sex vector and genotype vector must be aligned"
        );
        if self.by_category {
            assert_eq!(
                affections.len(),
                genotypes.len(),
                "affection vector and genotype vector must be aligned"
            );
        }

        self.clear();

        for (i, gt) in genotypes.iter().enumerate() {
            let decision = CensusDecision::decide(chrom, sexes[i]);
            if !decision.counts_toward_missing() {
                continue;
            }

            let o1 = ordinal_of(gt[0]);
            let o2 = ordinal_of(gt[1]);

            self.allele_counts[o1] += 1;
            self.allele_counts[o2] += 1;
            self.all[o1][o2] += 1;
            self.counted_samples += 1;

            if self.by_category {
                match affections[i] {
                    Affection::Affected => self.case[o1][o2] += 1,
                    Affection::Unaffected => {
                        self.control[o1][o2] += 1;
                        if decision.counts_toward_hardy_weinberg() {
                            self.hardy_weinberg[o1][o2] += 1;
                        }
                    }
                    Affection::Unknown => {}
                }
            }
        }
    }

    /// Allele occurrences by ordinal (two per counted sample).
    pub fn allele_counts(&self) -> &[u32; ALPHABET_SIZE] {
        &self.allele_counts
    }

    /// Genotype table of one category.
    ///
    /// # Panics
    /// If a split category is requested from an accumulator built with
    /// [`RawMarkerStatistics::new`].
    pub fn genotype_counts(&self, category: Category) -> &GenotypeTable {
        match category {
            Category::All => &self.all,
            _ if !self.by_category => {
                panic!("category {:?} requested from an ALL-only accumulator", category)
            }
            Category::Case => &self.case,
            Category::Control => &self.control,
            Category::HardyWeinberg => &self.hardy_weinberg,
        }
    }

    /// Applicable samples whose genotype is missing on both alleles.
    pub fn missing_count(&self) -> u32 {
        self.all[MISSING_ORDINAL][MISSING_ORDINAL]
    }

    /// Samples whose call was applicable at this marker.
    pub fn counted_samples(&self) -> u32 {
        self.counted_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_geno::allele::ordinal_of;

    fn ord(b: u8) -> usize {
        ordinal_of(b)
    }

    #[test]
    fn test_gather_all_category() {
        let mut raw = RawMarkerStatistics::new();
        let sexes = [Sex::Male, Sex::Female, Sex::Unknown];
        raw.gather(
            &Chromosome::Autosome(1),
            &sexes,
            &[],
            &[*b"AG", *b"GG", *b"00"],
        );

        assert_eq!(raw.allele_counts()[ord(b'A')], 1);
        assert_eq!(raw.allele_counts()[ord(b'G')], 3);
        assert_eq!(raw.allele_counts()[ord(b'0')], 2);
        assert_eq!(raw.genotype_counts(Category::All)[ord(b'A')][ord(b'G')], 1);
        assert_eq!(raw.genotype_counts(Category::All)[ord(b'G')][ord(b'A')], 0);
        assert_eq!(raw.missing_count(), 1);
        assert_eq!(raw.counted_samples(), 3);
    }

    #[test]
    fn test_gather_categories() {
        let mut raw = RawMarkerStatistics::with_categories();
        let sexes = [Sex::Male, Sex::Female, Sex::Female, Sex::Male];
        let aff = [
            Affection::Affected,
            Affection::Unaffected,
            Affection::Unknown,
            Affection::Unaffected,
        ];
        raw.gather(
            &Chromosome::Autosome(2),
            &sexes,
            &aff,
            &[*b"CC", *b"CT", *b"TT", *b"CT"],
        );

        let (c, t) = (ord(b'C'), ord(b'T'));
        assert_eq!(raw.genotype_counts(Category::Case)[c][c], 1);
        assert_eq!(raw.genotype_counts(Category::Control)[c][t], 2);
        assert_eq!(raw.genotype_counts(Category::HardyWeinberg)[c][t], 2);
        assert_eq!(raw.genotype_counts(Category::All)[t][t], 1);
        assert_eq!(raw.genotype_counts(Category::Control)[t][t], 0);
    }

    #[test]
    fn test_hardy_weinberg_table_skips_sex_linked_calls() {
        let mut raw = RawMarkerStatistics::with_categories();
        raw.gather(
            &Chromosome::X,
            &[Sex::Female, Sex::Male],
            &[Affection::Unaffected, Affection::Unaffected],
            &[*b"AG", *b"AA"],
        );
        let table = raw.genotype_counts(Category::HardyWeinberg);
        assert!(table.iter().flatten().all(|&c| c == 0));
        assert_eq!(raw.genotype_counts(Category::Control)[ord(b'A')][ord(b'G')], 1);
    }

    #[test]
    fn test_excluded_calls_are_not_missing() {
        let mut raw = RawMarkerStatistics::new();
        raw.gather(
            &Chromosome::Y,
            &[Sex::Female, Sex::Male, Sex::Male],
            &[],
            &[*b"00", *b"00", *b"TT"],
        );
        assert_eq!(raw.missing_count(), 1);
        assert_eq!(raw.counted_samples(), 2);
        assert_eq!(raw.allele_counts()[ord(b'0')], 2);
    }

    #[test]
    fn test_gather_resets_previous_marker() {
        let mut raw = RawMarkerStatistics::with_categories();
        let sexes = [Sex::Male, Sex::Male];
        let aff = [Affection::Affected, Affection::Unaffected];
        raw.gather(&Chromosome::Autosome(1), &sexes, &aff, &[*b"AA", *b"AA"]);
        raw.gather(&Chromosome::Autosome(1), &sexes, &aff, &[*b"GG", *b"00"]);

        assert_eq!(raw.allele_counts()[ord(b'A')], 0);
        assert_eq!(raw.genotype_counts(Category::Case)[ord(b'A')][ord(b'A')], 0);
        assert_eq!(raw.genotype_counts(Category::Case)[ord(b'G')][ord(b'G')], 1);
        assert_eq!(raw.missing_count(), 1);
        assert_eq!(raw.counted_samples(), 2);
    }

    #[test]
    #[should_panic(expected = "ALL-only accumulator")]
    fn test_split_category_requires_category_accumulator() {
        let raw = RawMarkerStatistics::new();
        raw.genotype_counts(Category::Case);
    }
}
