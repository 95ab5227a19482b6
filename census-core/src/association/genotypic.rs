//! Genotypic test: 2x3 table of case/control by genotype, 2 df.

use crate::census::Census;
use crate::util::math::{chi_square_pvalue, odds_ratio, pearson_chi_square};

use super::TestResult;

fn genotypes(c: &Census) -> [f64; 3] {
    [c.hom_major as f64, c.het as f64, c.hom_minor as f64]
}

pub fn genotypic_test(case: &Census, control: &Census) -> TestResult {
    let [case_aa, case_het, case_bb] = genotypes(case);
    let [ctrl_aa, ctrl_het, ctrl_bb] = genotypes(control);

    let statistic = pearson_chi_square(&[genotypes(case), genotypes(control)]);
    TestResult {
        statistic,
        p_value: chi_square_pvalue(statistic, 2.0),
        // AA vs aa
        odds_ratio: odds_ratio(case_aa, case_bb, ctrl_aa, ctrl_bb),
        // Aa vs aa
        odds_ratio_het: Some(odds_ratio(case_het, case_bb, ctrl_het, ctrl_bb)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(aa: u32, het: u32, bb: u32) -> Census {
        Census {
            hom_major: aa,
            het,
            hom_minor: bb,
            missing: None,
        }
    }

    #[test]
    fn test_genotypic() {
        let case = c(10, 20, 30);
        let control = c(30, 20, 10);
        let r = genotypic_test(&case, &control);

        // margins: rows 60/60, cols 40/40/40, expected 20 everywhere
        let expected = (100.0 + 0.0 + 100.0) * 2.0 / 20.0;
        assert!((r.statistic - expected).abs() < 1e-10);
        assert!((r.p_value - chi_square_pvalue(expected, 2.0)).abs() < 1e-12);
        assert!((r.odds_ratio - (10.0 * 10.0) / (30.0 * 30.0)).abs() < 1e-12);
        assert!((r.odds_ratio_het.unwrap() - (20.0 * 10.0) / (30.0 * 20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_no_minor_homozygotes() {
        let r = genotypic_test(&c(10, 5, 0), &c(12, 2, 0));
        assert!(r.odds_ratio.is_nan());
        assert!(r.odds_ratio_het.unwrap().is_nan());
        assert!(r.statistic.is_finite());
        assert!((0.0..=1.0).contains(&r.p_value));
    }
}
