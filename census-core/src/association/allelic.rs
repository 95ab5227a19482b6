//! Allelic test: 2x2 table of case/control by allele.

use crate::census::Census;
use crate::util::math::{chi_square_pvalue, odds_ratio, pearson_chi_square};

use super::TestResult;

/// Major (A) and minor (a) allele counts of a census record.
pub(crate) fn allele_counts(c: &Census) -> (f64, f64) {
    let (aa, het, bb) = (c.hom_major as f64, c.het as f64, c.hom_minor as f64);
    (2.0 * aa + het, 2.0 * bb + het)
}

pub fn allelic_test(case: &Census, control: &Census) -> TestResult {
    let (case_major, case_minor) = allele_counts(case);
    let (ctrl_major, ctrl_minor) = allele_counts(control);

    let statistic = pearson_chi_square(&[[case_major, case_minor], [ctrl_major, ctrl_minor]]);
    TestResult {
        statistic,
        p_value: chi_square_pvalue(statistic, 1.0),
        odds_ratio: odds_ratio(case_major, case_minor, ctrl_major, ctrl_minor),
        odds_ratio_het: None,
    }
}
