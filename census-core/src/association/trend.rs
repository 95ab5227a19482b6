//! Cochran-Armitage trend test.
//!
//! Scores `t = (0, 1, 2)` on genotypes `(aa, Aa, AA)`. With case counts
//! `r_i`, control counts `s_i`, `n_i = r_i + s_i` and totals `R`, `S`, `N`:
//!
//! ```text
//! T   = sum_i t_i (r_i S - s_i R)
//! Var = (R S / N) [ sum_i t_i^2 n_i (N - n_i) - 2 sum_{i<j} t_i t_j n_i n_j ]
//! ```
//!
//! and `T^2 / Var` is referred to chi-square with 1 df.

use crate::census::Census;
use crate::util::math::{chi_square_pvalue, odds_ratio};

use super::allelic::allele_counts;
use super::TestResult;

const SCORES: [f64; 3] = [0.0, 1.0, 2.0];

/// Genotype counts in score order: aa, Aa, AA.
fn scored(c: &Census) -> [f64; 3] {
    [c.hom_minor as f64, c.het as f64, c.hom_major as f64]
}

pub fn trend_statistic(case: &Census, control: &Census) -> f64 {
    let r = scored(case);
    let s = scored(control);
    let big_r: f64 = r.iter().sum();
    let big_s: f64 = s.iter().sum();
    let n_total = big_r + big_s;
    if big_r == 0.0 || big_s == 0.0 {
        return f64::NAN;
    }

    let n: [f64; 3] = [r[0] + s[0], r[1] + s[1], r[2] + s[2]];

    let t: f64 = (0..3)
        .map(|i| SCORES[i] * (r[i] * big_s - s[i] * big_r))
        .sum();

    let mut inner: f64 = SCORES
        .iter()
        .zip(&n)
        .map(|(&t, &ni)| t * t * ni * (n_total - ni))
        .sum();
    for i in 0..3 {
        for j in (i + 1)..3 {
            inner -= 2.0 * SCORES[i] * SCORES[j] * n[i] * n[j];
        }
    }
    let variance = big_r * big_s / n_total * inner;

    if variance > 0.0 {
        t * t / variance
    } else {
        f64::NAN
    }
}

/// Trend test; the reported odds ratio is the per-allele one.
pub fn trend_test(case: &Census, control: &Census) -> TestResult {
    let statistic = trend_statistic(case, control);
    let (case_major, case_minor) = allele_counts(case);
    let (ctrl_major, ctrl_minor) = allele_counts(control);
    TestResult {
        statistic,
        p_value: chi_square_pvalue(statistic, 1.0),
        odds_ratio: odds_ratio(case_major, case_minor, ctrl_major, ctrl_minor),
        odds_ratio_het: None,
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

    /// N [N sum t r - R sum t n]^2 / (R S [N sum t^2 n - (sum t n)^2])
    fn closed_form(case: &Census, control: &Census) -> f64 {
        let r = scored(case);
        let s = scored(control);
        let n: Vec<f64> = (0..3).map(|i| r[i] + s[i]).collect();
        let big_r: f64 = r.iter().sum();
        let big_s: f64 = s.iter().sum();
        let total = big_r + big_s;
        let str_: f64 = (0..3).map(|i| SCORES[i] * r[i]).sum();
        let stn: f64 = (0..3).map(|i| SCORES[i] * n[i]).sum();
        let st2n: f64 = (0..3).map(|i| SCORES[i] * SCORES[i] * n[i]).sum();
        total * (total * str_ - big_r * stn).powi(2)
            / (big_r * big_s * (total * st2n - stn * stn))
    }

    #[test]
    fn test_matches_closed_form() {
        for (case, control) in [
            (c(10, 20, 30), c(30, 20, 10)),
            (c(5, 7, 1), c(40, 12, 3)),
            (c(0, 9, 4), c(2, 3, 30)),
        ] {
            let stat = trend_statistic(&case, &control);
            assert!(
                (stat - closed_form(&case, &control)).abs() < 1e-9,
                "{} vs {}",
                stat,
                closed_form(&case, &control)
            );
        }
    }

    #[test]
    fn test_no_trend() {
        let r = trend_test(&c(10, 20, 10), &c(20, 40, 20));
        assert!(r.statistic.abs() < 1e-12);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_tables() {
        assert!(trend_statistic(&c(0, 0, 0), &c(3, 4, 5)).is_nan());
        // every sample in one genotype: zero variance
        let r = trend_test(&c(5, 0, 0), &c(9, 0, 0));
        assert!(r.statistic.is_nan());
        assert!(r.p_value.is_nan());
    }
}
