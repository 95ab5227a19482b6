//! Contingency-table statistics.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Upper-tail probability of a chi-square statistic.
///
/// NaN for a non-finite statistic or non-positive degrees of freedom.
pub fn chi_square_pvalue(statistic: f64, df: f64) -> f64 {
    if !statistic.is_finite() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(statistic.max(0.0)).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Pearson chi-square statistic of an r x c table of counts.
///
/// Cells whose row or column margin is zero contribute nothing. NaN when
/// fewer than two rows or two columns have a non-zero margin.
pub fn pearson_chi_square<const C: usize>(table: &[[f64; C]]) -> f64 {
    let row_totals: Vec<f64> = table.iter().map(|row| row.iter().sum()).collect();
    let mut col_totals = [0.0; C];
    for row in table {
        for (total, &x) in col_totals.iter_mut().zip(row) {
            *total += x;
        }
    }
    let n: f64 = row_totals.iter().sum();

    let rows = row_totals.iter().filter(|&&t| t > 0.0).count();
    let cols = col_totals.iter().filter(|&&t| t > 0.0).count();
    if rows < 2 || cols < 2 {
        return f64::NAN;
    }

    let mut statistic = 0.0;
    for (row, &r) in table.iter().zip(&row_totals) {
        for (&observed, &c) in row.iter().zip(&col_totals) {
            let expected = r * c / n;
            if expected > 0.0 {
                statistic += (observed - expected).powi(2) / expected;
            }
        }
    }
    statistic
}

/// `(a * d) / (b * c)`; NaN when the denominator is zero.
pub fn odds_ratio(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let den = b * c;
    if den == 0.0 {
        f64::NAN
    } else {
        a * d / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chi_square_pvalue() {
        assert!((chi_square_pvalue(0.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((chi_square_pvalue(3.841458820694124, 1.0) - 0.05).abs() < 1e-9);
        assert!((chi_square_pvalue(5.991464547107979, 2.0) - 0.05).abs() < 1e-9);
        assert!(chi_square_pvalue(f64::NAN, 1.0).is_nan());
        assert!(chi_square_pvalue(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_pearson_2x2() {
        // classic example: chi2 = 100 * (10*40 - 30*20)^2 / (40*60*30*70)
        let stat = pearson_chi_square(&[[10.0, 30.0], [20.0, 40.0]]);
        let expected = 100.0 * (400.0f64 - 600.0).powi(2) / (40.0 * 60.0 * 30.0 * 70.0);
        assert!((stat - expected).abs() < 1e-10);
    }

    #[test]
    fn test_pearson_empty_margins() {
        let with_empty = pearson_chi_square(&[[5.0, 0.0, 5.0], [1.0, 0.0, 9.0]]);
        let without = pearson_chi_square(&[[5.0, 5.0], [1.0, 9.0]]);
        assert!((with_empty - without).abs() < 1e-12);

        assert!(pearson_chi_square(&[[5.0, 0.0], [7.0, 0.0]]).is_nan());
        assert!(pearson_chi_square(&[[0.0, 0.0], [0.0, 0.0]]).is_nan());
    }

    #[test]
    fn test_odds_ratio() {
        assert_eq!(odds_ratio(10.0, 20.0, 5.0, 40.0), 4.0);
        assert!(odds_ratio(1.0, 0.0, 3.0, 4.0).is_nan());
    }
}
