//! Space-delimited text output of association results.

use anyhow::Result;

use super::AssociationEntry;

pub fn write_results_header(writer: &mut impl std::io::Write) -> Result<()> {
    writeln!(writer, "INDEX SNPID TEST STAT p.value OR OR.het")?;
    Ok(())
}

/// Write one result line; the heterozygote OR column is `NA` outside the
/// genotypic test.
pub fn write_result_line(writer: &mut impl std::io::Write, entry: &AssociationEntry) -> Result<()> {
    let or_het = entry
        .result
        .odds_ratio_het
        .map_or_else(|| "NA".to_string(), |v| format!("{:.6}", v));
    writeln!(
        writer,
        "{} {} {:?} {:.6} {:e} {:.6} {}",
        entry.index,
        entry.key,
        entry.test,
        entry.result.statistic,
        entry.result.p_value,
        entry.result.odds_ratio,
        or_het
    )?;
    Ok(())
}
