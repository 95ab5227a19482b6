//! Sample info / phenotype override file parser.
//!
//! Tab- or space-delimited text with a header row. The canonical column
//! order is
//!
//! ```text
//! FamilyID  SampleID  FatherID  MotherID  Sex  Affection  Category  Disease  Population  Age
//! ```
//!
//! Columns are located by header name, so extra or reordered columns are
//! fine. Only the sample ID, sex and affection columns are required.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::sample::{Affection, SampleInfo, SampleRegistry, Sex};

struct Columns {
    family: Option<usize>,
    sample: usize,
    father: Option<usize>,
    mother: Option<usize>,
    sex: usize,
    affection: usize,
    category: Option<usize>,
    disease: Option<usize>,
    population: Option<usize>,
    age: Option<usize>,
}

impl Columns {
    fn from_header(headers: &[&str]) -> Result<Self> {
        let find = |names: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                let h = normalize_header(h);
                names.iter().any(|n| h == *n)
            })
        };

        let sample = find(&["sampleid", "sample", "iid"])
            .ok_or_else(|| anyhow!("Sample ID column not found in header"))?;
        let sex = find(&["sex"]).ok_or_else(|| anyhow!("Sex column not found in header"))?;
        let affection = find(&["affection", "affected", "phenotype", "pheno"])
            .ok_or_else(|| anyhow!("Affection column not found in header"))?;

        Ok(Self {
            family: find(&["familyid", "family", "fid"]),
            sample,
            father: find(&["fatherid", "father", "pat"]),
            mother: find(&["motherid", "mother", "mat"]),
            sex,
            affection,
            category: find(&["category"]),
            disease: find(&["disease"]),
            population: find(&["population"]),
            age: find(&["age"]),
        })
    }

    fn required_width(&self) -> usize {
        self.sample.max(self.sex).max(self.affection) + 1
    }
}

fn normalize_header(h: &str) -> String {
    h.trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Parse a sample info file into rows, in file order.
pub fn parse_sample_info_file(path: &Path) -> Result<Vec<SampleInfo>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sample info file: {}", path.display()))?;
    parse_sample_info(&contents)
        .with_context(|| format!("Invalid sample info file: {}", path.display()))
}

/// Parse sample info rows from text.
pub fn parse_sample_info(contents: &str) -> Result<Vec<SampleInfo>> {
    let mut lines = contents.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| anyhow!("Empty sample info file"))?;

    // Detect delimiter
    let tab_delimited = header_line.contains('\t');
    let split = |line: &str| -> Vec<String> {
        if tab_delimited {
            line.split('\t').map(|s| s.trim().to_string()).collect()
        } else {
            line.split_whitespace().map(|s| s.to_string()).collect()
        }
    };

    let headers = split(header_line);
    let header_refs: Vec<&str> = headers.iter().map(|s| s.as_str()).collect();
    let cols = Columns::from_header(&header_refs)?;

    let mut samples = Vec::new();
    for (line_num, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split(line);
        if fields.len() < cols.required_width() {
            bail!(
                "Line {} has too few fields (expected at least {})",
                line_num + 2,
                cols.required_width()
            );
        }

        let opt = |idx: Option<usize>| -> String {
            idx.and_then(|i| fields.get(i)).cloned().unwrap_or_default()
        };

        samples.push(SampleInfo {
            family_id: opt(cols.family),
            sample_id: fields[cols.sample].clone(),
            father_id: opt(cols.father),
            mother_id: opt(cols.mother),
            sex: Sex::from_code(&fields[cols.sex]),
            affection: Affection::from_code(&fields[cols.affection]),
            category: opt(cols.category),
            disease: opt(cols.disease),
            population: opt(cols.population),
            age: cols
                .age
                .and_then(|i| fields.get(i))
                .and_then(|s| s.parse::<f64>().ok()),
        });
    }

    Ok(samples)
}

/// Load a phenotype override file as a registry keyed by sample ID.
pub fn load_phenotype_override(path: &Path) -> Result<SampleRegistry> {
    let samples = parse_sample_info_file(path)?;
    tracing::info!(
        "Loaded phenotype override for {} samples from {}",
        samples.len(),
        path.display()
    );
    Ok(SampleRegistry::from_samples(samples))
}
