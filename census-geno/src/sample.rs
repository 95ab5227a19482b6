//! Sample metadata and the per-study sample registry.
//!
//! The statistics code only consumes sex and affection status. The
//! registry is the persisted source; a phenotype override file may replace
//! those two fields for the samples it lists, for a single run.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// PLINK convention: 1 = male, 2 = female, anything else unknown.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" | "M" | "m" | "male" | "MALE" => Sex::Male,
            "2" | "F" | "f" | "female" | "FEMALE" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Affection {
    Affected,
    Unaffected,
    #[default]
    Unknown,
}

impl Affection {
    /// PLINK convention: 2 = affected (case), 1 = unaffected (control).
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "2" => Affection::Affected,
            "1" => Affection::Unaffected,
            _ => Affection::Unknown,
        }
    }
}

/// One row of a sample info file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleInfo {
    pub family_id: String,
    pub sample_id: String,
    pub father_id: String,
    pub mother_id: String,
    pub sex: Sex,
    pub affection: Affection,
    pub category: String,
    pub disease: String,
    pub population: String,
    pub age: Option<f64>,
}

impl SampleInfo {
    pub fn new(sample_id: impl Into<String>, sex: Sex, affection: Affection) -> Self {
        Self {
            sample_id: sample_id.into(),
            sex,
            affection,
            ..Default::default()
        }
    }

    pub fn key(&self) -> SampleKey {
        SampleKey::new(self.family_id.clone(), self.sample_id.clone())
    }
}

/// Identity of a sample: PLINK allows the same sample ID in several
/// families, so the family ID is part of the key. An empty family ID means
/// the source did not record one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SampleKey {
    pub family_id: String,
    pub sample_id: String,
}

impl SampleKey {
    pub fn new(family_id: impl Into<String>, sample_id: impl Into<String>) -> Self {
        Self {
            family_id: family_id.into(),
            sample_id: sample_id.into(),
        }
    }

    /// Key of a sample with no family ID.
    pub fn of_sample(sample_id: impl Into<String>) -> Self {
        Self::new(String::new(), sample_id)
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.family_id.is_empty() {
            write!(f, "{}", self.sample_id)
        } else {
            write!(f, "{}:{}", self.family_id, self.sample_id)
        }
    }
}

/// Sex and affection aligned to a list of samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplePhenotypes {
    pub sexes: Vec<Sex>,
    pub affections: Vec<Affection>,
}

impl SamplePhenotypes {
    pub fn len(&self) -> usize {
        self.sexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sexes.is_empty()
    }
}

/// Sample metadata keyed by (family ID, sample ID), preserving insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    samples: Vec<SampleInfo>,
    by_key: HashMap<SampleKey, usize>,
    /// Positions of every sample sharing a sample ID.
    by_id: HashMap<String, Vec<usize>>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: impl IntoIterator<Item = SampleInfo>) -> Self {
        let mut registry = Self::new();
        for s in samples {
            registry.insert(s);
        }
        registry
    }

    /// Insert or replace the sample with the same family and sample ID.
    pub fn insert(&mut self, info: SampleInfo) {
        let key = info.key();
        match self.by_key.get(&key) {
            Some(&idx) => self.samples[idx] = info,
            None => {
                let idx = self.samples.len();
                self.by_id.entry(key.sample_id.clone()).or_default().push(idx);
                self.by_key.insert(key, idx);
                self.samples.push(info);
            }
        }
    }

    /// Look up a sample by its full key.
    ///
    /// When either side lacks a family ID, a sample ID carried by exactly
    /// one registered sample still matches.
    pub fn get(&self, key: &SampleKey) -> Option<&SampleInfo> {
        if let Some(&i) = self.by_key.get(key) {
            return Some(&self.samples[i]);
        }
        match self.by_id.get(&key.sample_id).map(Vec::as_slice) {
            Some(&[i])
                if key.family_id.is_empty() || self.samples[i].family_id.is_empty() =>
            {
                Some(&self.samples[i])
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    /// Resolve sex and affection for `samples`, in order.
    ///
    /// Samples listed in `overrides` take their sex and affection from it;
    /// all others fall back to this registry. Samples found in neither are
    /// reported as unknown.
    pub fn resolve(
        &self,
        samples: &[SampleKey],
        overrides: Option<&SampleRegistry>,
    ) -> SamplePhenotypes {
        let mut sexes = Vec::with_capacity(samples.len());
        let mut affections = Vec::with_capacity(samples.len());
        let mut n_unknown = 0usize;
        let mut n_overridden = 0usize;

        for key in samples {
            let info = match overrides.and_then(|o| o.get(key)) {
                Some(info) => {
                    n_overridden += 1;
                    Some(info)
                }
                None => self.get(key),
            };
            match info {
                Some(info) => {
                    sexes.push(info.sex);
                    affections.push(info.affection);
                }
                None => {
                    n_unknown += 1;
                    sexes.push(Sex::Unknown);
                    affections.push(Affection::Unknown);
                }
            }
        }

        if n_overridden > 0 {
            tracing::info!(
                "Phenotype override applied to {} of {} samples",
                n_overridden,
                samples.len()
            );
        }
        if n_unknown > 0 {
            tracing::warn!(
                "{} samples have no registry entry; treating sex and affection as unknown",
                n_unknown
            );
        }

        SamplePhenotypes { sexes, affections }
    }
}
