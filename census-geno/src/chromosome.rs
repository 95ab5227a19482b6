//! Chromosome vocabulary.
//!
//! Labels are normalized once when a marker is read so the counting rules
//! can match on a closed enum. Accepted forms:
//! - `1`..`22`, optionally prefixed with `chr`
//! - `X`, `Y`, `XY`, `MT` (also `M`)
//! - PLINK numeric codes 23 = X, 24 = Y, 25 = XY, 26 = MT
//!
//! Anything else is kept verbatim as [`Chromosome::Other`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chromosome {
    Autosome(u8),
    X,
    Y,
    /// Pseudo-autosomal region (XY).
    PseudoAutosomal,
    Mitochondrial,
    Other(String),
}

impl Chromosome {
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("CHR").unwrap_or(&upper);

        match bare {
            "X" | "23" => Chromosome::X,
            "Y" | "24" => Chromosome::Y,
            "XY" | "25" => Chromosome::PseudoAutosomal,
            "MT" | "M" | "26" => Chromosome::Mitochondrial,
            _ => match bare.parse::<u8>() {
                Ok(n) if (1..=22).contains(&n) => Chromosome::Autosome(n),
                _ => Chromosome::Other(trimmed.to_string()),
            },
        }
    }

    /// X and Y outside the pseudo-autosomal region.
    pub fn is_sex_linked(&self) -> bool {
        matches!(self, Chromosome::X | Chromosome::Y)
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(n) => write!(f, "{}", n),
            Chromosome::X => write!(f, "X"),
            Chromosome::Y => write!(f, "Y"),
            Chromosome::PseudoAutosomal => write!(f, "XY"),
            Chromosome::Mitochondrial => write!(f, "MT"),
            Chromosome::Other(label) => write!(f, "{}", label),
        }
    }
}

impl From<&str> for Chromosome {
    fn from(label: &str) -> Self {
        Chromosome::parse(label)
    }
}
