// ==============================================================================
// genotype.rs - Allele Normalization and Genotype Calls
// ==============================================================================
// Description: Normalizes GeneMapper allele tokens into unordered genotype calls
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   GeneMapper writes SNPXPlex calls as "<locus index>_<base>" (e.g. "01_C").
//   - "01_C" / "c" / " C " → "C"
//   - "" / "nan" → no call
//   - (C, T) and (T, C) → the same genotype C/T
//   - (C, -) → C/C when single calls are read as homozygous
//   The sex marker is read from the X and Y calls:
//   - X only → female, X and Y → male, anything else → undetermined
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize a raw GeneMapper allele cell
///
/// Returns `None` for empty cells and the `nan` placeholder written by
/// spreadsheet round-trips. A numeric locus prefix (`01_`) is dropped and the
/// remaining call is upper-cased.
///
/// # Examples
/// ```
/// use snpxcheck::genotype::normalize_allele;
///
/// assert_eq!(normalize_allele("01_C"), Some("C".to_string()));
/// assert_eq!(normalize_allele(" t "), Some("T".to_string()));
/// assert_eq!(normalize_allele("nan"), None);
/// assert_eq!(normalize_allele(""), None);
/// ```
pub fn normalize_allele(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }

    let call = trimmed.rsplit('_').next().unwrap_or(trimmed).trim();
    if call.is_empty() || call.eq_ignore_ascii_case("nan") {
        return None;
    }

    Some(call.to_ascii_uppercase())
}

/// Genotype call at one locus, stored as an unordered allele pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Genotype {
    /// No usable allele at this locus
    NoCall,
    /// Two alleles, sorted so that `first <= second`
    Called { first: String, second: String },
}

impl Genotype {
    /// Build a genotype from the two allele slots of a marker record
    ///
    /// A lone allele is a homozygous call when `single_allele_is_homozygous`
    /// is set (GeneMapper writes homozygous SNP calls once), otherwise it is
    /// treated as a partial call and becomes `NoCall`.
    pub fn from_calls(
        allele_1: Option<&str>,
        allele_2: Option<&str>,
        single_allele_is_homozygous: bool,
    ) -> Self {
        match (allele_1, allele_2) {
            (Some(a), Some(b)) => Self::pair(a, b),
            (Some(a), None) | (None, Some(a)) if single_allele_is_homozygous => Self::pair(a, a),
            _ => Genotype::NoCall,
        }
    }

    fn pair(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Genotype::Called {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn is_called(&self) -> bool {
        matches!(self, Genotype::Called { .. })
    }

    /// Number of alleles the two calls have in common (0, 1 or 2)
    ///
    /// Two no-calls are counted as fully shared and a single no-call as
    /// nothing shared, so that empty wells weigh on the identity matrix the
    /// same way in both directions.
    pub fn shared_alleles(&self, other: &Genotype) -> u8 {
        match (self, other) {
            (Genotype::NoCall, Genotype::NoCall) => 2,
            (Genotype::NoCall, _) | (_, Genotype::NoCall) => 0,
            (
                Genotype::Called { first: a1, second: a2 },
                Genotype::Called { first: b1, second: b2 },
            ) => {
                let mut remaining = vec![b1.as_str(), b2.as_str()];
                let mut shared = 0;
                for allele in [a1.as_str(), a2.as_str()] {
                    if let Some(pos) = remaining.iter().position(|b| *b == allele) {
                        remaining.swap_remove(pos);
                        shared += 1;
                    }
                }
                shared
            }
        }
    }

    /// Display form used in reports: "C/T", "C" for homozygous, "" for no call
    pub fn display(&self) -> String {
        match self {
            Genotype::NoCall => String::new(),
            Genotype::Called { first, second } if first == second => first.clone(),
            Genotype::Called { first, second } => format!("{}/{}", first, second),
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genotype::NoCall => f.write_str("no call"),
            _ => f.write_str(&self.display()),
        }
    }
}

/// Sex call derived from the X/Y marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SexCall {
    Female,
    Male,
    Undetermined,
}

impl SexCall {
    /// Determine sex from the two normalized calls of the sex locus
    pub fn from_calls(allele_1: Option<&str>, allele_2: Option<&str>) -> Self {
        let calls = [allele_1, allele_2];
        let has_x = calls.iter().any(|c| *c == Some("X"));
        let has_y = calls.iter().any(|c| *c == Some("Y"));

        match (has_x, has_y) {
            (true, false) => SexCall::Female,
            (true, true) => SexCall::Male,
            _ => SexCall::Undetermined,
        }
    }

    pub fn is_determined(&self) -> bool {
        !matches!(self, SexCall::Undetermined)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SexCall::Female => "female",
            SexCall::Male => "male",
            SexCall::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for SexCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
