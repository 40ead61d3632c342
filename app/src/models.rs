// ==============================================================================
// models.rs - Marker, Sample and Status Models
// ==============================================================================
// Description: Data structures shared by the parser, validator and comparator
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::genotype::{Genotype, SexCall};

/// One locus call of one replicate, as read from the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Patient identifier (sample name without replicate suffix)
    pub sample_id: String,

    /// Locus name from the panel (e.g., "Locus 3", "Sex")
    pub locus_name: String,

    /// Normalized first allele, None for no call
    pub allele_1: Option<String>,

    /// Normalized second allele, None for no call
    pub allele_2: Option<String>,

    /// Full GeneMapper sample name (e.g., "P12bis")
    pub replicate_id: String,

    /// 1-based line of the export this call was read from
    pub line: usize,
}

impl MarkerRecord {
    pub fn has_call(&self) -> bool {
        self.allele_1.is_some() || self.allele_2.is_some()
    }
}

/// Records of one replicate, in export order
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateRecords {
    pub replicate_id: String,
    pub records: Vec<MarkerRecord>,
}

/// Records of one patient, replicates in order of first appearance
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecords {
    pub sample_id: String,
    pub replicates: Vec<ReplicateRecords>,
}

impl SampleRecords {
    pub fn records(&self) -> impl Iterator<Item = &MarkerRecord> {
        self.replicates.iter().flat_map(|r| r.records.iter())
    }
}

/// Validated genotypes of one replicate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replicate {
    pub sample_id: String,
    pub replicate_id: String,

    /// Marker genotypes keyed by locus name
    pub genotypes: BTreeMap<String, Genotype>,

    /// Sex call, None when the panel or the export carries no sex marker
    pub sex: Option<SexCall>,

    /// SHA-256 of the called marker genotypes, None when nothing is called
    pub signature: Option<String>,

    /// Number of marker loci with at least one allele called
    pub called_loci: usize,

    /// Whether the sex marker carries any call (X or Y)
    pub sex_called: bool,
}

impl Replicate {
    pub fn genotype(&self, locus: &str) -> Option<&Genotype> {
        self.genotypes.get(locus)
    }
}

/// A validated patient: one or more replicates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub sample_id: String,
    pub is_negative_control: bool,
    pub replicates: Vec<Replicate>,
}

impl Sample {
    /// Whether any replicate carries a call, sex marker included
    pub fn has_calls(&self) -> bool {
        self.replicates.iter().any(|r| r.called_loci > 0 || r.sex_called)
    }
}

/// Report severity classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Outcome of the intra-patient checks for one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStatus {
    pub severity: Severity,
    pub description: String,
}

impl SampleStatus {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
        }
    }
}

/// Natural ordering of sample identifiers ("P2" < "P10")
///
/// Digit runs compare by value, everything else byte-wise. Ties on value
/// ("P01" vs "P1") fall back to plain string order so the ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let start_i = i;
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            let start_j = j;
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }

            let left = trim_leading_zeros(&ab[start_i..i]);
            let right = trim_leading_zeros(&bb[start_j..j]);
            let ord = left.len().cmp(&right.len()).then_with(|| left.cmp(right));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ab[i].cmp(&bb[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (ab.len() - i).cmp(&(bb.len() - j)).then_with(|| a.cmp(b))
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().position(|d| *d != b'0').unwrap_or(digits.len());
    &digits[first..]
}
