// ==============================================================================
// validator.rs - Marker Validation
// ==============================================================================
// Description: Validates parsed marker records of one sample against the panel
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Checks (all of them, never stopping at the first violation):
//   1. every record names a panel locus
//   2. a locus appears at most once per replicate
//   3. called alleles belong to the locus alphabet
//   4. every marker locus is called in at least one replicate
//      (negative controls are exempt: a clean control has no calls)
// ==============================================================================

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::genotype::{Genotype, SexCall};
use crate::models::{MarkerRecord, Replicate, ReplicateRecords, Sample, SampleRecords};

/// A single reason a sample was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    UnknownLocus {
        replicate_id: String,
        locus: String,
        line: usize,
    },
    DuplicateLocus {
        replicate_id: String,
        locus: String,
        line: usize,
    },
    MalformedAllele {
        replicate_id: String,
        locus: String,
        allele: String,
        line: usize,
    },
    MissingLocus {
        locus: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::UnknownLocus {
                replicate_id,
                locus,
                line,
            } => write!(f, "{}: unknown locus '{}' (line {})", replicate_id, locus, line),
            Violation::DuplicateLocus {
                replicate_id,
                locus,
                line,
            } => write!(f, "{}: duplicate locus '{}' (line {})", replicate_id, locus, line),
            Violation::MalformedAllele {
                replicate_id,
                locus,
                allele,
                line,
            } => write!(
                f,
                "{}: invalid allele '{}' for locus '{}' (line {})",
                replicate_id, allele, locus, line
            ),
            Violation::MissingLocus { locus } => write!(f, "locus '{}' not called", locus),
        }
    }
}

/// Every violation found in one sample
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Sample {sample_id} failed validation: {}", describe(.violations))]
pub struct ValidationError {
    pub sample_id: String,
    pub violations: Vec<Violation>,
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates samples and builds their replicate profiles
pub struct MarkerValidator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> MarkerValidator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Validate all records of one sample
    ///
    /// Returns the validated `Sample` or a `ValidationError` listing every
    /// violation: record-level ones in record order, then missing loci in
    /// panel order.
    pub fn validate(&self, sample: &SampleRecords) -> Result<Sample, ValidationError> {
        let panel = &self.config.panel;
        let is_negative_control = sample
            .replicates
            .iter()
            .any(|r| self.config.is_negative_control(&r.replicate_id));

        let mut violations = Vec::new();

        for replicate in &sample.replicates {
            let mut seen: HashSet<&str> = HashSet::new();
            for record in &replicate.records {
                if !panel.knows_locus(&record.locus_name) {
                    violations.push(Violation::UnknownLocus {
                        replicate_id: record.replicate_id.clone(),
                        locus: record.locus_name.clone(),
                        line: record.line,
                    });
                    continue;
                }

                if !seen.insert(record.locus_name.as_str()) {
                    violations.push(Violation::DuplicateLocus {
                        replicate_id: record.replicate_id.clone(),
                        locus: record.locus_name.clone(),
                        line: record.line,
                    });
                }

                for allele in [&record.allele_1, &record.allele_2].into_iter().flatten() {
                    if !panel.allele_allowed(&record.locus_name, allele) {
                        violations.push(Violation::MalformedAllele {
                            replicate_id: record.replicate_id.clone(),
                            locus: record.locus_name.clone(),
                            allele: allele.clone(),
                            line: record.line,
                        });
                    }
                }
            }
        }

        if !is_negative_control {
            for locus in &panel.loci {
                let called = sample
                    .records()
                    .any(|r| r.locus_name == locus.name && r.has_call());
                if !called {
                    violations.push(Violation::MissingLocus {
                        locus: locus.name.clone(),
                    });
                }
            }
        }

        if !violations.is_empty() {
            warn!(
                "Sample {} rejected: {} violation(s)",
                sample.sample_id,
                violations.len()
            );
            return Err(ValidationError {
                sample_id: sample.sample_id.clone(),
                violations,
            });
        }

        let replicates = sample
            .replicates
            .iter()
            .map(|r| self.build_replicate(&sample.sample_id, r))
            .collect();

        debug!(
            "Sample {} validated ({} replicate(s))",
            sample.sample_id,
            sample.replicates.len()
        );

        Ok(Sample {
            sample_id: sample.sample_id.clone(),
            is_negative_control,
            replicates,
        })
    }

    /// Build the replicate profile from records that passed validation
    fn build_replicate(&self, sample_id: &str, replicate: &ReplicateRecords) -> Replicate {
        let panel = &self.config.panel;
        let mut genotypes = BTreeMap::new();
        let mut sex = None;
        let mut sex_called = false;

        for record in &replicate.records {
            if panel.is_sex_locus(&record.locus_name) {
                sex_called = record.has_call();
                sex = Some(SexCall::from_calls(
                    record.allele_1.as_deref(),
                    record.allele_2.as_deref(),
                ));
            } else {
                genotypes.insert(record.locus_name.clone(), self.genotype(record));
            }
        }

        let called_loci = genotypes
            .keys()
            .filter(|locus| {
                replicate
                    .records
                    .iter()
                    .any(|r| &&r.locus_name == locus && r.has_call())
            })
            .count();

        let signature = self.signature(&genotypes);

        Replicate {
            sample_id: sample_id.to_string(),
            replicate_id: replicate.replicate_id.clone(),
            genotypes,
            sex,
            signature,
            called_loci,
            sex_called,
        }
    }

    fn genotype(&self, record: &MarkerRecord) -> Genotype {
        Genotype::from_calls(
            record.allele_1.as_deref(),
            record.allele_2.as_deref(),
            self.config.single_allele_is_homozygous,
        )
    }

    /// SHA-256 over the called genotypes in panel order
    ///
    /// Two replicates share a signature exactly when they carry the same
    /// genotype at every panel locus. Returns None when nothing is called.
    fn signature(&self, genotypes: &BTreeMap<String, Genotype>) -> Option<String> {
        if !genotypes.values().any(|g| g.is_called()) {
            return None;
        }

        let mut hasher = Sha256::new();
        for locus in &self.config.panel.loci {
            let call = genotypes.get(&locus.name).map(|g| g.display()).unwrap_or_default();
            hasher.update(locus.name.as_bytes());
            hasher.update(b"=");
            hasher.update(call.as_bytes());
            hasher.update(b";");
        }
        Some(format!("{:x}", hasher.finalize()))
    }
}
