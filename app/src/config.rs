// ==============================================================================
// config.rs - Analysis Configuration
// ==============================================================================
// Description: Panel, thresholds and naming rules passed into every analysis
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::panel::PanelDefinition;

/// Upper bound for one uploaded export (plain or decompressed)
pub const DEFAULT_MAX_INPUT_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// GeneMapper export layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportLayout {
    /// Detect from the header row
    Auto,
    /// One row per sample, allele columns per locus
    Wide,
    /// One row per sample and marker
    Long,
}

impl ExportLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportLayout::Auto => "auto",
            ExportLayout::Wide => "wide",
            ExportLayout::Long => "long",
        }
    }
}

/// Errors raised by an invalid configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Panel defines no locus")]
    EmptyPanel,

    #[error("Locus '{0}' is defined more than once")]
    DuplicateLocus(String),

    #[error("Column '{0}' is mapped more than once")]
    DuplicateColumn(String),

    #[error("Locus '{0}' has an empty allele alphabet")]
    EmptyAlphabet(String),

    #[error("minimum_shared_loci is {required} but the panel only has {available} marker loci")]
    MinimumSharedLociTooHigh { required: usize, available: usize },

    #[error("threads must be at least 1")]
    ZeroThreads,
}

/// Everything an analysis run needs besides the input itself
///
/// Passed explicitly to the parser, validator, comparator and aggregator so
/// that two runs with equal configurations and inputs produce equal reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub panel: PanelDefinition,

    /// Below this number of evaluated marker loci a comparison is never a match
    pub minimum_shared_loci: usize,

    /// Read a lone allele as a homozygous call
    pub single_allele_is_homozygous: bool,

    /// Case-insensitive substrings marking negative controls
    pub negative_control_keywords: Vec<String>,

    /// Sample name suffixes marking replicates of the same patient
    pub replicate_suffixes: Vec<String>,

    pub layout: ExportLayout,

    /// Compare replicates of different patients
    pub inter_patient: bool,

    /// Worker threads for pairwise comparisons (None = rayon default)
    pub threads: Option<usize>,

    pub max_input_bytes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            panel: PanelDefinition::snpxplex(),
            minimum_shared_loci: 10,
            single_allele_is_homozygous: true,
            negative_control_keywords: vec!["neg".to_string(), "tem".to_string()],
            replicate_suffixes: vec!["bis".to_string(), "ter".to_string()],
            layout: ExportLayout::Auto,
            inter_patient: true,
            threads: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.panel.validate()?;

        if self.minimum_shared_loci > self.panel.marker_count() {
            return Err(ConfigError::MinimumSharedLociTooHigh {
                required: self.minimum_shared_loci,
                available: self.panel.marker_count(),
            });
        }

        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }

        Ok(())
    }

    /// Whether a sample name designates a negative control
    pub fn is_negative_control(&self, sample_name: &str) -> bool {
        if sample_name.is_empty() {
            return false;
        }
        let name = sample_name.to_lowercase();
        self.negative_control_keywords
            .iter()
            .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
    }

    /// Patient identifier of a sample name (replicate suffix removed)
    ///
    /// `P12bis` → `P12`, `P12-ter` → `P12`. A name made only of a suffix is
    /// kept as is.
    pub fn patient_id(&self, sample_name: &str) -> String {
        for suffix in &self.replicate_suffixes {
            if suffix.is_empty() {
                continue;
            }
            if let Some(stem) = sample_name.strip_suffix(suffix.as_str()) {
                let stem = stem.trim_end_matches([' ', '_', '-', '.']);
                if !stem.is_empty() {
                    return stem.to_string();
                }
            }
        }
        sample_name.to_string()
    }
}
