// ==============================================================================
// processor.rs - Identity Check Pipeline
// ==============================================================================
// Description: Runs one GeneMapper export through parse, validate, compare and
//              aggregate
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregator::{Aggregator, AnalysisReport, ReportMetadata, RunMetadata};
use crate::audit::{self, AuditEventType};
use crate::comparator::{Comparator, ComparisonMode, PairRequest};
use crate::config::{AnalysisConfig, ConfigError};
use crate::input::{compute_sha256, CheckedInput, InputChecker, InputError};
use crate::models::Sample;
use crate::parsers::{GeneMapperParser, ParseError};
use crate::validator::MarkerValidator;

/// Errors that stop a run before a report exists
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Input rejected: {0}")]
    Input(#[from] InputError),

    #[error("Failed to parse GeneMapper export: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to build comparison thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct IdentityProcessor {
    run_id: Uuid,
    config: AnalysisConfig,
}

impl IdentityProcessor {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            config,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Check an uploaded buffer (plain or gzip) and analyse it
    pub fn process_buffer(
        &self,
        data: &[u8],
        metadata: RunMetadata,
    ) -> Result<AnalysisReport, ProcessError> {
        let checker = InputChecker::new(self.config.max_input_bytes);
        let checked = match checker.check(data, metadata.file_name.as_deref()) {
            Ok(checked) => checked,
            Err(e) => {
                audit::log_event(
                    AuditEventType::InputRejected,
                    self.run_id,
                    metadata.file_name.clone(),
                    serde_json::json!({ "error": e.to_string(), "size": data.len() }),
                );
                return Err(e.into());
            }
        };

        audit::log_event(
            AuditEventType::InputAccepted,
            self.run_id,
            checked.file_name.clone(),
            accepted_details(&checked),
        );

        self.analyze(&checked.text, metadata, checked.sha256)
    }

    /// Analyse an export already held as text
    pub fn process_text(
        &self,
        text: &str,
        metadata: RunMetadata,
    ) -> Result<AnalysisReport, ProcessError> {
        let sha256 = compute_sha256(text.as_bytes());
        self.analyze(text, metadata, sha256)
    }

    fn analyze(
        &self,
        text: &str,
        metadata: RunMetadata,
        sha256: String,
    ) -> Result<AnalysisReport, ProcessError> {
        info!("Starting identity check run {}", self.run_id);
        audit::log_event(
            AuditEventType::RunStarted,
            self.run_id,
            metadata.file_name.clone(),
            serde_json::json!({
                "panel": self.config.panel.name,
                "layout": self.config.layout.as_str(),
                "minimum_shared_loci": self.config.minimum_shared_loci,
            }),
        );

        // 1. Parse
        let export = match GeneMapperParser::new(&self.config).parse_str(text) {
            Ok(export) => export,
            Err(e) => {
                audit::log_event(
                    AuditEventType::ParseFailed,
                    self.run_id,
                    metadata.file_name.clone(),
                    serde_json::json!({ "error": e.to_string() }),
                );
                return Err(e.into());
            }
        };
        info!(
            "Parsed {} records: {} patient(s), {} replicate(s) ({} layout)",
            export.record_count,
            export.samples.len(),
            export.replicate_count(),
            export.layout.as_str()
        );

        // 2. Validate each sample on its own
        let validator = MarkerValidator::new(&self.config);
        let mut samples = Vec::new();
        let mut rejected = Vec::new();
        for records in &export.samples {
            match validator.validate(records) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    audit::log_event(
                        AuditEventType::SampleRejected,
                        self.run_id,
                        Some(e.sample_id.clone()),
                        serde_json::json!({ "violations": e.violations }),
                    );
                    rejected.push(e);
                }
            }
        }
        info!("{} sample(s) validated, {} rejected", samples.len(), rejected.len());

        // 3. Compare
        let comparator = Comparator::new(&self.config);
        let pairs = self.pairs(&samples);
        debug!("Comparing {} pair(s)", pairs.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.unwrap_or(0))
            .build()?;
        let results = pool.install(|| comparator.compare_pairs(&pairs));
        info!("{} comparison(s) done on {} thread(s)", results.len(), pool.current_num_threads());

        // 4. Aggregate
        let file_name = metadata.file_name.clone();
        let report_metadata = ReportMetadata {
            run: metadata,
            input_sha256: Some(sha256),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let report = Aggregator::new(&self.config).aggregate(report_metadata, samples, rejected, results);

        audit::log_event(
            AuditEventType::RunCompleted,
            self.run_id,
            file_name,
            serde_json::json!({
                "patients": report.summary.patients,
                "rejected": report.summary.rejected_samples,
                "intra_errors": report.summary.intra_errors,
                "inter_errors": report.summary.inter_errors,
                "severity": report.summary.severity,
            }),
        );

        Ok(report)
    }

    /// Intra pairs for every patient, then inter pairs when enabled
    ///
    /// Negative controls take no part in comparisons.
    fn pairs<'s>(&self, samples: &'s [Sample]) -> Vec<PairRequest<'s>> {
        let comparable: Vec<&Sample> = samples.iter().filter(|s| !s.is_negative_control).collect();
        let mut pairs = Vec::new();

        for sample in comparable.iter().copied() {
            for (i, left) in sample.replicates.iter().enumerate() {
                for right in &sample.replicates[i + 1..] {
                    pairs.push(PairRequest {
                        left,
                        right,
                        mode: ComparisonMode::Intra,
                    });
                }
            }
        }

        if self.config.inter_patient {
            for (i, a) in comparable.iter().copied().enumerate() {
                for b in comparable[i + 1..].iter().copied() {
                    for left in &a.replicates {
                        for right in &b.replicates {
                            pairs.push(PairRequest {
                                left,
                                right,
                                mode: ComparisonMode::Inter,
                            });
                        }
                    }
                }
            }
        }

        pairs
    }
}

/// Audit details of an accepted input
fn accepted_details(checked: &CheckedInput) -> serde_json::Value {
    serde_json::json!({
        "size": checked.size,
        "sha256": checked.sha256,
        "extension": checked.extension,
        "compressed": checked.compressed,
        "checked_at": checked.checked_at.to_rfc3339(),
    })
}
