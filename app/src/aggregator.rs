// ==============================================================================
// aggregator.rs - Result Aggregation
// ==============================================================================
// Description: Groups comparison results into the report handed to renderers
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Sample status (first rule that applies):
//   1. rejected by validation              → error
//   2. negative control with / without calls → error / info
//   3. single replicate                    → warning
//   4. intra MISMATCH                      → error (sex or SNP inconsistency)
//   5. intra INCONCLUSIVE                  → warning
//   6. otherwise                           → success
// ==============================================================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

use crate::comparator::{ComparisonMode, ComparisonResult, Comparator, LocusReason, Verdict};
use crate::config::AnalysisConfig;
use crate::genotype::SexCall;
use crate::models::{natural_cmp, Replicate, Sample, SampleStatus, Severity};
use crate::validator::ValidationError;

/// Caller-supplied description of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub date: Option<NaiveDate>,
    /// ISO week of `date`
    pub week: Option<u32>,
    pub file_name: Option<String>,
    pub interpreter: Option<String>,
    pub serie: Option<String>,
    pub comment: Option<String>,
}

impl RunMetadata {
    /// Set the run date and derive its ISO week
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self.week = Some(date.iso_week().week());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    #[serde(flatten)]
    pub run: RunMetadata,
    pub input_sha256: Option<String>,
    pub engine_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSettings {
    pub panel: String,
    pub loci: Vec<String>,
    pub sex_locus: Option<String>,
    pub minimum_shared_loci: usize,
    pub single_allele_is_homozygous: bool,
    pub inter_patient: bool,
}

/// Genotype of one locus as shown in reports ("C/T", "C", "")
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedGenotype {
    pub locus: String,
    pub call: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicateReport {
    pub replicate_id: String,
    pub sex: Option<SexCall>,
    pub signature: Option<String>,
    pub called_loci: usize,
    pub genotypes: Vec<DisplayedGenotype>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientReport {
    pub sample_id: String,
    pub status: SampleStatus,
    pub is_negative_control: bool,
    pub replicates: Vec<ReplicateReport>,
    pub intra: Vec<ComparisonResult>,
}

/// Pair keys ("left | right") per verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerdictBuckets {
    #[serde(rename = "match")]
    pub matches: Vec<String>,
    pub mismatch: Vec<String>,
    pub inconclusive: Vec<String>,
}

impl VerdictBuckets {
    fn from_results(results: &[ComparisonResult]) -> Self {
        let mut buckets = Self::default();
        for result in results {
            let key = result.pair_key();
            match result.verdict() {
                Verdict::Match => buckets.matches.push(key),
                Verdict::Mismatch => buckets.mismatch.push(key),
                Verdict::Inconclusive => buckets.inconclusive.push(key),
            }
        }
        buckets
    }

    fn counts(&self) -> VerdictCounts {
        VerdictCounts {
            matches: self.matches.len(),
            mismatches: self.mismatch.len(),
            inconclusive: self.inconclusive.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerdictGroups {
    pub intra: VerdictBuckets,
    pub inter: VerdictBuckets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictCounts {
    pub matches: usize,
    pub mismatches: usize,
    pub inconclusive: usize,
}

/// Replicates of different patients carrying the same genotype signature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdenticalProfileGroup {
    pub signature: String,
    pub sample_ids: Vec<String>,
    pub replicate_ids: Vec<String>,
}

/// Data behind the identity heatmap; row and column order follow `labels`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Heatmap {
    pub labels: Vec<String>,
    pub identity: Vec<Vec<f64>>,
    /// None on the diagonal and for pairs that were not compared
    pub verdicts: Vec<Vec<Option<Verdict>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub patients: usize,
    pub replicates: usize,
    pub rejected_samples: usize,
    pub negative_controls: usize,
    pub intra: VerdictCounts,
    pub inter: VerdictCounts,
    /// Patients whose status is `error`
    pub intra_errors: usize,
    /// Replicate pairs of different patients that match or share a signature
    pub inter_errors: usize,
    pub negative_controls_clean: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Everything a run produces, ready for serialization and rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    pub settings: ReportSettings,
    pub patients: Vec<PatientReport>,
    pub rejected: Vec<ValidationError>,
    pub inter: Vec<ComparisonResult>,
    pub by_verdict: VerdictGroups,
    pub identical_profiles: Vec<IdenticalProfileGroup>,
    pub heatmap: Heatmap,
    pub summary: ReportSummary,
    pub notices: Vec<Notice>,
}

pub struct Aggregator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Assemble the report of one run
    ///
    /// Input order does not matter: patients, replicates and pairs are all
    /// sorted in natural order of their identifiers.
    pub fn aggregate(
        &self,
        metadata: ReportMetadata,
        mut samples: Vec<Sample>,
        mut rejected: Vec<ValidationError>,
        results: Vec<ComparisonResult>,
    ) -> AnalysisReport {
        samples.sort_by(|a, b| natural_cmp(&a.sample_id, &b.sample_id));
        for sample in &mut samples {
            sample
                .replicates
                .sort_by(|a, b| natural_cmp(&a.replicate_id, &b.replicate_id));
        }
        rejected.sort_by(|a, b| natural_cmp(&a.sample_id, &b.sample_id));

        let (mut intra, mut inter): (Vec<_>, Vec<_>) = results
            .into_iter()
            .partition(|r| r.mode() == ComparisonMode::Intra);
        intra.sort_by(|a, b| a.cmp_pair(b));
        inter.sort_by(|a, b| a.cmp_pair(b));

        let by_verdict = VerdictGroups {
            intra: VerdictBuckets::from_results(&intra),
            inter: VerdictBuckets::from_results(&inter),
        };

        let patients = self.patients(&samples, &rejected, &intra);
        let identical_profiles = identical_profiles(&samples);
        let heatmap = self.heatmap(&samples, &intra, &inter);
        let summary = summarize(
            &samples,
            &rejected,
            &patients,
            &by_verdict,
            &inter,
            &identical_profiles,
        );
        let notices = self.notices(&patients, &summary);
        let summary = ReportSummary {
            severity: overall_severity(&patients, &notices),
            ..summary
        };

        info!(
            "Report: {} patient(s), {} intra pair(s), {} inter pair(s), severity {}",
            summary.patients,
            intra.len(),
            inter.len(),
            summary.severity.as_str()
        );

        AnalysisReport {
            metadata,
            settings: self.settings(),
            patients,
            rejected,
            inter,
            by_verdict,
            identical_profiles,
            heatmap,
            summary,
            notices,
        }
    }

    fn settings(&self) -> ReportSettings {
        let panel = &self.config.panel;
        ReportSettings {
            panel: panel.name.clone(),
            loci: panel.loci.iter().map(|l| l.name.clone()).collect(),
            sex_locus: panel.sex_locus.as_ref().map(|s| s.name.clone()),
            minimum_shared_loci: self.config.minimum_shared_loci,
            single_allele_is_homozygous: self.config.single_allele_is_homozygous,
            inter_patient: self.config.inter_patient,
        }
    }

    fn patients(
        &self,
        samples: &[Sample],
        rejected: &[ValidationError],
        intra: &[ComparisonResult],
    ) -> Vec<PatientReport> {
        let mut patients: Vec<PatientReport> = samples
            .iter()
            .map(|sample| {
                let pairs: Vec<ComparisonResult> = intra
                    .iter()
                    .filter(|r| r.left().sample_id == sample.sample_id)
                    .cloned()
                    .collect();
                PatientReport {
                    sample_id: sample.sample_id.clone(),
                    status: classify(sample, &pairs),
                    is_negative_control: sample.is_negative_control,
                    replicates: sample
                        .replicates
                        .iter()
                        .map(|r| self.replicate_report(r))
                        .collect(),
                    intra: pairs,
                }
            })
            .collect();

        patients.extend(rejected.iter().map(|err| PatientReport {
            sample_id: err.sample_id.clone(),
            status: rejected_status(err),
            is_negative_control: self.config.is_negative_control(&err.sample_id),
            replicates: Vec::new(),
            intra: Vec::new(),
        }));

        patients.sort_by(|a, b| natural_cmp(&a.sample_id, &b.sample_id));
        patients
    }

    fn replicate_report(&self, replicate: &Replicate) -> ReplicateReport {
        let genotypes = self
            .config
            .panel
            .loci
            .iter()
            .map(|locus| DisplayedGenotype {
                locus: locus.name.clone(),
                call: replicate
                    .genotype(&locus.name)
                    .map(|g| g.display())
                    .unwrap_or_default(),
            })
            .collect();

        ReplicateReport {
            replicate_id: replicate.replicate_id.clone(),
            sex: replicate.sex,
            signature: replicate.signature.clone(),
            called_loci: replicate.called_loci,
            genotypes,
        }
    }

    /// Identity matrix over every validated replicate
    fn heatmap(
        &self,
        samples: &[Sample],
        intra: &[ComparisonResult],
        inter: &[ComparisonResult],
    ) -> Heatmap {
        let mut replicates: Vec<&Replicate> = samples.iter().flat_map(|s| s.replicates.iter()).collect();
        replicates.sort_by(|a, b| {
            natural_cmp(&a.replicate_id, &b.replicate_id)
                .then_with(|| natural_cmp(&a.sample_id, &b.sample_id))
        });

        let mut verdicts: HashMap<(&str, &str), Verdict> = HashMap::new();
        for result in intra.iter().chain(inter.iter()) {
            let (l, r) = (result.left().replicate_id.as_str(), result.right().replicate_id.as_str());
            verdicts.insert((l, r), result.verdict());
            verdicts.insert((r, l), result.verdict());
        }

        let comparator = Comparator::new(self.config);
        let n = replicates.len();
        let mut identity = vec![vec![100.0; n]; n];
        let mut verdict_matrix = vec![vec![None; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let value = comparator.identity(replicates[i], replicates[j]);
                identity[i][j] = value;
                identity[j][i] = value;

                let key = (replicates[i].replicate_id.as_str(), replicates[j].replicate_id.as_str());
                let verdict = verdicts.get(&key).copied();
                verdict_matrix[i][j] = verdict;
                verdict_matrix[j][i] = verdict;
            }
        }

        Heatmap {
            labels: replicates.iter().map(|r| r.replicate_id.clone()).collect(),
            identity,
            verdicts: verdict_matrix,
        }
    }

    fn notices(&self, patients: &[PatientReport], summary: &ReportSummary) -> Vec<Notice> {
        let mut notices = Vec::new();

        if summary.rejected_samples > 0 {
            notices.push(Notice::new(
                Severity::Error,
                format!("{} sample(s) rejected by marker validation", summary.rejected_samples),
            ));
        }

        if summary.intra_errors > 0 {
            notices.push(Notice::new(
                Severity::Error,
                format!("{} inconsistent sample(s)", summary.intra_errors),
            ));
        } else {
            notices.push(Notice::new(Severity::Success, "all samples are consistent"));
        }

        let warnings = patients
            .iter()
            .filter(|p| p.status.severity == Severity::Warning)
            .count();
        if warnings > 0 {
            notices.push(Notice::new(
                Severity::Warning,
                format!("{} sample(s) to check", warnings),
            ));
        }

        if summary.inter_errors > 0 {
            notices.push(Notice::new(
                Severity::Error,
                format!(
                    "{} replicate pair(s) from different patients share the same profile",
                    summary.inter_errors
                ),
            ));
        } else if self.config.inter_patient {
            notices.push(Notice::new(Severity::Success, "no identical profile between patients"));
        }

        if summary.negative_controls == 0 {
            notices.push(Notice::new(Severity::Warning, "no negative control"));
        } else if summary.negative_controls_clean {
            notices.push(Notice::new(Severity::Success, "negative controls are clean"));
        } else {
            notices.push(Notice::new(Severity::Error, "negative control with alleles"));
        }

        notices
    }
}

fn classify(sample: &Sample, intra: &[ComparisonResult]) -> SampleStatus {
    if sample.is_negative_control {
        return if sample.has_calls() {
            SampleStatus::new(Severity::Error, "negative control with alleles")
        } else {
            SampleStatus::new(Severity::Info, "negative control")
        };
    }

    if sample.replicates.len() < 2 {
        return SampleStatus::new(Severity::Warning, "single sample");
    }

    let mismatches: Vec<&ComparisonResult> = intra
        .iter()
        .filter(|r| r.verdict() == Verdict::Mismatch)
        .collect();
    if !mismatches.is_empty() {
        let sex_only = mismatches
            .iter()
            .flat_map(|r| r.discordant_loci())
            .all(|l| matches!(l.reason, LocusReason::SexMismatch { .. }));
        let description = if sex_only {
            "sex inconsistency"
        } else {
            "SNP inconsistency"
        };
        return SampleStatus::new(Severity::Error, description);
    }

    if intra.iter().any(|r| r.verdict() == Verdict::Inconclusive) {
        return SampleStatus::new(Severity::Warning, "inconclusive replicate comparison");
    }

    SampleStatus::new(Severity::Success, "consistent replicates")
}

fn rejected_status(err: &ValidationError) -> SampleStatus {
    let violations = err
        .violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    SampleStatus::new(Severity::Error, format!("invalid markers: {}", violations))
}

/// Groups of replicates from two or more patients sharing a signature
fn identical_profiles(samples: &[Sample]) -> Vec<IdenticalProfileGroup> {
    let mut by_signature: BTreeMap<&str, Vec<&Replicate>> = BTreeMap::new();
    for sample in samples.iter().filter(|s| !s.is_negative_control) {
        for replicate in &sample.replicates {
            if let Some(signature) = &replicate.signature {
                by_signature.entry(signature.as_str()).or_default().push(replicate);
            }
        }
    }

    let mut groups: Vec<IdenticalProfileGroup> = by_signature
        .into_iter()
        .filter_map(|(signature, mut replicates)| {
            replicates.sort_by(|a, b| {
                natural_cmp(&a.sample_id, &b.sample_id)
                    .then_with(|| natural_cmp(&a.replicate_id, &b.replicate_id))
            });
            let mut sample_ids: Vec<String> = replicates.iter().map(|r| r.sample_id.clone()).collect();
            sample_ids.dedup();
            if sample_ids.len() < 2 {
                return None;
            }
            Some(IdenticalProfileGroup {
                signature: signature.to_string(),
                sample_ids,
                replicate_ids: replicates.iter().map(|r| r.replicate_id.clone()).collect(),
            })
        })
        .collect();

    groups.sort_by(|a, b| natural_cmp(&a.replicate_ids[0], &b.replicate_ids[0]));
    groups
}

fn summarize(
    samples: &[Sample],
    rejected: &[ValidationError],
    patients: &[PatientReport],
    by_verdict: &VerdictGroups,
    inter: &[ComparisonResult],
    identical: &[IdenticalProfileGroup],
) -> ReportSummary {
    let controls = patients.iter().filter(|p| p.is_negative_control).count();
    let validated_controls: Vec<&Sample> = samples.iter().filter(|s| s.is_negative_control).collect();
    // A rejected control is never clean
    let negative_controls_clean = controls > 0
        && validated_controls.len() == controls
        && validated_controls.iter().all(|s| !s.has_calls());

    ReportSummary {
        patients: patients.len(),
        replicates: samples.iter().map(|s| s.replicates.len()).sum(),
        rejected_samples: rejected.len(),
        negative_controls: controls,
        intra: by_verdict.intra.counts(),
        inter: by_verdict.inter.counts(),
        intra_errors: patients
            .iter()
            .filter(|p| p.status.severity == Severity::Error)
            .count(),
        inter_errors: inter_errors(samples, inter, identical),
        negative_controls_clean,
        severity: Severity::Success,
    }
}

/// Replicate pairs of different patients that match, or that share a
/// signature even when the sex locus tells them apart
fn inter_errors(
    samples: &[Sample],
    inter: &[ComparisonResult],
    identical: &[IdenticalProfileGroup],
) -> usize {
    let patient_of: BTreeMap<&str, &str> = samples
        .iter()
        .flat_map(|s| {
            s.replicates
                .iter()
                .map(move |r| (r.replicate_id.as_str(), s.sample_id.as_str()))
        })
        .collect();

    let mut pairs: BTreeSet<(&str, &str)> = inter
        .iter()
        .filter(|r| r.verdict() == Verdict::Match)
        .map(|r| ordered_pair(&r.left().replicate_id, &r.right().replicate_id))
        .collect();

    for group in identical {
        for (i, a) in group.replicate_ids.iter().enumerate() {
            for b in &group.replicate_ids[i + 1..] {
                if patient_of.get(a.as_str()) != patient_of.get(b.as_str()) {
                    pairs.insert(ordered_pair(a, b));
                }
            }
        }
    }

    pairs.len()
}

fn ordered_pair<'s>(a: &'s str, b: &'s str) -> (&'s str, &'s str) {
    if natural_cmp(a, b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

/// error if anything is an error, else warning if anything warns, else success
fn overall_severity(patients: &[PatientReport], notices: &[Notice]) -> Severity {
    let severities: Vec<Severity> = patients
        .iter()
        .map(|p| p.status.severity)
        .chain(notices.iter().map(|n| n.severity))
        .collect();

    if severities.contains(&Severity::Error) {
        Severity::Error
    } else if severities.contains(&Severity::Warning) {
        Severity::Warning
    } else {
        Severity::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{
        export, wide_row, EMPTY_PROFILE, FEMALE, MALE, NO_SEX, PROFILE_A, PROFILE_B,
    };
    use crate::parsers::GeneMapperParser;
    use crate::validator::MarkerValidator;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            run: RunMetadata::default(),
            input_sha256: None,
            engine_version: "test".to_string(),
        }
    }

    /// Parse, validate and compare every pair of an export
    fn run(rows: &[String]) -> AnalysisReport {
        let config = AnalysisConfig::default();
        let parsed = GeneMapperParser::new(&config).parse_str(&export(rows)).unwrap();
        let validator = MarkerValidator::new(&config);

        let mut samples = Vec::new();
        let mut rejected = Vec::new();
        for sample in &parsed.samples {
            match validator.validate(sample) {
                Ok(s) => samples.push(s),
                Err(e) => rejected.push(e),
            }
        }

        let comparator = Comparator::new(&config);
        let mut results = Vec::new();
        let replicates: Vec<(&Sample, &Replicate)> = samples
            .iter()
            .filter(|s| !s.is_negative_control)
            .flat_map(|s| s.replicates.iter().map(move |r| (s, r)))
            .collect();
        for (i, (sa, a)) in replicates.iter().enumerate() {
            for (sb, b) in &replicates[i + 1..] {
                let mode = if sa.sample_id == sb.sample_id {
                    ComparisonMode::Intra
                } else {
                    ComparisonMode::Inter
                };
                results.push(comparator.compare(a, b, mode));
            }
        }

        Aggregator::new(&config).aggregate(metadata(), samples, rejected, results)
    }

    fn status<'r>(report: &'r AnalysisReport, sample_id: &str) -> &'r SampleStatus {
        &report
            .patients
            .iter()
            .find(|p| p.sample_id == sample_id)
            .unwrap()
            .status
    }

    #[test]
    fn test_patients_in_natural_order() {
        let report = run(&[
            wide_row("P10", &PROFILE_A, FEMALE),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P1", &PROFILE_B, FEMALE),
        ]);
        let ids: Vec<&str> = report.patients.iter().map(|p| p.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2", "P10"]);
        assert_eq!(report.heatmap.labels, vec!["P1", "P2", "P10"]);
    }

    #[test]
    fn test_sample_statuses() {
        let mut inconsistent = PROFILE_B;
        inconsistent[3] = "G";
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P2bis", &inconsistent, MALE),
            wide_row("P3", &PROFILE_B, FEMALE),
            wide_row("P3bis", &PROFILE_B, MALE),
            wide_row("P4", &PROFILE_A, MALE),
            wide_row("NEG", &EMPTY_PROFILE, ("", "")),
        ]);

        assert_eq!(status(&report, "P1").severity, Severity::Success);
        assert_eq!(status(&report, "P2").description, "SNP inconsistency");
        assert_eq!(status(&report, "P3").description, "sex inconsistency");
        assert_eq!(status(&report, "P4").severity, Severity::Warning);
        assert_eq!(status(&report, "P4").description, "single sample");
        assert_eq!(status(&report, "NEG").severity, Severity::Info);

        assert_eq!(report.summary.intra_errors, 2);
        assert!(report.summary.negative_controls_clean);
        assert_eq!(report.summary.severity, Severity::Error);
        assert_eq!(report.by_verdict.intra.matches, vec!["P1 | P1bis"]);
        assert_eq!(report.by_verdict.intra.mismatch, vec!["P2 | P2bis", "P3 | P3bis"]);
    }

    #[test]
    fn test_dirty_negative_control() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
            wide_row("temoin", &PROFILE_B, ("", "")),
        ]);
        let control = status(&report, "temoin");
        assert_eq!(control.severity, Severity::Error);
        assert_eq!(control.description, "negative control with alleles");
        assert!(!report.summary.negative_controls_clean);
        assert!(report
            .notices
            .contains(&Notice::new(Severity::Error, "negative control with alleles")));
    }

    #[test]
    fn test_rejected_sample_reported() {
        let mut partial = PROFILE_A;
        partial[0] = "";
        let report = run(&[
            wide_row("P1", &partial, FEMALE),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P2bis", &PROFILE_B, MALE),
        ]);

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].sample_id, "P1");
        assert_eq!(report.summary.rejected_samples, 1);
        let p1 = status(&report, "P1");
        assert_eq!(p1.severity, Severity::Error);
        assert!(p1.description.contains("locus 'Locus 1' not called"));
        // P1 takes no part in comparisons or heatmap
        assert_eq!(report.heatmap.labels, vec!["P2", "P2bis"]);
        assert!(report.inter.is_empty());
    }

    #[test]
    fn test_identical_profiles_between_patients() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P7", &PROFILE_A, FEMALE),
            wide_row("P9", &PROFILE_B, MALE),
            wide_row("NEG", &EMPTY_PROFILE, ("", "")),
        ]);

        assert_eq!(report.identical_profiles.len(), 1);
        assert_eq!(report.identical_profiles[0].sample_ids, vec!["P1", "P7"]);
        assert_eq!(report.summary.inter_errors, 1);
        assert_eq!(report.by_verdict.inter.matches, vec!["P1 | P7"]);
        assert_eq!(report.summary.severity, Severity::Error);
    }

    #[test]
    fn test_same_snps_different_sex_is_flagged() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P2bis", &PROFILE_B, MALE),
            wide_row("P3", &PROFILE_B, FEMALE),
            wide_row("P3bis", &PROFILE_B, FEMALE),
            wide_row("NEG", &EMPTY_PROFILE, NO_SEX),
        ]);

        // The sex locus turns every P2/P3 pair into a mismatch
        assert_eq!(report.summary.inter.matches, 0);
        assert_eq!(report.identical_profiles.len(), 1);
        assert_eq!(report.identical_profiles[0].sample_ids, vec!["P2", "P3"]);

        assert_eq!(report.summary.inter_errors, 4);
        assert_eq!(report.summary.severity, Severity::Error);
        assert!(report.notices.contains(&Notice::new(
            Severity::Error,
            "4 replicate pair(s) from different patients share the same profile"
        )));
        assert!(!report
            .notices
            .iter()
            .any(|n| n.message == "no identical profile between patients"));
    }

    #[test]
    fn test_low_coverage_replicate_is_inconclusive() {
        let mut partial = PROFILE_A;
        for call in partial.iter_mut().take(6) {
            *call = "";
        }
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &partial, NO_SEX),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P2bis", &PROFILE_B, MALE),
            wide_row("NEG", &EMPTY_PROFILE, NO_SEX),
        ]);

        // Nine concordant loci stay below the default minimum of ten
        let p1 = report.patients.iter().find(|p| p.sample_id == "P1").unwrap();
        assert_eq!(p1.intra[0].verdict(), Verdict::Inconclusive);
        assert_eq!(p1.intra[0].evaluated_loci(), 9);
        assert_eq!(p1.intra[0].discordant_loci().count(), 0);
        assert_eq!(p1.replicates[1].sex, Some(SexCall::Undetermined));

        let status = status(&report, "P1");
        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.description, "inconclusive replicate comparison");
        assert_eq!(report.by_verdict.intra.inconclusive, vec!["P1 | P1bis"]);
        assert_eq!(report.by_verdict.intra.matches, vec!["P2 | P2bis"]);
        assert_eq!(report.summary.severity, Severity::Warning);
    }

    #[test]
    fn test_heatmap_matrix() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
            wide_row("NEG", &EMPTY_PROFILE, ("", "")),
        ]);
        let heatmap = &report.heatmap;
        assert_eq!(heatmap.labels, vec!["NEG", "P1", "P1bis"]);
        for i in 0..3 {
            assert_eq!(heatmap.identity[i][i], 100.0);
            assert_eq!(heatmap.verdicts[i][i], None);
        }
        assert_eq!(heatmap.identity[1][2], 100.0);
        assert_eq!(heatmap.verdicts[1][2], Some(Verdict::Match));
        assert_eq!(heatmap.identity[0][1], heatmap.identity[1][0]);
        // The negative control is never compared
        assert_eq!(heatmap.verdicts[0][1], None);
    }

    #[test]
    fn test_clean_run_notices() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
            wide_row("P2", &PROFILE_B, MALE),
            wide_row("P2ter", &PROFILE_B, MALE),
            wide_row("NEG", &EMPTY_PROFILE, ("", "")),
        ]);
        assert_eq!(report.summary.severity, Severity::Success);
        assert!(report.notices.iter().all(|n| n.severity == Severity::Success));
        assert_eq!(report.summary.inter.mismatches, 4);
    }

    #[test]
    fn test_missing_negative_control_warns() {
        let report = run(&[
            wide_row("P1", &PROFILE_A, FEMALE),
            wide_row("P1bis", &PROFILE_A, FEMALE),
        ]);
        assert!(!report.summary.negative_controls_clean);
        assert_eq!(report.summary.severity, Severity::Warning);
        assert!(report
            .notices
            .contains(&Notice::new(Severity::Warning, "no negative control")));
    }

    #[test]
    fn test_iso_week_from_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let metadata = RunMetadata::default().with_date(date);
        assert_eq!(metadata.week, Some(11));
    }
}
