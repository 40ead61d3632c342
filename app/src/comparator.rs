// ==============================================================================
// comparator.rs - Replicate Comparison Engine
// ==============================================================================
// Description: Locus-by-locus concordance between two replicate profiles
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Verdict policy:
//   MISMATCH      any evaluated locus (marker or sex) is discordant
//   INCONCLUSIVE  no marker locus evaluated, or fewer than minimum_shared_loci
//   MATCH         otherwise
// A no-call on either side makes the locus inconclusive and it is not
// evaluated. A locus missing from one profile yields no verdict.
// ==============================================================================

use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

use crate::config::AnalysisConfig;
use crate::genotype::{Genotype, SexCall};
use crate::models::{natural_cmp, Replicate};

/// Which population a pair is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonMode {
    /// Two replicates of the same patient
    Intra,
    /// Replicates of two different patients
    Inter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Match,
    Mismatch,
    Inconclusive,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Match => "MATCH",
            Verdict::Mismatch => "MISMATCH",
            Verdict::Inconclusive => "INCONCLUSIVE",
        }
    }
}

/// Why a comparison got its verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictReason {
    AllConcordant,
    DiscordantLoci { count: usize },
    NoEvaluatedLoci,
    BelowMinimumSharedLoci { evaluated: usize, required: usize },
}

/// Side(s) of a pair without a usable call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoCallSide {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocusReason {
    Identical,
    AlleleMismatch { left: String, right: String },
    SexMismatch { left: SexCall, right: SexCall },
    NoCall { side: NoCallSide },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocusVerdict {
    pub locus_name: String,
    pub concordant: bool,
    pub reason: LocusReason,
}

impl LocusVerdict {
    /// Whether the locus was actually compared (both sides called)
    pub fn is_evaluated(&self) -> bool {
        !matches!(self.reason, LocusReason::NoCall { .. })
    }

    pub fn is_discordant(&self) -> bool {
        self.is_evaluated() && !self.concordant
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairMember {
    pub sample_id: String,
    pub replicate_id: String,
}

impl PairMember {
    fn of(replicate: &Replicate) -> Self {
        Self {
            sample_id: replicate.sample_id.clone(),
            replicate_id: replicate.replicate_id.clone(),
        }
    }
}

/// Outcome of comparing two replicate profiles
///
/// Only the comparator builds these; the left member always sorts first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    mode: ComparisonMode,
    left: PairMember,
    right: PairMember,
    verdict: Verdict,
    reason: VerdictReason,
    loci: Vec<LocusVerdict>,
    evaluated_loci: usize,
    concordant_loci: usize,
    identity_percent: f64,
}

impl ComparisonResult {
    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    pub fn left(&self) -> &PairMember {
        &self.left
    }

    pub fn right(&self) -> &PairMember {
        &self.right
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn reason(&self) -> &VerdictReason {
        &self.reason
    }

    /// Locus verdicts in panel order, sex locus last
    pub fn loci(&self) -> &[LocusVerdict] {
        &self.loci
    }

    /// Marker loci called on both sides
    pub fn evaluated_loci(&self) -> usize {
        self.evaluated_loci
    }

    pub fn concordant_loci(&self) -> usize {
        self.concordant_loci
    }

    pub fn identity_percent(&self) -> f64 {
        self.identity_percent
    }

    /// Discordant loci, in panel order
    pub fn discordant_loci(&self) -> impl Iterator<Item = &LocusVerdict> {
        self.loci.iter().filter(|l| l.is_discordant())
    }

    /// "left | right" key used to group pairs
    pub fn pair_key(&self) -> String {
        format!("{} | {}", self.left.replicate_id, self.right.replicate_id)
    }

    /// Ordering of results: by left member, then right member (natural order)
    pub fn cmp_pair(&self, other: &Self) -> Ordering {
        member_cmp(&self.left, &other.left).then_with(|| member_cmp(&self.right, &other.right))
    }
}

fn member_cmp(a: &PairMember, b: &PairMember) -> Ordering {
    natural_cmp(&a.sample_id, &b.sample_id)
        .then_with(|| natural_cmp(&a.replicate_id, &b.replicate_id))
}

/// A pair of replicates waiting to be compared
#[derive(Debug, Clone, Copy)]
pub struct PairRequest<'r> {
    pub left: &'r Replicate,
    pub right: &'r Replicate,
    pub mode: ComparisonMode,
}

pub struct Comparator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Comparator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Compare two replicate profiles locus by locus
    pub fn compare(&self, left: &Replicate, right: &Replicate, mode: ComparisonMode) -> ComparisonResult {
        let (left, right) = canonical(left, right);
        let panel = &self.config.panel;

        let mut loci = Vec::new();
        let mut evaluated_loci = 0;
        let mut concordant_loci = 0;

        for locus in &panel.loci {
            let (l, r) = match (left.genotype(&locus.name), right.genotype(&locus.name)) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };

            let verdict = match (l, r) {
                (Genotype::Called { .. }, Genotype::Called { .. }) => {
                    evaluated_loci += 1;
                    if l == r {
                        concordant_loci += 1;
                        locus_verdict(&locus.name, true, LocusReason::Identical)
                    } else {
                        locus_verdict(
                            &locus.name,
                            false,
                            LocusReason::AlleleMismatch {
                                left: l.display(),
                                right: r.display(),
                            },
                        )
                    }
                }
                _ => no_call(&locus.name, l.is_called(), r.is_called()),
            };
            loci.push(verdict);
        }

        if let (Some(sex_locus), Some(l), Some(r)) = (&panel.sex_locus, left.sex, right.sex) {
            let verdict = if l.is_determined() && r.is_determined() {
                if l == r {
                    locus_verdict(&sex_locus.name, true, LocusReason::Identical)
                } else {
                    locus_verdict(&sex_locus.name, false, LocusReason::SexMismatch { left: l, right: r })
                }
            } else {
                no_call(&sex_locus.name, l.is_determined(), r.is_determined())
            };
            loci.push(verdict);
        }

        let discordant = loci.iter().filter(|l| l.is_discordant()).count();
        let required = self.config.minimum_shared_loci;
        let (verdict, reason) = if discordant > 0 {
            (Verdict::Mismatch, VerdictReason::DiscordantLoci { count: discordant })
        } else if evaluated_loci == 0 {
            (Verdict::Inconclusive, VerdictReason::NoEvaluatedLoci)
        } else if evaluated_loci < required {
            (
                Verdict::Inconclusive,
                VerdictReason::BelowMinimumSharedLoci {
                    evaluated: evaluated_loci,
                    required,
                },
            )
        } else {
            (Verdict::Match, VerdictReason::AllConcordant)
        };

        ComparisonResult {
            mode,
            left: PairMember::of(left),
            right: PairMember::of(right),
            verdict,
            reason,
            loci,
            evaluated_loci,
            concordant_loci,
            identity_percent: self.identity(left, right),
        }
    }

    /// Compare many pairs in parallel on the current rayon pool
    ///
    /// Results keep the order of `pairs`.
    pub fn compare_pairs(&self, pairs: &[PairRequest<'_>]) -> Vec<ComparisonResult> {
        pairs
            .par_iter()
            .map(|p| self.compare(p.left, p.right, p.mode))
            .collect()
    }

    /// Allele identity between two profiles, in percent
    ///
    /// Shared alleles summed over the panel loci (missing loci count as no
    /// calls), plus one for an equal sex call, over `2 × loci + 1`.
    pub fn identity(&self, left: &Replicate, right: &Replicate) -> f64 {
        let panel = &self.config.panel;
        let no_call = Genotype::NoCall;

        let mut shared: usize = panel
            .loci
            .iter()
            .map(|locus| {
                let l = left.genotype(&locus.name).unwrap_or(&no_call);
                let r = right.genotype(&locus.name).unwrap_or(&no_call);
                l.shared_alleles(r) as usize
            })
            .sum();
        let mut total = 2 * panel.loci.len();

        if panel.sex_locus.is_some() {
            total += 1;
            let undetermined = Some(SexCall::Undetermined);
            let l = left.sex.or(undetermined);
            let r = right.sex.or(undetermined);
            if l == r {
                shared += 1;
            }
        }

        if total == 0 {
            return 0.0;
        }
        let percent = 100.0 * shared as f64 / total as f64;
        (percent * 100.0).round() / 100.0
    }
}

fn canonical<'r>(a: &'r Replicate, b: &'r Replicate) -> (&'r Replicate, &'r Replicate) {
    let order = natural_cmp(&a.sample_id, &b.sample_id)
        .then_with(|| natural_cmp(&a.replicate_id, &b.replicate_id));
    if order == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

fn locus_verdict(name: &str, concordant: bool, reason: LocusReason) -> LocusVerdict {
    LocusVerdict {
        locus_name: name.to_string(),
        concordant,
        reason,
    }
}

fn no_call(name: &str, left_called: bool, right_called: bool) -> LocusVerdict {
    let side = match (left_called, right_called) {
        (true, false) => NoCallSide::Right,
        (false, true) => NoCallSide::Left,
        _ => NoCallSide::Both,
    };
    locus_verdict(name, false, LocusReason::NoCall { side })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{LocusDefinition, PanelDefinition};
    use std::collections::BTreeMap;

    fn genotype(call: &str) -> Genotype {
        let mut parts = call.split('/').filter(|p| !p.is_empty());
        let a = parts.next();
        let b = parts.next();
        Genotype::from_calls(a, b, true)
    }

    fn replicate(sample_id: &str, replicate_id: &str, calls: &[(&str, &str)], sex: Option<SexCall>) -> Replicate {
        let genotypes: BTreeMap<String, Genotype> = calls
            .iter()
            .map(|(locus, call)| (locus.to_string(), genotype(call)))
            .collect();
        let called_loci = genotypes.values().filter(|g| g.is_called()).count();
        Replicate {
            sample_id: sample_id.to_string(),
            replicate_id: replicate_id.to_string(),
            genotypes,
            sex,
            signature: None,
            called_loci,
            sex_called: sex.is_some(),
        }
    }

    /// Two-locus panel without sex marker
    fn xy_config(minimum_shared_loci: usize) -> AnalysisConfig {
        let locus = |name: &str, a: &str, b: &str| LocusDefinition {
            name: name.to_string(),
            allele_columns: [a.to_string(), b.to_string()],
            alphabet: vec!["A".into(), "C".into(), "G".into(), "T".into()],
        };
        AnalysisConfig {
            panel: PanelDefinition {
                loci: vec![locus("locusX", "A1", "A2"), locus("locusY", "A3", "A4")],
                sex_locus: None,
                ..PanelDefinition::snpxplex()
            },
            minimum_shared_loci,
            ..AnalysisConfig::default()
        }
    }

    fn full_profile(calls: &[&str; 15]) -> Vec<(String, String)> {
        calls
            .iter()
            .enumerate()
            .map(|(i, c)| (format!("Locus {}", i + 1), c.to_string()))
            .collect()
    }

    fn snpxplex_replicate(id: &str, calls: &[&str; 15], sex: SexCall) -> Replicate {
        let owned = full_profile(calls);
        let borrowed: Vec<(&str, &str)> = owned.iter().map(|(l, c)| (l.as_str(), c.as_str())).collect();
        replicate(id, id, &borrowed, Some(sex))
    }

    #[test]
    fn test_identical_profiles_match() {
        let config = AnalysisConfig::default();
        let comparator = Comparator::new(&config);
        let a = snpxplex_replicate("P1", &crate::fixtures::PROFILE_A, SexCall::Female);
        let b = snpxplex_replicate("P1bis", &crate::fixtures::PROFILE_A, SexCall::Female);

        let result = comparator.compare(&a, &b, ComparisonMode::Intra);
        assert_eq!(result.verdict(), Verdict::Match);
        assert_eq!(result.reason(), &VerdictReason::AllConcordant);
        assert_eq!(result.evaluated_loci(), 15);
        assert_eq!(result.concordant_loci(), 15);
        assert_eq!(result.loci().len(), 16);
        assert_eq!(result.identity_percent(), 100.0);
    }

    #[test]
    fn test_scenario_locus_y_differs() {
        let config = xy_config(2);
        let comparator = Comparator::new(&config);
        let a = replicate("A", "A", &[("locusX", "C/T"), ("locusY", "G")], None);
        let b = replicate("B", "B", &[("locusX", "T/C"), ("locusY", "A")], None);

        let result = comparator.compare(&a, &b, ComparisonMode::Inter);
        assert_eq!(result.verdict(), Verdict::Mismatch);
        assert_eq!(result.loci()[0].locus_name, "locusX");
        assert!(result.loci()[0].concordant);
        assert_eq!(result.loci()[1].locus_name, "locusY");
        assert!(!result.loci()[1].concordant);
        assert_eq!(
            result.loci()[1].reason,
            LocusReason::AlleleMismatch {
                left: "G".to_string(),
                right: "A".to_string()
            }
        );
    }

    #[test]
    fn test_scenario_single_shared_locus_is_inconclusive() {
        let config = xy_config(2);
        let comparator = Comparator::new(&config);
        let a = replicate("A", "A", &[("locusX", "C/T")], None);
        let b = replicate("B", "B", &[("locusX", "C/T"), ("locusY", "A")], None);

        let result = comparator.compare(&a, &b, ComparisonMode::Inter);
        assert_eq!(result.verdict(), Verdict::Inconclusive);
        assert_eq!(
            result.reason(),
            &VerdictReason::BelowMinimumSharedLoci {
                evaluated: 1,
                required: 2
            }
        );
        // locusY absent from A: no verdict at all
        assert_eq!(result.loci().len(), 1);
    }

    #[test]
    fn test_no_shared_loci_is_inconclusive() {
        let config = xy_config(0);
        let comparator = Comparator::new(&config);
        let a = replicate("A", "A", &[("locusX", "C/T"), ("locusY", "")], None);
        let b = replicate("B", "B", &[("locusX", ""), ("locusY", "")], None);

        let result = comparator.compare(&a, &b, ComparisonMode::Inter);
        assert_eq!(result.verdict(), Verdict::Inconclusive);
        assert_eq!(result.reason(), &VerdictReason::NoEvaluatedLoci);
        assert_eq!(result.evaluated_loci(), 0);
        assert_eq!(
            result.loci()[0].reason,
            LocusReason::NoCall {
                side: NoCallSide::Right
            }
        );
        assert_eq!(
            result.loci()[1].reason,
            LocusReason::NoCall {
                side: NoCallSide::Both
            }
        );
        assert!(!result.loci()[0].concordant);
    }

    #[test]
    fn test_sex_mismatch_alone_is_mismatch() {
        let config = AnalysisConfig::default();
        let comparator = Comparator::new(&config);
        let a = snpxplex_replicate("P1", &crate::fixtures::PROFILE_A, SexCall::Female);
        let b = snpxplex_replicate("P1bis", &crate::fixtures::PROFILE_A, SexCall::Male);

        let result = comparator.compare(&a, &b, ComparisonMode::Intra);
        assert_eq!(result.verdict(), Verdict::Mismatch);
        assert_eq!(result.evaluated_loci(), 15);
        let discordant: Vec<_> = result.discordant_loci().collect();
        assert_eq!(discordant.len(), 1);
        assert_eq!(discordant[0].locus_name, "Sex");
        assert!(matches!(discordant[0].reason, LocusReason::SexMismatch { .. }));
    }

    #[test]
    fn test_undetermined_sex_is_not_a_mismatch() {
        let config = AnalysisConfig::default();
        let comparator = Comparator::new(&config);
        let a = snpxplex_replicate("P1", &crate::fixtures::PROFILE_A, SexCall::Undetermined);
        let b = snpxplex_replicate("P1bis", &crate::fixtures::PROFILE_A, SexCall::Male);

        let result = comparator.compare(&a, &b, ComparisonMode::Intra);
        assert_eq!(result.verdict(), Verdict::Match);
        assert_eq!(
            result.loci()[15].reason,
            LocusReason::NoCall {
                side: NoCallSide::Left
            }
        );
    }

    #[test]
    fn test_pairs_are_canonical_and_deterministic() {
        let config = AnalysisConfig::default();
        let comparator = Comparator::new(&config);
        let p10 = snpxplex_replicate("P10", &crate::fixtures::PROFILE_A, SexCall::Female);
        let p2 = snpxplex_replicate("P2", &crate::fixtures::PROFILE_B, SexCall::Male);

        let forward = comparator.compare(&p10, &p2, ComparisonMode::Inter);
        let backward = comparator.compare(&p2, &p10, ComparisonMode::Inter);
        assert_eq!(forward.left().sample_id, "P2");
        assert_eq!(forward.pair_key(), "P2 | P10");
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&backward).unwrap()
        );
    }

    #[test]
    fn test_identity_percent() {
        let config = xy_config(1);
        let comparator = Comparator::new(&config);
        let a = replicate("A", "A", &[("locusX", "C/T"), ("locusY", "G")], None);
        let b = replicate("B", "B", &[("locusX", "C"), ("locusY", "")], None);

        // locusX shares C (1), locusY one no-call (0) over 4 alleles
        assert_eq!(comparator.identity(&a, &b), 25.0);
        assert_eq!(comparator.identity(&a, &a), 100.0);
        assert_eq!(comparator.identity(&b, &b), 100.0);
    }

    #[test]
    fn test_parallel_compare_keeps_order() {
        let config = AnalysisConfig::default();
        let comparator = Comparator::new(&config);
        let a = snpxplex_replicate("P1", &crate::fixtures::PROFILE_A, SexCall::Female);
        let b = snpxplex_replicate("P2", &crate::fixtures::PROFILE_B, SexCall::Male);
        let c = snpxplex_replicate("P3", &crate::fixtures::PROFILE_A, SexCall::Female);

        let pairs = vec![
            PairRequest { left: &a, right: &b, mode: ComparisonMode::Inter },
            PairRequest { left: &a, right: &c, mode: ComparisonMode::Inter },
            PairRequest { left: &b, right: &c, mode: ComparisonMode::Inter },
        ];
        let results = comparator.compare_pairs(&pairs);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].verdict(), Verdict::Mismatch);
        assert_eq!(results[1].verdict(), Verdict::Match);
        assert_eq!(results[2].pair_key(), "P2 | P3");
    }
}
