// ==============================================================================
// output.rs - Report Output Generation
// ==============================================================================
// Description: Writes the analysis report as JSON and TSV tables
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Files written into the output directory:
//   <stem>.report.json   full AnalysisReport (json)
//   <stem>.intra.tsv     intra-patient pairs (tsv)
//   <stem>.inter.tsv     inter-patient pairs that are not a clean MISMATCH (tsv)
//   <stem>.heatmap.tsv   identity matrix (tsv)
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregator::{AnalysisReport, Heatmap};
use crate::comparator::{ComparisonResult, Verdict};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full report for the PDF and heatmap renderers
    Json,
    /// Pair and matrix tables for spreadsheets
    Tsv,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Tsv => "tsv",
        }
    }
}

pub struct OutputGenerator {
    stem: String,
    output_dir: PathBuf,
}

impl OutputGenerator {
    pub fn new(stem: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            stem: stem.into(),
            output_dir,
        }
    }

    /// Write the report in every requested format
    ///
    /// # Returns
    /// * Paths of the written files, in format order
    pub async fn generate(&self, formats: &[OutputFormat], report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let mut written = Vec::new();
        let mut done = Vec::new();

        for format in formats {
            if done.contains(format) {
                continue;
            }
            done.push(*format);

            match format {
                OutputFormat::Json => written.push(self.generate_json(report).await?),
                OutputFormat::Tsv => written.extend(self.generate_tsv(report).await?),
            }
        }

        Ok(written)
    }

    fn path(&self, kind: &str, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}.{}", self.stem, kind, format.extension()))
    }

    async fn generate_json(&self, report: &AnalysisReport) -> Result<PathBuf> {
        let path = self.path("report", OutputFormat::Json);
        info!("Generating JSON output: {:?}", path);

        let bytes = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
        write_file(&path, &bytes).await?;

        info!(
            "JSON output complete: {} patient(s), {} inter pair(s)",
            report.summary.patients,
            report.inter.len()
        );
        Ok(path)
    }

    async fn generate_tsv(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        let intra: Vec<&ComparisonResult> = report.patients.iter().flat_map(|p| p.intra.iter()).collect();
        let inter: Vec<&ComparisonResult> = report
            .inter
            .iter()
            .filter(|r| r.verdict() != Verdict::Mismatch)
            .collect();

        let intra_path = self.path("intra", OutputFormat::Tsv);
        write_file(&intra_path, &pairs_table(&intra)?).await?;

        let inter_path = self.path("inter", OutputFormat::Tsv);
        write_file(&inter_path, &pairs_table(&inter)?).await?;

        let heatmap_path = self.path("heatmap", OutputFormat::Tsv);
        write_file(&heatmap_path, &heatmap_table(&report.heatmap)?).await?;

        info!(
            "TSV output complete: {} intra pair(s), {} inter alert(s)",
            intra.len(),
            inter.len()
        );
        Ok(vec![intra_path, inter_path, heatmap_path])
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

fn tsv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush TSV output: {}", e.error()))
}

fn pairs_table(results: &[&ComparisonResult]) -> Result<Vec<u8>> {
    let mut writer = tsv_writer();
    writer.write_record([
        "left_sample",
        "left_replicate",
        "right_sample",
        "right_replicate",
        "verdict",
        "evaluated_loci",
        "concordant_loci",
        "identity_percent",
        "discordant_loci",
    ])?;

    for result in results {
        let discordant = result
            .discordant_loci()
            .map(|l| l.locus_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        writer.write_record(&[
            result.left().sample_id.clone(),
            result.left().replicate_id.clone(),
            result.right().sample_id.clone(),
            result.right().replicate_id.clone(),
            result.verdict().as_str().to_string(),
            result.evaluated_loci().to_string(),
            result.concordant_loci().to_string(),
            format!("{:.2}", result.identity_percent()),
            discordant,
        ])?;
    }

    finish(writer)
}

fn heatmap_table(heatmap: &Heatmap) -> Result<Vec<u8>> {
    let mut writer = tsv_writer();

    let mut header = vec![String::new()];
    header.extend(heatmap.labels.iter().cloned());
    writer.write_record(&header)?;

    for (label, row) in heatmap.labels.iter().zip(&heatmap.identity) {
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|v| format!("{:.2}", v)));
        writer.write_record(&record)?;
    }

    finish(writer)
}
