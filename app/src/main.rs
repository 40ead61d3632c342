// ==============================================================================
// main.rs - SNPXCheck Entry Point
// ==============================================================================
// Description: Command-line front end for GeneMapper identity checks
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snpxcheck::aggregator::RunMetadata;
use snpxcheck::audit::{self, AuditEventType};
use snpxcheck::config::{AnalysisConfig, ExportLayout};
use snpxcheck::models::Severity;
use snpxcheck::output::{OutputFormat, OutputGenerator};
use snpxcheck::processor::IdentityProcessor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GeneMapper export (.txt, .tsv, optionally .gz)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory receiving the report files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Analysis configuration (JSON); defaults to the SNPXPlex panel
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum number of called loci for a MATCH
    #[arg(long, env = "SNPXCHECK_MIN_SHARED_LOCI")]
    min_shared_loci: Option<usize>,

    /// Export layout
    #[arg(long, value_enum)]
    layout: Option<ExportLayout>,

    /// Worker threads for pairwise comparisons
    #[arg(long, env = "SNPXCHECK_THREADS")]
    threads: Option<usize>,

    /// Skip comparisons between different patients
    #[arg(long)]
    no_inter: bool,

    /// Output formats (repeatable)
    #[arg(long = "format", value_enum, default_values_t = [OutputFormat::Json, OutputFormat::Tsv])]
    formats: Vec<OutputFormat>,

    /// Run date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Person interpreting the run
    #[arg(long)]
    interpreter: Option<String>,

    /// Run series label
    #[arg(long)]
    serie: Option<String>,

    /// Free-text comment added to the report
    #[arg(long)]
    comment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snpxcheck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args = Args::parse();

    info!("SNPXCheck {} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let processor = IdentityProcessor::new(config).context("Invalid analysis configuration")?;

    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read input file {:?}", args.input))?;

    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().to_string());
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let metadata = RunMetadata {
        file_name: file_name.clone(),
        interpreter: args.interpreter.clone(),
        serie: args.serie.clone(),
        comment: args.comment.clone(),
        ..RunMetadata::default()
    }
    .with_date(date);

    // The engine is CPU-bound; keep it off the async workers
    let run_id = processor.run_id();
    let report = tokio::task::spawn_blocking(move || processor.process_buffer(&data, metadata))
        .await
        .context("Analysis task failed")?
        .context("Analysis failed")?;

    for notice in &report.notices {
        match notice.severity {
            Severity::Error => error!("{}", notice.message),
            Severity::Warning => warn!("{}", notice.message),
            _ => info!("{}", notice.message),
        }
    }

    let generator = OutputGenerator::new(output_stem(&args.input), args.output_dir.clone());
    let written = generator.generate(&args.formats, &report).await?;

    for path in &written {
        info!("Wrote {:?}", path);
    }
    audit::log_event(
        AuditEventType::ReportWritten,
        run_id,
        file_name,
        serde_json::json!({
            "files": written,
            "severity": report.summary.severity,
        }),
    );

    info!(
        "Run complete: {} patient(s), overall status {}",
        report.summary.patients,
        report.summary.severity.as_str()
    );
    Ok(())
}

/// Configuration from file (if any), then command-line overrides
async fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            AnalysisConfig::from_json_str(&json)
                .with_context(|| format!("Failed to load config file {:?}", path))?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(min) = args.min_shared_loci {
        config.minimum_shared_loci = min;
    }
    if let Some(layout) = args.layout {
        config.layout = layout;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.no_inter {
        config.inter_patient = false;
    }

    Ok(config)
}

/// File name without directory and without .txt/.tsv/.gz extensions
fn output_stem(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snpxcheck".to_string());

    let mut stem = name.as_str();
    for ext in [".gz", ".GZ", ".txt", ".tsv", ".TXT", ".TSV"] {
        stem = stem.strip_suffix(ext).unwrap_or(stem);
    }

    if stem.is_empty() {
        "snpxcheck".to_string()
    } else {
        stem.to_string()
    }
}
