// ==============================================================================
// genemapper.rs - GeneMapper Export Parser
// ==============================================================================
// Description: Parser for tab-delimited GeneMapper genotype exports
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text, header row first
// Wide layout (SNPXPlex, one row per sample):
//   Sample File  Sample Name  Panel  Marker  Dye  Allele 1 ... Allele 34
//   P12.fsa      P12          SNPX   SNPX    B    01_C     ... 15_G
// Long layout (one row per sample and marker):
//   Sample Name  Marker   Allele 1  Allele 2
//   P12          Locus 1  C         T
// ==============================================================================

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::config::{AnalysisConfig, ExportLayout};
use crate::genotype::normalize_allele;
use crate::models::{MarkerRecord, ReplicateRecords, SampleRecords};

/// Errors that can occur during GeneMapper export parsing
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Export is empty or has no data rows")]
    Empty,

    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Invalid row at line {line}: {details}")]
    Row { line: usize, details: String },

    #[error("Missing sample name at line {line}")]
    MissingSampleName { line: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Parsed export: records grouped by patient, then replicate
#[derive(Debug, Clone, PartialEq)]
pub struct GeneMapperExport {
    /// Layout actually read (never `Auto`)
    pub layout: ExportLayout,
    /// Patients in order of first appearance
    pub samples: Vec<SampleRecords>,
    pub record_count: usize,
}

impl GeneMapperExport {
    pub fn replicate_count(&self) -> usize {
        self.samples.iter().map(|s| s.replicates.len()).sum()
    }
}

/// Column positions resolved from the header row
enum Columns {
    Wide {
        sample_name: usize,
        /// (locus name, first allele column, second allele column)
        loci: Vec<(String, usize, usize)>,
    },
    Long {
        sample_name: usize,
        marker: usize,
        alleles: [usize; 2],
    },
}

/// Parser for GeneMapper exports, driven by the configured panel
#[derive(Debug, Clone)]
pub struct GeneMapperParser<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> GeneMapperParser<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Parse an in-memory export
    ///
    /// Rows keep their export order inside a replicate. Cells are trimmed,
    /// allele tokens normalized (`01_C` → `C`, `nan` → no call) and sample
    /// names split into patient and replicate identifiers.
    pub fn parse_str(&self, text: &str) -> Result<GeneMapperExport, ParseError> {
        let text = text.trim_start_matches('\u{feff}');
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let (layout, columns) = self.resolve_columns(&headers)?;
        debug!("GeneMapper layout: {}", layout.as_str());

        let mut builder = GroupBuilder::default();

        for result in reader.records() {
            let row = result.map_err(row_error)?;
            let line = row.position().map(|p| p.line() as usize).unwrap_or(0);

            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            match &columns {
                Columns::Wide { sample_name, loci } => {
                    let name = self.sample_name(&row, *sample_name, line)?;
                    for (locus, first, second) in loci {
                        builder.push(self.record(&name, locus, &row, [*first, *second], line));
                    }
                }
                Columns::Long {
                    sample_name,
                    marker,
                    alleles,
                } => {
                    let name = self.sample_name(&row, *sample_name, line)?;
                    let locus = row.get(*marker).unwrap_or("");
                    if locus.is_empty() {
                        return Err(ParseError::Row {
                            line,
                            details: "empty marker name".to_string(),
                        });
                    }
                    builder.push(self.record(&name, locus, &row, *alleles, line));
                }
            }
        }

        if builder.record_count == 0 {
            return Err(ParseError::Empty);
        }

        Ok(GeneMapperExport {
            layout,
            samples: builder.samples,
            record_count: builder.record_count,
        })
    }

    fn sample_name(
        &self,
        row: &csv::StringRecord,
        column: usize,
        line: usize,
    ) -> Result<String, ParseError> {
        match row.get(column) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(ParseError::MissingSampleName { line }),
        }
    }

    fn record(
        &self,
        sample_name: &str,
        locus: &str,
        row: &csv::StringRecord,
        allele_columns: [usize; 2],
        line: usize,
    ) -> MarkerRecord {
        let allele = |column: usize| row.get(column).and_then(normalize_allele);
        MarkerRecord {
            sample_id: self.config.patient_id(sample_name),
            locus_name: locus.to_string(),
            allele_1: allele(allele_columns[0]),
            allele_2: allele(allele_columns[1]),
            replicate_id: sample_name.to_string(),
            line,
        }
    }

    /// Pick the layout and map the panel onto header positions
    fn resolve_columns(&self, headers: &[String]) -> Result<(ExportLayout, Columns), ParseError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (position, header) in headers.iter().enumerate() {
            index.entry(header.as_str()).or_insert(position);
        }

        let panel = &self.config.panel;
        let missing = |required: Vec<&str>| -> Vec<String> {
            required
                .into_iter()
                .filter(|c| !index.contains_key(c))
                .map(|c| c.to_string())
                .collect()
        };
        let missing_wide = missing(panel.wide_columns());
        let missing_long = missing(panel.long_columns());

        let layout = match self.config.layout {
            ExportLayout::Auto if missing_wide.is_empty() => ExportLayout::Wide,
            ExportLayout::Auto if missing_long.is_empty() && !self.has_wide_only_columns(&index) => {
                ExportLayout::Long
            }
            ExportLayout::Auto | ExportLayout::Wide => {
                if !missing_wide.is_empty() {
                    return Err(ParseError::MissingColumns {
                        columns: missing_wide,
                    });
                }
                ExportLayout::Wide
            }
            ExportLayout::Long => {
                if !missing_long.is_empty() {
                    return Err(ParseError::MissingColumns {
                        columns: missing_long,
                    });
                }
                ExportLayout::Long
            }
        };

        // Every lookup below is covered by the missing-column checks above
        let col = |name: &str| index.get(name).copied().unwrap_or(usize::MAX);

        let columns = match layout {
            ExportLayout::Long => Columns::Long {
                sample_name: col(&panel.sample_name_column),
                marker: col(&panel.marker_column),
                alleles: [
                    col(&panel.long_allele_columns[0]),
                    col(&panel.long_allele_columns[1]),
                ],
            },
            _ => {
                let mut loci: Vec<(String, usize, usize)> = panel
                    .loci
                    .iter()
                    .map(|l| {
                        (
                            l.name.clone(),
                            col(&l.allele_columns[0]),
                            col(&l.allele_columns[1]),
                        )
                    })
                    .collect();
                if let Some(sex) = &panel.sex_locus {
                    loci.push((sex.name.clone(), col(&sex.x_column), col(&sex.y_column)));
                }
                Columns::Wide {
                    sample_name: col(&panel.sample_name_column),
                    loci,
                }
            }
        };

        Ok((layout, columns))
    }

    /// Whether the header carries panel allele columns the long layout never has
    fn has_wide_only_columns(&self, index: &HashMap<&str, usize>) -> bool {
        let panel = &self.config.panel;
        let long = panel.long_columns();
        panel
            .wide_columns()
            .into_iter()
            .skip(1 + panel.metadata_columns.len())
            .any(|c| !long.contains(&c) && index.contains_key(c))
    }
}

fn row_error(err: csv::Error) -> ParseError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = err.kind()
    {
        return ParseError::Row {
            line: pos.as_ref().map(|p| p.line() as usize).unwrap_or(0),
            details: format!("expected {} fields, found {}", expected_len, len),
        };
    }
    ParseError::Csv(err)
}

/// Groups records by patient then replicate, keeping first-appearance order
#[derive(Default)]
struct GroupBuilder {
    samples: Vec<SampleRecords>,
    positions: HashMap<String, usize>,
    record_count: usize,
}

impl GroupBuilder {
    fn push(&mut self, record: MarkerRecord) {
        let samples = &mut self.samples;
        let position = *self
            .positions
            .entry(record.sample_id.clone())
            .or_insert_with(|| {
                samples.push(SampleRecords {
                    sample_id: record.sample_id.clone(),
                    replicates: Vec::new(),
                });
                samples.len() - 1
            });

        let sample = &mut self.samples[position];
        match sample
            .replicates
            .iter_mut()
            .find(|r| r.replicate_id == record.replicate_id)
        {
            Some(replicate) => replicate.records.push(record),
            None => sample.replicates.push(ReplicateRecords {
                replicate_id: record.replicate_id.clone(),
                records: vec![record],
            }),
        }
        self.record_count += 1;
    }
}
