// ==============================================================================
// panel.rs - Genotyping Panel Definition
// ==============================================================================
// Description: Locus panel (column mapping, allele alphabets, sex marker)
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Default panel: SNPXPlex as exported by GeneMapper
//   Locus 1 .. Locus 14  ← (Allele 1, Allele 2) .. (Allele 27, Allele 28)
//   Locus 15             ← (Allele 33, Allele 34)
//   Sex                  ← (Allele 29, Allele 30) read as X / Y
//   Allele 31 / Allele 32 are always empty and not part of the panel
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::ConfigError;

/// One SNP locus and the two GeneMapper columns holding its alleles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocusDefinition {
    pub name: String,
    pub allele_columns: [String; 2],
    #[serde(default = "default_snp_alphabet")]
    pub alphabet: Vec<String>,
}

/// The sex marker: one column carrying X, one carrying Y
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SexLocusDefinition {
    pub name: String,
    pub x_column: String,
    pub y_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelDefinition {
    pub name: String,
    /// Column holding the sample (well) name
    pub sample_name_column: String,
    /// Columns the wide export must carry besides allele columns
    pub metadata_columns: Vec<String>,
    /// Marker column of the long export layout
    pub marker_column: String,
    /// Allele columns of the long export layout
    pub long_allele_columns: [String; 2],
    pub loci: Vec<LocusDefinition>,
    pub sex_locus: Option<SexLocusDefinition>,
}

fn default_snp_alphabet() -> Vec<String> {
    ["A", "C", "G", "T"].iter().map(|s| s.to_string()).collect()
}

fn allele_column(index: usize) -> String {
    format!("Allele {}", index)
}

impl Default for PanelDefinition {
    fn default() -> Self {
        Self::snpxplex()
    }
}

impl PanelDefinition {
    /// SNPXPlex identity panel: 15 SNP loci plus the X/Y marker
    pub fn snpxplex() -> Self {
        let mut loci: Vec<LocusDefinition> = (0..14)
            .map(|i| LocusDefinition {
                name: format!("Locus {}", i + 1),
                allele_columns: [allele_column(2 * i + 1), allele_column(2 * i + 2)],
                alphabet: default_snp_alphabet(),
            })
            .collect();
        loci.push(LocusDefinition {
            name: "Locus 15".to_string(),
            allele_columns: [allele_column(33), allele_column(34)],
            alphabet: default_snp_alphabet(),
        });

        Self {
            name: "SNPXPlex".to_string(),
            sample_name_column: "Sample Name".to_string(),
            metadata_columns: ["Sample File", "Panel", "Marker", "Dye"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            marker_column: "Marker".to_string(),
            long_allele_columns: [allele_column(1), allele_column(2)],
            loci,
            sex_locus: Some(SexLocusDefinition {
                name: "Sex".to_string(),
                x_column: allele_column(29),
                y_column: allele_column(30),
            }),
        }
    }

    pub fn locus(&self, name: &str) -> Option<&LocusDefinition> {
        self.loci.iter().find(|l| l.name == name)
    }

    pub fn is_sex_locus(&self, name: &str) -> bool {
        self.sex_locus.as_ref().map(|s| s.name == name).unwrap_or(false)
    }

    /// Whether `name` is a marker locus or the sex locus of this panel
    pub fn knows_locus(&self, name: &str) -> bool {
        self.locus(name).is_some() || self.is_sex_locus(name)
    }

    pub fn marker_count(&self) -> usize {
        self.loci.len()
    }

    /// Check a normalized allele against the alphabet of its locus
    pub fn allele_allowed(&self, locus: &str, allele: &str) -> bool {
        if self.is_sex_locus(locus) {
            return allele == "X" || allele == "Y";
        }
        self.locus(locus)
            .map(|l| l.alphabet.iter().any(|a| a.eq_ignore_ascii_case(allele)))
            .unwrap_or(false)
    }

    /// Columns required by the wide (one row per sample) layout, in report order
    pub fn wide_columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        if let Some(first) = self.metadata_columns.first() {
            columns.push(first.as_str());
        }
        columns.push(self.sample_name_column.as_str());
        columns.extend(self.metadata_columns.iter().skip(1).map(|c| c.as_str()));
        for locus in &self.loci {
            columns.extend(locus.allele_columns.iter().map(|c| c.as_str()));
        }
        if let Some(sex) = &self.sex_locus {
            columns.push(sex.x_column.as_str());
            columns.push(sex.y_column.as_str());
        }
        columns
    }

    /// Columns required by the long (one row per sample and marker) layout
    pub fn long_columns(&self) -> Vec<&str> {
        vec![
            self.sample_name_column.as_str(),
            self.marker_column.as_str(),
            self.long_allele_columns[0].as_str(),
            self.long_allele_columns[1].as_str(),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loci.is_empty() {
            return Err(ConfigError::EmptyPanel);
        }

        let mut names = HashSet::new();
        for locus in &self.loci {
            if !names.insert(locus.name.as_str()) {
                return Err(ConfigError::DuplicateLocus(locus.name.clone()));
            }
            if locus.alphabet.is_empty() {
                return Err(ConfigError::EmptyAlphabet(locus.name.clone()));
            }
        }
        if let Some(sex) = &self.sex_locus {
            if !names.insert(sex.name.as_str()) {
                return Err(ConfigError::DuplicateLocus(sex.name.clone()));
            }
        }

        let mut columns = HashSet::new();
        for column in self.wide_columns() {
            if !columns.insert(column) {
                return Err(ConfigError::DuplicateColumn(column.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snpxplex_layout() {
        let panel = PanelDefinition::snpxplex();
        assert_eq!(panel.marker_count(), 15);
        assert_eq!(panel.loci[0].allele_columns, ["Allele 1".to_string(), "Allele 2".to_string()]);
        assert_eq!(panel.loci[13].allele_columns, ["Allele 27".to_string(), "Allele 28".to_string()]);
        assert_eq!(panel.loci[14].allele_columns, ["Allele 33".to_string(), "Allele 34".to_string()]);
        assert!(panel.is_sex_locus("Sex"));
        assert!(panel.validate().is_ok());
    }

    #[test]
    fn test_wide_columns_order() {
        let panel = PanelDefinition::snpxplex();
        let columns = panel.wide_columns();
        assert_eq!(&columns[..5], &["Sample File", "Sample Name", "Panel", "Marker", "Dye"]);
        assert_eq!(columns.len(), 5 + 15 * 2 + 2);
        assert!(!columns.contains(&"Allele 31"));
    }

    #[test]
    fn test_allele_alphabets() {
        let panel = PanelDefinition::snpxplex();
        assert!(panel.allele_allowed("Locus 1", "C"));
        assert!(!panel.allele_allowed("Locus 1", "X"));
        assert!(panel.allele_allowed("Sex", "Y"));
        assert!(!panel.allele_allowed("Sex", "A"));
        assert!(!panel.allele_allowed("Locus 99", "A"));
    }

    #[test]
    fn test_duplicate_locus_rejected() {
        let mut panel = PanelDefinition::snpxplex();
        panel.loci[1].name = "Locus 1".to_string();
        assert!(matches!(panel.validate(), Err(ConfigError::DuplicateLocus(name)) if name == "Locus 1"));
    }

    #[test]
    fn test_panel_from_json() {
        let json = r#"{
            "name": "mini",
            "loci": [
                { "name": "rs1", "allele_columns": ["A1", "A2"] },
                { "name": "rs2", "allele_columns": ["A3", "A4"], "alphabet": ["A", "G"] }
            ],
            "sex_locus": null
        }"#;
        let panel: PanelDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(panel.name, "mini");
        assert_eq!(panel.loci[0].alphabet.len(), 4);
        assert!(!panel.allele_allowed("rs2", "C"));
        assert_eq!(panel.sample_name_column, "Sample Name");
        assert!(panel.sex_locus.is_none());
    }
}
