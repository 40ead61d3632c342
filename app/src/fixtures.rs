// ==============================================================================
// fixtures.rs - Test Exports
// ==============================================================================
// Description: Builders for synthetic SNPXPlex GeneMapper exports used in tests
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

/// Fifteen marker calls of a reference profile ("C/T", "G", "" ...)
pub const PROFILE_A: [&str; 15] = [
    "C/T", "A", "G", "C/T", "T", "A/G", "C", "G/T", "A", "C/G", "T", "A/C", "G", "C/T", "A/G",
];

/// A profile differing from `PROFILE_A` at every locus
pub const PROFILE_B: [&str; 15] = [
    "A", "G", "C/T", "A/G", "C", "T", "A/G", "C", "G/T", "A", "C/T", "G", "A/T", "G", "C",
];

pub const EMPTY_PROFILE: [&str; 15] = [""; 15];

pub const FEMALE: (&str, &str) = ("X", "");
pub const MALE: (&str, &str) = ("X", "Y");
pub const NO_SEX: (&str, &str) = ("", "");

/// Header of a wide SNPXPlex export (Allele 1 .. Allele 34)
pub fn wide_header() -> String {
    let mut columns: Vec<String> = ["Sample File", "Sample Name", "Panel", "Marker", "Dye"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    columns.extend((1..=34).map(|i| format!("Allele {}", i)));
    columns.join("\t")
}

/// One wide row; calls are written with the GeneMapper "NN_" prefix
pub fn wide_row(sample_name: &str, calls: &[&str; 15], sex: (&str, &str)) -> String {
    let mut alleles = vec![String::new(); 34];

    for (index, call) in calls.iter().enumerate() {
        let slots = if index < 14 {
            (2 * index, 2 * index + 1)
        } else {
            (32, 33)
        };
        let mut parts = call.split('/').filter(|p| !p.is_empty());
        if let Some(first) = parts.next() {
            alleles[slots.0] = format!("{:02}_{}", index + 1, first);
        }
        if let Some(second) = parts.next() {
            alleles[slots.1] = format!("{:02}_{}", index + 1, second);
        }
    }
    alleles[28] = sex.0.to_string();
    alleles[29] = sex.1.to_string();

    let mut cells = vec![
        format!("{}.fsa", sample_name),
        sample_name.to_string(),
        "SNPXPlex".to_string(),
        "SNPXPlex".to_string(),
        "B".to_string(),
    ];
    cells.extend(alleles);
    cells.join("\t")
}

/// Header followed by rows, newline-terminated
pub fn export(rows: &[String]) -> String {
    let mut text = wide_header();
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}
