// ==============================================================================
// input.rs - Uploaded Export Checks
// ==============================================================================
// Description: Checks uploaded GeneMapper buffers (size, type, gzip, encoding)
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// Security: Allowlist-only file types, magic number verification, bounded
//           decompression
// ==============================================================================

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DEFAULT_MAX_INPUT_BYTES;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors raised while checking an uploaded export
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid file name after sanitization: {0:?}")]
    InvalidFileName(String),

    #[error("Invalid file type: {0}")]
    UnsupportedExtension(String),

    #[error("Magic number mismatch for .{0} file")]
    MagicMismatch(String),

    #[error("Failed to decompress gzip input: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("Input is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// An input buffer that passed every check, decoded to text
#[derive(Debug, Clone)]
pub struct CheckedInput {
    /// Last path component of the supplied name, unsafe characters removed
    pub file_name: Option<String>,
    pub extension: Option<String>,
    /// Size of the raw (possibly compressed) buffer
    pub size: u64,
    /// SHA-256 of the raw buffer
    pub sha256: String,
    pub compressed: bool,
    pub text: String,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

pub struct InputChecker {
    max_input_bytes: usize,
    allowed_types: HashMap<String, Vec<u8>>,
}

impl Default for InputChecker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_BYTES)
    }
}

impl InputChecker {
    pub fn new(max_input_bytes: usize) -> Self {
        let mut allowed_types = HashMap::new();

        // GeneMapper tab-delimited exports (plain text, no magic number)
        allowed_types.insert("txt".to_string(), vec![]);
        allowed_types.insert("tsv".to_string(), vec![]);

        // Gzip compressed exports
        allowed_types.insert("txt.gz".to_string(), GZIP_MAGIC.to_vec());
        allowed_types.insert("tsv.gz".to_string(), GZIP_MAGIC.to_vec());

        Self {
            max_input_bytes,
            allowed_types,
        }
    }

    /// Check a buffer and decode it to text
    ///
    /// The file name is optional; when given, its extension must be on the
    /// allowlist and match the buffer's magic number. Gzip content is
    /// detected from the magic number alone.
    pub fn check(&self, data: &[u8], file_name: Option<&str>) -> Result<CheckedInput, InputError> {
        info!(
            "Checking input: {} ({} bytes)",
            file_name.unwrap_or("<buffer>"),
            data.len()
        );

        // 1. Size check
        if data.len() > self.max_input_bytes {
            return Err(InputError::TooLarge {
                size: data.len(),
                max: self.max_input_bytes,
            });
        }
        debug!("Size check passed: {} bytes", data.len());

        // 2. Extension check (allowlist) and magic number
        let (safe_name, extension) = match file_name {
            Some(name) => {
                let safe_name = sanitize_filename(name)?;
                let ext = get_extension(&safe_name);
                let expected_magic = self
                    .allowed_types
                    .get(&ext)
                    .ok_or_else(|| InputError::UnsupportedExtension(ext.clone()))?;
                if !data.starts_with(expected_magic) {
                    return Err(InputError::MagicMismatch(ext));
                }
                debug!("Extension check passed: {}", ext);
                (Some(safe_name), Some(ext))
            }
            None => (None, None),
        };

        // 3. Decompression (bounded)
        let compressed = data.starts_with(&GZIP_MAGIC);
        let bytes = if compressed {
            self.decompress(data)?
        } else {
            data.to_vec()
        };

        // 4. Encoding
        let text = String::from_utf8(bytes)?;

        // 5. Compute SHA-256 hash of the raw buffer
        let sha256 = compute_sha256(data);
        debug!("SHA-256: {}", sha256);

        Ok(CheckedInput {
            file_name: safe_name,
            extension,
            size: data.len() as u64,
            sha256,
            compressed,
            text,
            checked_at: chrono::Utc::now(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, InputError> {
        let limit = self.max_input_bytes as u64 + 1;
        let mut decoder = flate2::read::GzDecoder::new(data).take(limit);
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes).map_err(InputError::Gzip)?;

        if bytes.len() > self.max_input_bytes {
            return Err(InputError::TooLarge {
                size: bytes.len(),
                max: self.max_input_bytes,
            });
        }
        debug!("Decompressed {} -> {} bytes", data.len(), bytes.len());
        Ok(bytes)
    }
}

fn sanitize_filename(name: &str) -> Result<String, InputError> {
    // Keep the last path component only
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let safe: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' '))
        .take(255)
        .collect();

    if safe.trim_matches('.').trim().is_empty() {
        return Err(InputError::InvalidFileName(name.to_string()));
    }
    Ok(safe)
}

fn get_extension(filename: &str) -> String {
    let lower = filename.to_lowercase();
    // Compound extensions like .txt.gz
    for compound in ["txt.gz", "tsv.gz"] {
        if lower.ends_with(&format!(".{}", compound)) {
            return compound.to_string();
        }
    }
    match lower.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => String::new(),
    }
}

pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
