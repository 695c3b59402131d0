// ==============================================================================
// validator.rs - File Upload Validation
// ==============================================================================
// Description: Validates uploaded files in memory before anything touches disk
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// Security: Size limits, filename sanitisation, lightweight content sniffing
// ==============================================================================

use anyhow::Result;
use axum::body::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{BufRead, BufReader};
use tracing::debug;

// Maximum file sizes (enforced at validation layer)
const MAX_GFF_FILE_SIZE: usize = 150 * 1024 * 1024; // 150 MB
const MAX_METADATA_FILE_SIZE: usize = 5 * 1024 * 1024; // 5 MB
const MAX_RESULTS_FILE_SIZE: usize = 20 * 1024 * 1024; // 20 MB

// Only the head of a file is sniffed
const SNIFF_LINES: usize = 100;

const GFF_COLUMNS: usize = 9;

/// Which form field a file arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Gff,
    Metadata,
    BuscoResults,
    OmarkResults,
}

impl UploadKind {
    /// Multipart field name used by the upload form
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::Gff => "file_one",
            UploadKind::Metadata => "file_two",
            UploadKind::BuscoResults => "busco_results",
            UploadKind::OmarkResults => "omark_results",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            "file_one" => Some(UploadKind::Gff),
            "file_two" => Some(UploadKind::Metadata),
            "busco_results" => Some(UploadKind::BuscoResults),
            "omark_results" => Some(UploadKind::OmarkResults),
            _ => None,
        }
    }

    /// Required by the upload form; optional tool output may be empty
    pub fn is_required(&self) -> bool {
        matches!(self, UploadKind::Gff | UploadKind::Metadata)
    }

    fn max_size(&self) -> usize {
        match self {
            UploadKind::Gff => MAX_GFF_FILE_SIZE,
            UploadKind::Metadata => MAX_METADATA_FILE_SIZE,
            UploadKind::BuscoResults | UploadKind::OmarkResults => MAX_RESULTS_FILE_SIZE,
        }
    }

    /// Extension used when the original name has none
    fn default_extension(&self) -> &'static str {
        match self {
            UploadKind::Gff => "gff",
            UploadKind::Metadata => "csv",
            UploadKind::BuscoResults | UploadKind::OmarkResults => "txt",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UploadKind::Gff => "GFF",
            UploadKind::Metadata => "metadata CSV",
            UploadKind::BuscoResults => "BUSCO results",
            UploadKind::OmarkResults => "OMArk results",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct ValidatedFile {
    pub kind: UploadKind,
    pub original_name: String,
    pub extension: String,
    pub size: usize,
    pub hash_sha256: String,
}

#[derive(Debug, Default)]
pub struct FileValidator;

impl FileValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a file taken from the multipart form
    pub fn validate_upload(
        &self,
        filename: &str,
        file_data: &Bytes,
        kind: UploadKind,
    ) -> Result<ValidatedFile> {
        debug!("Validating {} file: {}", kind, filename);

        // 1. Size check (BEFORE any processing)
        let size = file_data.len();
        if size == 0 && kind.is_required() {
            anyhow::bail!("File is empty");
        }
        if size > kind.max_size() {
            anyhow::bail!(
                "File too large: {} bytes (max: {} bytes for {})",
                size,
                kind.max_size(),
                kind
            );
        }

        // 2. Extension from the sanitised name; the name itself is never used as a path
        let base_name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        let extension = sanitize_filename(base_name)
            .ok()
            .and_then(|safe| extension_of(&safe))
            .unwrap_or_else(|| kind.default_extension().to_string());

        // 3. Content validation (basic format check)
        match kind {
            UploadKind::Gff => validate_gff_format(file_data)?,
            UploadKind::Metadata => validate_metadata_format(file_data)?,
            // Opaque tool output, handed through untouched
            UploadKind::BuscoResults | UploadKind::OmarkResults => {}
        }

        let hash_sha256 = compute_sha256(file_data);
        debug!("SHA-256: {}", hash_sha256);

        Ok(ValidatedFile {
            kind,
            original_name: filename.to_string(),
            extension,
            size,
            hash_sha256,
        })
    }
}

/// Reduce a client supplied name to `[A-Za-z0-9._-]`, rejecting hidden or empty results
pub fn sanitize_filename(name: &str) -> Result<String> {
    let safe = name
        .replace(['/', '\\', '\0'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
        .take(255)
        .collect::<String>();

    if safe.is_empty() {
        anyhow::bail!("Invalid filename after sanitization");
    }

    if safe.starts_with('.') {
        anyhow::bail!("Filename cannot start with '.'");
    }

    Ok(safe)
}

/// True when `name` is already a safe single path segment
pub fn is_safe_filename(name: &str) -> bool {
    matches!(sanitize_filename(name), Ok(safe) if safe == name)
}

fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

fn validate_gff_format(data: &Bytes) -> Result<()> {
    let reader = BufReader::new(&data[..]);

    for (index, line) in reader.split(b'\n').take(SNIFF_LINES).enumerate() {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        // First feature line decides
        let columns = line.split('\t').count();
        if columns < GFF_COLUMNS {
            anyhow::bail!(
                "Invalid GFF format at line {}: expected {} tab-separated columns, found {}",
                index + 1,
                GFF_COLUMNS,
                columns
            );
        }
        return Ok(());
    }

    Ok(())
}

fn validate_metadata_format(data: &Bytes) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(&data[..]);

    // Header bytes need not be UTF-8
    let headers = reader
        .byte_headers()
        .map_err(|e| anyhow::anyhow!("Invalid CSV header: {}", e))?;

    if headers.iter().all(|h| h.trim_ascii().is_empty()) {
        anyhow::bail!("Metadata CSV has no header columns");
    }

    Ok(())
}

fn compute_sha256(data: &Bytes) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
