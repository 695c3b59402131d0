// ==============================================================================
// uploads.rs - Upload Intake and Storage
// ==============================================================================
// Description: Reads the upload form, validates it, and stores accepted files
//              in a per-request workspace
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Layout of a request workspace:
//   <uploads>/<request-id>/<uuid>.<ext>        stored uploads
//   <uploads>/<request-id>/results/            pipeline output directory
// ==============================================================================

use axum::body::Bytes;
use axum::extract::Multipart;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::validator::{FileValidator, UploadKind, ValidatedFile};

/// A file field as received, not yet validated
#[derive(Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub data: Bytes,
}

/// The upload form, fully read into memory
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub species_name: Option<String>,
    pub gff: Option<UploadedFile>,
    pub metadata: Option<UploadedFile>,
    pub busco_results: Option<UploadedFile>,
    pub omark_results: Option<UploadedFile>,
}

impl UploadRequest {
    /// Read every multipart field; nothing is written to disk here
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut request = UploadRequest::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::Validation(format!("Failed to read multipart field: {}", e.body_text()))
        })? {
            let name = field.name().unwrap_or("").to_string();

            if name == "species_name" {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read species_name: {}", e.body_text()))
                })?;
                request.species_name = Some(text.trim().to_string()).filter(|s| !s.is_empty());
                continue;
            }

            let Some(kind) = UploadKind::from_field_name(&name) else {
                warn!("Unknown multipart field: {}", name);
                continue;
            };

            let original_name = field.file_name().map(str::to_string);

            let data = field.bytes().await.map_err(|e| {
                AppError::Validation(format!("Failed to read {} file: {}", kind, e.body_text()))
            })?;

            // Browsers send an empty part for an untouched file input
            if data.is_empty() && original_name.as_deref().unwrap_or("").is_empty() {
                continue;
            }

            let Some(original_name) = original_name else {
                return Err(AppError::Validation(format!(
                    "The {} field must be a file",
                    kind.field_name()
                )));
            };

            let slot = request.slot(kind);
            if slot.is_some() {
                warn!("Duplicate {} field, keeping the last one", kind.field_name());
            }
            *slot = Some(UploadedFile { original_name, data });
        }

        Ok(request)
    }

    fn slot(&mut self, kind: UploadKind) -> &mut Option<UploadedFile> {
        match kind {
            UploadKind::Gff => &mut self.gff,
            UploadKind::Metadata => &mut self.metadata,
            UploadKind::BuscoResults => &mut self.busco_results,
            UploadKind::OmarkResults => &mut self.omark_results,
        }
    }

    /// Enforce required files and validate every provided file
    pub fn validate(self, validator: &FileValidator) -> Result<AcceptedUpload, AppError> {
        let gff = self
            .gff
            .ok_or_else(|| AppError::Validation("Missing required GFF file (file_one)".to_string()))?;
        let metadata = self.metadata.ok_or_else(|| {
            AppError::Validation("Missing required metadata CSV file (file_two)".to_string())
        })?;

        let accept = |file: UploadedFile, kind: UploadKind| -> Result<AcceptedFile, AppError> {
            let validated = validator
                .validate_upload(&file.original_name, &file.data, kind)
                .map_err(|e| AppError::Validation(format!("Invalid {} file: {}", kind, e)))?;
            Ok(AcceptedFile {
                validated,
                data: file.data,
            })
        };

        let gff = accept(gff, UploadKind::Gff)?;
        let metadata = accept(metadata, UploadKind::Metadata)?;
        let busco_results = self
            .busco_results
            .map(|f| accept(f, UploadKind::BuscoResults))
            .transpose()?;
        let omark_results = self
            .omark_results
            .map(|f| accept(f, UploadKind::OmarkResults))
            .transpose()?;

        Ok(AcceptedUpload {
            species_name: self.species_name,
            gff,
            metadata,
            busco_results,
            omark_results,
        })
    }
}

/// A file that passed validation
#[derive(Debug)]
pub struct AcceptedFile {
    pub validated: ValidatedFile,
    pub data: Bytes,
}

/// An upload request that passed validation
#[derive(Debug)]
pub struct AcceptedUpload {
    pub species_name: Option<String>,
    pub gff: AcceptedFile,
    pub metadata: AcceptedFile,
    pub busco_results: Option<AcceptedFile>,
    pub omark_results: Option<AcceptedFile>,
}

/// An accepted file persisted to disk
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub kind: UploadKind,
    pub path: PathBuf,
    pub size: usize,
}

/// Per-request working directory
#[derive(Debug)]
pub struct RequestWorkspace {
    id: Uuid,
    dir: PathBuf,
    results_dir: PathBuf,
}

impl RequestWorkspace {
    /// Create `<upload_root>/<id>/` and its `results/` subdirectory
    pub async fn create(upload_root: &Path, id: Uuid) -> std::io::Result<Self> {
        let dir = upload_root.join(id.to_string());
        let results_dir = dir.join("results");
        tokio::fs::create_dir_all(&results_dir).await?;

        Ok(Self {
            id,
            dir,
            results_dir,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Report path handed to the pipeline; unique per request
    pub fn report_path(&self) -> PathBuf {
        self.results_dir
            .join(format!("annotation_report_{}.pdf", self.id.simple()))
    }

    /// Write an accepted file under a generated name
    pub async fn store(&self, file: &AcceptedFile) -> std::io::Result<StoredUpload> {
        let name = format!("{}.{}", Uuid::new_v4().simple(), file.validated.extension);
        let path = self.dir.join(name);

        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        out.write_all(&file.data).await?;
        out.flush().await?;

        info!(
            "Request {}: stored {} upload {:?} as {:?} ({} bytes, SHA256: {})",
            self.id,
            file.validated.kind,
            file.validated.original_name,
            path.file_name().unwrap_or_default(),
            file.validated.size,
            &file.validated.hash_sha256[..16]
        );

        Ok(StoredUpload {
            kind: file.validated.kind,
            path,
            size: file.validated.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file(name: &str, data: &'static [u8]) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            data: Bytes::from_static(data),
        }
    }

    fn gff() -> UploadedFile {
        file("genes.gff3", b"chr1\tsrc\tgene\t1\t100\t.\t+\t.\tID=g1\n")
    }

    fn metadata() -> UploadedFile {
        file("meta.csv", b"species,assembly\nApis mellifera,GCA_1\n")
    }

    #[test]
    fn test_missing_required_files() {
        let validator = FileValidator::new();

        let request = UploadRequest {
            metadata: Some(metadata()),
            ..Default::default()
        };
        let err = request.validate(&validator).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("file_one")));

        let request = UploadRequest {
            gff: Some(gff()),
            ..Default::default()
        };
        let err = request.validate(&validator).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("file_two")));
    }

    #[test]
    fn test_optional_files_accepted_when_empty() {
        let validator = FileValidator::new();
        let request = UploadRequest {
            species_name: Some("Apis mellifera".into()),
            gff: Some(gff()),
            metadata: Some(metadata()),
            busco_results: Some(file("short_summary.txt", b"C:98.1%")),
            omark_results: Some(file("omark.sum", b"")),
        };

        let accepted = request.validate(&validator).unwrap();
        assert_eq!(accepted.omark_results.unwrap().validated.size, 0);
        assert_eq!(accepted.busco_results.unwrap().validated.extension, "txt");
    }

    #[test]
    fn test_empty_required_file_rejected() {
        let request = UploadRequest {
            gff: Some(gff()),
            metadata: Some(file("meta.csv", b"")),
            ..Default::default()
        };

        let err = request.validate(&FileValidator::new()).unwrap_err();
        assert!(err.to_string().contains("metadata CSV"));
    }

    #[tokio::test]
    async fn test_workspace_store_uses_generated_names() {
        let root = tempdir().unwrap();
        let id = Uuid::new_v4();
        let workspace = RequestWorkspace::create(root.path(), id).await.unwrap();

        assert!(workspace.results_dir().is_dir());
        assert!(workspace.report_path().starts_with(workspace.results_dir()));
        assert!(workspace
            .report_path()
            .to_string_lossy()
            .contains(&id.simple().to_string()));

        let accepted = UploadRequest {
            gff: Some(file("../../escape.gff3", b"chr1\tsrc\tgene\t1\t100\t.\t+\t.\tID=g1\n")),
            metadata: Some(metadata()),
            ..Default::default()
        }
        .validate(&FileValidator::new())
        .unwrap();

        let stored = workspace.store(&accepted.gff).await.unwrap();

        assert_eq!(stored.kind, UploadKind::Gff);
        assert_eq!(stored.path.parent(), Some(workspace.dir()));
        assert_eq!(stored.path.extension().unwrap(), "gff3");
        assert_eq!(std::fs::read(&stored.path).unwrap(), accepted.gff.data.to_vec());
    }

    #[tokio::test]
    async fn test_workspaces_are_distinct() {
        let root = tempdir().unwrap();
        let a = RequestWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();
        let b = RequestWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();

        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.report_path(), b.report_path());
    }
}
