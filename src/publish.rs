// ==============================================================================
// publish.rs - Result Publishing
// ==============================================================================
// Description: Copies pipeline reports into the public results directory
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::http::{header, HeaderMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::validator::sanitize_filename;

/// Errors raised while publishing a pipeline report
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Pipeline output not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Pipeline output has no usable file name: {}", .0.display())]
    InvalidName(PathBuf),

    #[error("Failed to copy result to {}: {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Published result {} is incomplete ({written} of {expected} bytes)", .path.display())]
    Incomplete {
        path: PathBuf,
        written: u64,
        expected: u64,
    },
}

/// A report copied into the public results directory
#[derive(Debug)]
pub struct PublishedResult {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Copy `source` into `public_dir` under its sanitised base name and verify the copy
pub async fn publish_result(source: &Path, public_dir: &Path) -> Result<PublishedResult, PublishError> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(PublishError::Missing(source.to_path_buf())),
    };

    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| sanitize_filename(name).ok())
        .ok_or_else(|| PublishError::InvalidName(source.to_path_buf()))?;

    let destination = public_dir.join(&file_name);
    let expected = metadata.len();

    // A pipeline may already write into the public directory
    if !same_file(source, &destination).await {
        tokio::fs::copy(source, &destination)
            .await
            .map_err(|e| PublishError::Copy {
                path: destination.clone(),
                source: e,
            })?;
    } else {
        debug!("Result already in public directory: {:?}", destination);
    }

    let written = tokio::fs::metadata(&destination)
        .await
        .map(|m| m.len())
        .map_err(|e| PublishError::Copy {
            path: destination.clone(),
            source: e,
        })?;

    if written != expected {
        return Err(PublishError::Incomplete {
            path: destination,
            written,
            expected,
        });
    }

    info!("Published result {} ({} bytes)", file_name, written);

    Ok(PublishedResult {
        file_name,
        path: destination,
        size: written,
    })
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Scheme and authority used for download links
///
/// A configured base wins; otherwise the request's Host header is used, with
/// the scheme taken from X-Forwarded-Proto when a proxy sets it.
pub fn request_base_url(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured.filter(|b| !b.trim().is_empty()) {
        return base.trim().trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| *s == "http" || *s == "https")
        .unwrap_or("http");

    format!("{}://{}", scheme, host)
}

pub fn download_url(base: &str, file_name: &str) -> String {
    format!("{}/results/{}", base.trim_end_matches('/'), file_name)
}
