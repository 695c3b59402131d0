// ==============================================================================
// models.rs - API Data Models
// ==============================================================================
// Description: Request/response models for the annotation report gateway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported to the upload page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Upload success response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: UploadStatus,
    pub output_url: String,
}

impl UploadResponse {
    pub fn success(output_url: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Success,
            output_url: output_url.into(),
        }
    }
}

/// Error response
///
/// `raw` carries the pipeline's stdout verbatim when it broke the output contract.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: UploadStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Error,
            message: message.into(),
            raw: None,
        }
    }

    pub fn with_raw(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Error,
            message: message.into(),
            raw: Some(raw.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub upload_dir: bool,
    pub public_results_dir: bool,
    pub pipeline_script: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_missing_raw() {
        let body = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(body, serde_json::json!({"status": "error", "message": "boom"}));

        let body = serde_json::to_value(ErrorResponse::with_raw("bad", "not json")).unwrap();
        assert_eq!(body["raw"], "not json");
    }

    #[test]
    fn test_success_shape() {
        let body = serde_json::to_value(UploadResponse::success("http://host/results/a.pdf")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"status": "success", "output_url": "http://host/results/a.pdf"})
        );
    }
}
