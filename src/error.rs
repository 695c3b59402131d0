// ==============================================================================
// error.rs - Request Boundary Errors
// ==============================================================================
// Description: Error type returned by every handler, mapped to JSON responses
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;
use crate::pipeline::PipelineError;
use crate::publish::PublishError;

pub const PIPELINE_NOT_SUCCESSFUL: &str = "Pipeline did not return success";

#[derive(Error, Debug)]
pub enum AppError {
    /// Client fault; raised before any file is written
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Pipeline exited 0 but broke the stdout contract
    #[error("{}", PIPELINE_NOT_SUCCESSFUL)]
    MalformedPipelineOutput { raw: String },

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Pipeline(_)
            | AppError::MalformedPipelineOutput { .. }
            | AppError::Publish(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            AppError::Validation(msg) => {
                warn!("Rejected upload: {}", msg);
                ErrorResponse::new(msg)
            }
            AppError::MalformedPipelineOutput { raw } => {
                error!("Pipeline output did not match contract: {:?}", raw);
                ErrorResponse::with_raw(PIPELINE_NOT_SUCCESSFUL, raw)
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ErrorResponse::new("Internal server error")
            }
            AppError::NotFound => ErrorResponse::new("Resource not found"),
            other => {
                error!("Request failed: {}", other);
                ErrorResponse::new(other.to_string())
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("missing".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(PipelineError::TimedOut(Duration::from_secs(120))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::MalformedPipelineOutput { raw: String::new() }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_message_passes_through() {
        let err = AppError::from(PipelineError::TimedOut(Duration::from_secs(120)));
        assert_eq!(err.to_string(), "Pipeline timed out after 120 seconds");
    }
}
