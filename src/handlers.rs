// ==============================================================================
// handlers.rs - API Request Handlers
// ==============================================================================
// Description: HTTP request handlers for the annotation report gateway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use mime_guess::Mime;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::*,
    pipeline::PipelineReport,
    publish::{download_url, publish_result, request_base_url},
    state::AppState,
    uploads::{RequestWorkspace, UploadRequest},
    validator::{is_safe_filename, FileValidator},
};

const UPLOAD_PAGE: &str = include_str!("../static/index.html");

// Species names are free text; only the head is logged
const SPECIES_LOG_CHARS: usize = 200;

/// Upload form page
pub async fn index() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let upload_dir = is_dir(state.upload_dir()).await;
    let public_results_dir = is_dir(state.public_results_dir()).await;
    let entry_point = state.pipeline().entry_point();
    let pipeline_script = is_file(entry_point).await
        // Bare program names are resolved through PATH at spawn time
        || entry_point.components().count() == 1;

    let ready = upload_dir && public_results_dir && pipeline_script;

    let response = ReadinessResponse {
        ready,
        upload_dir,
        public_results_dir,
        pipeline_script,
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

async fn is_dir(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// Upload endpoint: store files, run the pipeline, publish the report
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let request_id = Uuid::new_v4();
    info!("Request {}: received upload", request_id);

    // Everything is validated before the first write
    let accepted = UploadRequest::from_multipart(multipart)
        .await?
        .validate(&FileValidator::new())?;

    if let Some(species) = &accepted.species_name {
        let shown: String = species.chars().take(SPECIES_LOG_CHARS).collect();
        info!("Request {}: species '{}'", request_id, shown);
    }

    let workspace = RequestWorkspace::create(state.upload_dir(), request_id)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create request workspace: {}", e)))?;

    let store_error = |e: std::io::Error| AppError::Internal(format!("Failed to store upload: {}", e));

    let gff = workspace.store(&accepted.gff).await.map_err(store_error)?;
    workspace.store(&accepted.metadata).await.map_err(store_error)?;

    // Stored for the record; the pipeline contract does not take them
    for optional in [&accepted.busco_results, &accepted.omark_results]
        .into_iter()
        .flatten()
    {
        let stored = workspace.store(optional).await.map_err(store_error)?;
        info!(
            "Request {}: {} upload kept at {:?}, not forwarded to pipeline",
            request_id, stored.kind, stored.path
        );
    }

    tokio::fs::create_dir_all(state.public_results_dir())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create public results directory: {}", e)))?;

    let invocation = state
        .pipeline()
        .invocation(&gff.path, &workspace.report_path(), workspace.dir());

    info!(
        "Request {}: running pipeline (timeout {}s)",
        request_id,
        state.pipeline().timeout().as_secs()
    );
    let output = invocation.run().await?;

    if !output.stderr.trim().is_empty() {
        info!("Request {}: pipeline stderr: {}", request_id, output.stderr.trim());
    }

    let Some(report_path) = PipelineReport::success_output(&output.stdout) else {
        warn!("Request {}: pipeline did not report success", request_id);
        return Err(AppError::MalformedPipelineOutput { raw: output.stdout });
    };

    let published = publish_result(&report_path, state.public_results_dir()).await?;

    let base = request_base_url(state.public_base_url(), &headers);
    let output_url = download_url(&base, &published.file_name);

    info!("Request {}: report available at {}", request_id, output_url);

    Ok(Json(UploadResponse::success(output_url)))
}

/// Download a published report
pub async fn download_result(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    // Untrusted path segment: anything but a plain file name is treated as missing
    if !is_safe_filename(&filename) {
        warn!("Rejected download name {:?}", filename);
        return Err(AppError::NotFound);
    }

    let file_path = state.public_results_dir().join(&filename);

    let file_metadata = match tokio::fs::metadata(&file_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(AppError::NotFound),
    };

    let file = tokio::fs::File::open(&file_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to open file: {}", e)))?;

    let stream = ReaderStream::new(file);
    let body = axum::body::Body::from_stream(stream);

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| AppError::Internal(format!("Invalid download header: {}", e)))?;

    let content_type = HeaderValue::from_str(content_type_for(&filename).as_ref())
        .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_metadata.len()));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    info!("Serving download: {} ({} bytes)", filename, file_metadata.len());

    Ok((headers, body).into_response())
}

fn content_type_for(filename: &str) -> Mime {
    mime_guess::from_path(filename).first_or_octet_stream()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("report.pdf").essence_str(), "application/pdf");
        assert_eq!(content_type_for("REPORT.PDF").essence_str(), "application/pdf");
        assert_eq!(content_type_for("table.csv").essence_str(), "text/csv");
        assert_eq!(content_type_for("summary.json").essence_str(), "application/json");
        assert_eq!(content_type_for("archive").essence_str(), "application/octet-stream");
    }

    #[test]
    fn test_upload_page_fields() {
        for field in ["file_one", "file_two", "busco_results", "omark_results", "species_name"] {
            assert!(UPLOAD_PAGE.contains(&format!("name=\"{}\"", field)));
        }
    }
}
