// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Shared application state for the report gateway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::PipelineSpec;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Per-request workspaces live here
    upload_dir: PathBuf,

    /// Publicly downloadable reports
    public_results_dir: PathBuf,

    /// Static assets (templates/)
    static_dir: PathBuf,

    /// Fixed part of the pipeline command
    pipeline: PipelineSpec,

    /// Overrides the Host-derived download link base
    public_base_url: Option<String>,
}

impl AppState {
    /// Create application state from configuration
    pub async fn new(config: &Config) -> Result<Self> {
        let upload_dir = config.upload_dir();
        let public_results_dir = config.public_results_dir.clone();

        // Create directories if they don't exist
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .context("Failed to create upload directory")?;
        tokio::fs::create_dir_all(&public_results_dir)
            .await
            .context("Failed to create public results directory")?;

        // The pipeline only ever sees absolute paths
        let upload_dir = tokio::fs::canonicalize(&upload_dir)
            .await
            .context("Failed to resolve upload directory")?;
        let public_results_dir = tokio::fs::canonicalize(&public_results_dir)
            .await
            .context("Failed to resolve public results directory")?;

        let pipeline = PipelineSpec::from_config(config)
            .context("Failed to resolve pipeline script paths")?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                upload_dir,
                public_results_dir,
                static_dir: config.static_dir.clone(),
                pipeline,
                public_base_url: config.public_base_url.clone(),
            }),
        })
    }

    /// Get upload directory
    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }

    /// Get public results directory
    pub fn public_results_dir(&self) -> &Path {
        &self.inner.public_results_dir
    }

    pub fn static_dir(&self) -> &Path {
        &self.inner.static_dir
    }

    pub fn pipeline(&self) -> &PipelineSpec {
        &self.inner.pipeline
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.inner.public_base_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_creates_directories() {
        let root = tempdir().unwrap();
        let config = Config::for_root(root.path());

        let state = AppState::new(&config).await.unwrap();

        assert!(state.upload_dir().is_dir());
        assert!(state.upload_dir().is_absolute());
        assert!(state.public_results_dir().is_dir());
        assert_eq!(state.pipeline().entry_point(), root.path().join("pipeline.sh"));
        assert!(state.public_base_url().is_none());
    }
}
