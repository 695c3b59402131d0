// ==============================================================================
// config.rs - Gateway Configuration
// ==============================================================================
// Description: Command line / environment configuration for the gateway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Every option can be given as a flag or as the matching environment variable
// (e.g. --pipeline-timeout-secs / PIPELINE_TIMEOUT_SECS). A .env file in the
// working directory is loaded by main before parsing.
// ==============================================================================

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Upload gateway for the annotation report pipeline", long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env, default_value = "0.0.0.0:8099")]
    pub listen_addr: SocketAddr,

    /// Storage root; uploads are kept under <storage_dir>/uploads
    #[arg(long, env, default_value = "storage")]
    pub storage_dir: PathBuf,

    /// Publicly servable directory for finished reports
    #[arg(long, env, default_value = "public/results")]
    pub public_results_dir: PathBuf,

    /// Directory holding static assets (templates/)
    #[arg(long, env, default_value = "static")]
    pub static_dir: PathBuf,

    /// Program used to launch the pipeline
    #[arg(long, env, default_value = "python")]
    pub pipeline_program: PathBuf,

    /// Pipeline script passed as the first argument
    #[arg(long, env, default_value = "scripts/pipeline.py")]
    pub pipeline_script: PathBuf,

    /// Run the pipeline program itself, without a script argument
    #[arg(long, env, default_value_t = false)]
    pub pipeline_direct: bool,

    /// BUSCO plotting helper handed to the pipeline
    #[arg(long, env, default_value = "scripts/plot_BUSCO.py")]
    pub busco_plot_script: PathBuf,

    /// OMArk plotting helper handed to the pipeline
    #[arg(long, env, default_value = "scripts/plot_OMArk.py")]
    pub omark_plot_script: PathBuf,

    /// Hard cap on a single pipeline run
    #[arg(long, env, default_value_t = 120)]
    pub pipeline_timeout_secs: u64,

    /// Base used for download links (derived from the Host header when unset)
    #[arg(long, env)]
    pub public_base_url: Option<String>,

    /// Maximum request body size in megabytes
    #[arg(long, env, default_value_t = 200)]
    pub max_upload_mb: usize,

    /// Comma-separated list of origins allowed by CORS
    #[arg(long, env)]
    pub cors_allowed_origins: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env, default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    pub fn upload_dir(&self) -> PathBuf {
        self.storage_dir.join("uploads")
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Parsed CORS origin list; empty when CORS is not configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Configuration rooted in `root`, used by tests
    #[cfg(test)]
    pub fn for_root(root: &std::path::Path) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            storage_dir: root.join("storage"),
            public_results_dir: root.join("public").join("results"),
            static_dir: root.join("static"),
            pipeline_program: PathBuf::from("sh"),
            pipeline_script: root.join("pipeline.sh"),
            pipeline_direct: false,
            busco_plot_script: root.join("plot_BUSCO.py"),
            omark_plot_script: root.join("plot_OMArk.py"),
            pipeline_timeout_secs: 120,
            public_base_url: None,
            max_upload_mb: 16,
            cors_allowed_origins: None,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["annotation-report-gateway"]).unwrap();

        assert_eq!(config.listen_addr.port(), 8099);
        assert_eq!(config.pipeline_timeout(), Duration::from_secs(120));
        assert_eq!(config.upload_dir(), PathBuf::from("storage").join("uploads"));
        assert_eq!(config.pipeline_program, PathBuf::from("python"));
        assert!(config.public_base_url.is_none());
        assert!(config.cors_origins().is_empty());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "annotation-report-gateway",
            "--pipeline-timeout-secs",
            "30",
            "--public-base-url",
            "https://reports.example.org",
            "--cors-allowed-origins",
            "https://a.example.org, ,https://b.example.org",
        ])
        .unwrap();

        assert_eq!(config.pipeline_timeout(), Duration::from_secs(30));
        assert_eq!(config.public_base_url.as_deref(), Some("https://reports.example.org"));
        assert_eq!(
            config.cors_origins(),
            vec!["https://a.example.org", "https://b.example.org"]
        );
    }
}
