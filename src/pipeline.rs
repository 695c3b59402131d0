// ==============================================================================
// pipeline.rs - External Report Pipeline Invocation
// ==============================================================================
// Description: Builds and runs the external annotation report pipeline
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Invocation contract:
//   <program> [<script>] <gff> <busco-plot-script> <omark-plot-script> <report-pdf>
// On success the pipeline prints one JSON object on stdout:
//   {"status":"success","output":"/abs/path/to/report.pdf"}
// ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;

// Stderr is only echoed back as a short tail
const STDERR_TAIL_CHARS: usize = 2000;

/// Errors raised while running the pipeline process
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to start pipeline '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("Pipeline {}{}", describe_status(.status), format_stderr(.stderr))]
    Failed { status: ExitStatus, stderr: String },

    #[error("Failed to collect pipeline output: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Fixed part of the pipeline command, resolved once from configuration
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    program: PathBuf,
    script: Option<PathBuf>,
    busco_plot_script: PathBuf,
    omark_plot_script: PathBuf,
    timeout: Duration,
}

impl PipelineSpec {
    pub fn from_config(config: &Config) -> std::io::Result<Self> {
        let script = if config.pipeline_direct {
            None
        } else {
            Some(std::path::absolute(&config.pipeline_script)?)
        };

        Ok(Self {
            program: config.pipeline_program.clone(),
            script,
            busco_plot_script: std::path::absolute(&config.busco_plot_script)?,
            omark_plot_script: std::path::absolute(&config.omark_plot_script)?,
            timeout: config.pipeline_timeout(),
        })
    }

    /// The file that has to exist for the pipeline to be runnable
    pub fn entry_point(&self) -> &Path {
        self.script.as_deref().unwrap_or(self.program.as_path())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the per-request invocation
    ///
    /// Only the GFF path is forwarded; stored BUSCO/OMArk uploads are not part
    /// of the pipeline's argument contract.
    pub fn invocation(&self, gff: &Path, report: &Path, working_dir: &Path) -> PipelineInvocation {
        let mut args = Vec::with_capacity(5);
        if let Some(script) = &self.script {
            args.push(script.clone());
        }
        args.push(gff.to_path_buf());
        args.push(self.busco_plot_script.clone());
        args.push(self.omark_plot_script.clone());
        args.push(report.to_path_buf());

        PipelineInvocation {
            program: self.program.clone(),
            args,
            working_dir: working_dir.to_path_buf(),
            timeout: self.timeout,
        }
    }
}

/// One pipeline run
#[derive(Debug)]
pub struct PipelineInvocation {
    program: PathBuf,
    args: Vec<PathBuf>,
    working_dir: PathBuf,
    timeout: Duration,
}

/// Captured output of a successful (exit 0) run
#[derive(Debug)]
pub struct PipelineOutput {
    pub stdout: String,
    pub stderr: String,
}

impl PipelineInvocation {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[PathBuf] {
        &self.args
    }

    /// Run to completion, killing the child if it outlives the timeout
    pub async fn run(&self) -> Result<PipelineOutput, PipelineError> {
        debug!("Running pipeline: {} {:?}", self.program.display(), self.args);

        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Pipeline exceeded {:?}, killed", self.timeout);
                return Err(PipelineError::TimedOut(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(PipelineError::Failed {
                status: output.status,
                stderr: tail(&stderr, STDERR_TAIL_CHARS),
            });
        }

        Ok(PipelineOutput { stdout, stderr })
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

/// JSON object the pipeline prints on stdout
#[derive(Debug, Deserialize)]
pub struct PipelineReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl PipelineReport {
    /// Path of the generated report when stdout honours the success contract
    pub fn success_output(stdout: &str) -> Option<PathBuf> {
        let report: PipelineReport = serde_json::from_str(stdout.trim()).ok()?;

        if report.status.as_deref() != Some("success") {
            return None;
        }

        report
            .output
            .filter(|output| !output.trim().is_empty())
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    fn spec_for(dir: &Path, script_body: &str, timeout: Duration) -> PipelineSpec {
        let script = dir.join("pipeline.sh");
        std::fs::write(&script, script_body).unwrap();
        PipelineSpec {
            program: PathBuf::from("sh"),
            script: Some(script),
            busco_plot_script: dir.join("plot_BUSCO.py"),
            omark_plot_script: dir.join("plot_OMArk.py"),
            timeout,
        }
    }

    #[test]
    fn test_argument_shape() {
        let dir = tempdir().unwrap();
        let spec = spec_for(dir.path(), "", Duration::from_secs(5));
        let gff = dir.path().join("in.gff");
        let report = dir.path().join("out.pdf");

        let invocation = spec.invocation(&gff, &report, dir.path());

        assert_eq!(invocation.program(), Path::new("sh"));
        assert_eq!(
            invocation.args(),
            &[
                dir.path().join("pipeline.sh"),
                gff,
                dir.path().join("plot_BUSCO.py"),
                dir.path().join("plot_OMArk.py"),
                report,
            ]
        );
    }

    #[test]
    fn test_argument_shape_without_script() {
        let dir = tempdir().unwrap();
        let mut spec = spec_for(dir.path(), "", Duration::from_secs(5));
        spec.script = None;
        spec.program = dir.path().join("pipeline-bin");

        let invocation = spec.invocation(Path::new("/in.gff"), Path::new("/out.pdf"), dir.path());

        assert_eq!(invocation.args().len(), 4);
        assert_eq!(invocation.args()[0], PathBuf::from("/in.gff"));
        assert_eq!(spec.entry_point(), dir.path().join("pipeline-bin"));
    }

    #[test]
    fn test_success_output_contract() {
        assert_eq!(
            PipelineReport::success_output("{\"status\":\"success\",\"output\":\"/tmp/out/report.pdf\"}\n"),
            Some(PathBuf::from("/tmp/out/report.pdf"))
        );
        assert_eq!(PipelineReport::success_output("not json"), None);
        assert_eq!(PipelineReport::success_output("{\"status\":\"error\",\"output\":\"/x\"}"), None);
        assert_eq!(PipelineReport::success_output("{\"status\":\"success\",\"output\":\"\"}"), None);
        assert_eq!(PipelineReport::success_output("{\"status\":\"success\"}"), None);
        assert_eq!(PipelineReport::success_output("[1,2,3]"), None);
        // Progress chatter before the JSON breaks the contract
        assert_eq!(
            PipelineReport::success_output("Building PDF...\n{\"status\":\"success\",\"output\":\"/x\"}"),
            None
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let dir = tempdir().unwrap();
        let spec = spec_for(
            dir.path(),
            "echo \"{\\\"status\\\":\\\"success\\\",\\\"output\\\":\\\"$4\\\"}\"\n",
            Duration::from_secs(10),
        );
        let report = dir.path().join("report.pdf");

        let output = spec
            .invocation(&dir.path().join("in.gff"), &report, dir.path())
            .run()
            .await
            .unwrap();

        assert_eq!(
            PipelineReport::success_output(&output.stdout),
            Some(report)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let dir = tempdir().unwrap();
        let spec = spec_for(dir.path(), "echo 'File not found' >&2\nexit 3\n", Duration::from_secs(10));

        let err = spec
            .invocation(Path::new("/in.gff"), Path::new("/out.pdf"), dir.path())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Failed { .. }));
        let message = err.to_string();
        assert!(message.contains("status 3"));
        assert!(message.contains("File not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempdir().unwrap();
        let spec = spec_for(dir.path(), "sleep 30\n", Duration::from_secs(1));

        let started = Instant::now();
        let err = spec
            .invocation(Path::new("/in.gff"), Path::new("/out.pdf"), dir.path())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_spawn_failure() {
        let dir = tempdir().unwrap();
        let mut spec = spec_for(dir.path(), "", Duration::from_secs(5));
        spec.program = dir.path().join("does-not-exist");

        let err = spec
            .invocation(Path::new("/in.gff"), Path::new("/out.pdf"), dir.path())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Spawn { .. }));
    }
}
