//! Pipeline upload through the agent

use crate::AgentClient;
use crate::error::{ClientError, Result};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

/// Flags forwarded to the final `pipeline upload`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Only print the pipeline that would be uploaded
    pub dry_run: bool,
    /// Replace the rest of the existing pipeline with the uploaded steps
    pub replace: bool,
}

impl AgentClient {
    // =============================================================================
    // Pipeline Upload
    // =============================================================================

    /// Arguments for the dry run that evaluates a pipeline file
    pub fn dry_run_args(file: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "pipeline".to_string(),
            "upload".to_string(),
            "--dry-run".to_string(),
        ];
        if let Some(file) = file {
            args.push(file.to_string_lossy().into_owned());
        }
        args
    }

    /// Arguments for uploading a signed pipeline from stdin
    ///
    /// Interpolation is disabled because the dry run already expanded
    /// variables once.
    pub fn upload_args(options: &UploadOptions) -> Vec<String> {
        let mut args = vec![
            "pipeline".to_string(),
            "upload".to_string(),
            "--no-interpolation".to_string(),
        ];
        if options.dry_run {
            args.push("--dry-run".to_string());
        }
        if options.replace {
            args.push("--replace".to_string());
        }
        args
    }

    /// Evaluate a pipeline with the agent and return it as JSON
    ///
    /// Runs `pipeline upload --dry-run [file]`. Without a file the agent reads
    /// the pipeline from this process's stdin or its default locations.
    ///
    /// # Errors
    /// Fails if the agent cannot be started, exits non-zero, or prints
    /// something that is not JSON.
    pub async fn evaluate_pipeline(&self, file: Option<&Path>) -> Result<Value> {
        let args = Self::dry_run_args(file);
        info!("$ {} {}", self.program(), args.join(" "));

        let output = Command::new(self.program())
            .args(&args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdout(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stdout = self.handle_output(output)?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    /// Upload a pipeline by piping its JSON to `pipeline upload`
    pub async fn upload_pipeline(&self, pipeline: &Value, options: &UploadOptions) -> Result<()> {
        let body = serde_json::to_vec(pipeline)?;
        let args = Self::upload_args(options);
        info!("$ {} {}", self.program(), args.join(" "));

        let mut child = Command::new(self.program())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // stdin is closed at the end of the match so the agent sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&body).await,
            None => Ok(()),
        };

        // an agent that exits early breaks the pipe, its status is the real error
        let status = child.wait().await?;
        if !status.success() {
            return Err(ClientError::AgentFailed {
                program: self.program().to_string(),
                status,
            });
        }

        written?;
        Ok(())
    }
}
