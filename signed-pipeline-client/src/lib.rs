//! Signed Pipeline Client
//!
//! Collaborators that live outside the signing engine:
//! - [`AgentClient`] runs `buildkite-agent pipeline upload`, once as a dry run
//!   to obtain the evaluated pipeline as JSON and once to upload the signed copy
//! - [`secrets`] resolves the shared secret, either given directly or fetched
//!   from AWS Secrets Manager
//!
//! # Example
//!
//! ```no_run
//! use signed_pipeline_client::{AgentClient, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() -> signed_pipeline_client::Result<()> {
//!     let agent = AgentClient::default();
//!
//!     let pipeline = agent.evaluate_pipeline(None).await?;
//!     agent.upload_pipeline(&pipeline, &UploadOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;
pub mod secrets;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use pipelines::UploadOptions;
pub use secrets::{AwsSecretsManager, SecretSource, SecretStore};

use std::process::Output;

/// Executable used when none is configured
pub const DEFAULT_AGENT_BINARY: &str = "buildkite-agent";

/// Runs the Buildkite agent as a child process
#[derive(Debug, Clone)]
pub struct AgentClient {
    /// Agent executable, looked up on `PATH` when not absolute
    program: String,
}

impl AgentClient {
    /// Create a client for the given agent executable
    ///
    /// # Example
    /// ```
    /// use signed_pipeline_client::AgentClient;
    ///
    /// let agent = AgentClient::new("/usr/local/bin/buildkite-agent");
    /// assert_eq!(agent.program(), "/usr/local/bin/buildkite-agent");
    /// ```
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Get the agent executable
    pub fn program(&self) -> &str {
        &self.program
    }

    // =============================================================================
    // Output Handlers
    // =============================================================================

    /// Check a finished agent process and return its stdout
    fn handle_output(&self, output: Output) -> Result<Vec<u8>> {
        if !output.status.success() {
            return Err(ClientError::AgentFailed {
                program: self.program.clone(),
                status: output.status,
            });
        }

        Ok(output.stdout)
    }

    fn spawn_error(&self, source: std::io::Error) -> ClientError {
        ClientError::SpawnFailed {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for AgentClient {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_BINARY)
    }
}
