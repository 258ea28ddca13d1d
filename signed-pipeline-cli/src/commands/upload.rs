//! Upload command handler
//!
//! Evaluates a pipeline with the agent, signs it and uploads the signed copy.

use anyhow::{Context, Result};
use clap::Args;
use signed_pipeline_client::{AgentClient, DEFAULT_AGENT_BINARY, UploadOptions};
use signed_pipeline_core::{SharedSecretDigest, Signer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Arguments for `upload`
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Pipeline file, the agent's default locations are searched when omitted
    pub file: Option<PathBuf>,

    /// Print the signed pipeline instead of uploading it
    #[arg(long)]
    pub dry_run: bool,

    /// Replace the rest of the existing pipeline
    #[arg(long)]
    pub replace: bool,

    /// Agent executable
    #[arg(long, env = "SIGNED_PIPELINE_AGENT_BINARY", default_value = DEFAULT_AGENT_BINARY)]
    pub agent_binary: String,

    /// Build the signatures are bound to
    #[arg(long, env = "BUILDKITE_BUILD_ID", default_value = "")]
    pub build_id: String,
}

impl UploadArgs {
    fn options(&self) -> UploadOptions {
        UploadOptions {
            dry_run: self.dry_run,
            replace: self.replace,
        }
    }
}

/// Handle `upload`
///
/// # Arguments
/// * `args` - Parsed subcommand arguments
/// * `config` - The CLI configuration
/// * `secret` - Resolved shared secret
pub async fn handle_upload_command(args: UploadArgs, config: &Config, secret: &str) -> Result<()> {
    let agent = AgentClient::new(&args.agent_binary);

    let pipeline = agent
        .evaluate_pipeline(args.file.as_deref())
        .await
        .context("Failed to evaluate pipeline")?;

    let signer = Signer::new(Arc::new(SharedSecretDigest::new(secret)))
        .with_build_scope(config.build_id.as_str());
    let signed = signer.sign(&pipeline).context("Failed to sign pipeline")?;

    agent
        .upload_pipeline(&signed, &args.options())
        .await
        .context("Failed to upload pipeline")?;

    info!("Signed pipeline uploaded");
    Ok(())
}
