//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod upload;
mod verify;

pub use upload::UploadArgs;
pub use verify::VerifyArgs;

use anyhow::{Context, Result};
use clap::Subcommand;
use signed_pipeline_client::AwsSecretsManager;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Sign a pipeline and upload it with the agent
    Upload(UploadArgs),
    /// Verify the current job against its step signature
    Verify(VerifyArgs),
}

impl Commands {
    /// Build-scope token the command was given
    pub fn build_id(&self) -> &str {
        match self {
            Commands::Upload(args) => &args.build_id,
            Commands::Verify(args) => &args.build_id,
        }
    }
}

/// Handle a CLI command
///
/// Resolves the shared secret, then routes the command to its handler.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let secret = config
        .secret_source
        .resolve(&AwsSecretsManager::new())
        .await
        .context("Failed to resolve shared secret")?;

    match command {
        Commands::Upload(args) => upload::handle_upload_command(args, config, &secret).await,
        Commands::Verify(args) => verify::handle_verify_command(args, config, &secret),
    }
}
