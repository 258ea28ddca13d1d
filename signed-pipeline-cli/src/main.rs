//! Buildkite Signed Pipeline
//!
//! Signs pipeline steps before upload and verifies them on the agent before
//! they run.
//!
//! - `upload`: evaluate a pipeline with the agent, sign every step, upload it
//! - `verify`: check the current job's command and plugins against its
//!   `STEP_SIGNATURE`, exiting non-zero on a mismatch

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use signed_pipeline_client::ClientError;
use signed_pipeline_core::{ShellPlatform, UploadCommandAllowList};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "buildkite-signed-pipeline", version)]
#[command(about = "Sign and verify Buildkite pipeline steps", long_about = None)]
struct Cli {
    /// Shared secret used to sign and verify steps
    #[arg(long, env = "SIGNED_PIPELINE_SECRET", global = true, hide_env_values = true)]
    shared_secret: Option<String>,

    /// AWS Secrets Manager name or ARN holding the shared secret
    #[arg(long, env = "SIGNED_PIPELINE_AWS_SM_SECRET_ID", global = true)]
    aws_sm_shared_secret_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for the agent
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "buildkite_signed_pipeline=info,signed_pipeline_core=info,signed_pipeline_client=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let program = std::env::args()
        .next()
        .context("Missing program name in arguments")?;
    let tool_names = UploadCommandAllowList::tool_names_for(&program, ShellPlatform::current());

    let config = Config::from_flags(
        cli.shared_secret,
        cli.aws_sm_shared_secret_id,
        cli.command.build_id().to_string(),
        tool_names,
    )?;

    if let Err(e) = handle_command(cli.command, &config).await {
        // exit with the agent's own status
        if let Some(code) = e.downcast_ref::<ClientError>().and_then(ClientError::exit_code) {
            eprintln!("Error: {:#}", e);
            std::process::exit(code);
        }
        return Err(e);
    }

    Ok(())
}
