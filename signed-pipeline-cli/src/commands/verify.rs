//! Verify command handler
//!
//! Runs on the agent, typically from a `pre-command` hook, with the job's
//! command, plugins and signature taken from the environment.

use anyhow::{Result, anyhow};
use clap::Args;
use colored::*;
use signed_pipeline_core::{
    STEP_SIGNATURE_ENV, ShellPlatform, SharedSecretDigest, Signature, UploadCommandAllowList,
    Verification, Verifier,
};
use std::sync::Arc;

use crate::config::Config;

/// Arguments for `verify`
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Command the job is about to run
    #[arg(long, env = "BUILDKITE_COMMAND", default_value = "")]
    pub command: String,

    /// Plugin JSON of the job
    #[arg(long, env = "BUILDKITE_PLUGINS", default_value = "")]
    pub plugins: String,

    /// Signature from the step environment
    #[arg(long, env = STEP_SIGNATURE_ENV, default_value = "")]
    pub signature: String,

    /// Build the signature is bound to
    #[arg(long, env = "BUILDKITE_BUILD_ID", default_value = "")]
    pub build_id: String,
}

/// Handle `verify`
///
/// A rejected step is reported and turned into an error so the process exits
/// non-zero and the agent refuses the job.
pub fn handle_verify_command(args: VerifyArgs, config: &Config, secret: &str) -> Result<()> {
    let allow_list = UploadCommandAllowList::new(config.tool_names.clone(), ShellPlatform::current());
    let verifier = Verifier::new(
        Arc::new(SharedSecretDigest::new(secret)),
        Arc::new(allow_list),
    )
    .with_build_scope(config.build_id.as_str());

    match verifier.verify(&args.command, &args.plugins, &Signature::new(args.signature)) {
        Ok(outcome) => {
            println!("{}", describe(outcome).green().bold());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
            Err(anyhow!(e).context("Step verification failed"))
        }
    }
}

fn describe(outcome: Verification) -> &'static str {
    match outcome {
        Verification::NothingToVerify => "✓ Nothing to verify",
        Verification::Allowed => "✓ Unsigned command is allowed",
        Verification::SignedMatch => "✓ Signature matches",
    }
}
