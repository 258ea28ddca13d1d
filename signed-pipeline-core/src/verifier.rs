//! Step verification
//!
//! Runs on the agent before a job's command. The agent provides the effective
//! command, the plugin JSON and whatever `STEP_SIGNATURE` arrived in the
//! step's environment; nothing else about the original pipeline is known here.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::allow_list::AllowListPredicate;
use crate::digest::{DigestFunction, Signature, SigningInput};
use crate::error::{Result, SignError};
use crate::plugin::canonicalize_json;

/// Outcome of a successful verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// No command and no plugins, nothing to check
    NothingToVerify,
    /// Unsigned, but the command is on the allow list
    Allowed,
    /// Signature recomputed and matched
    SignedMatch,
}

/// Checks a step against its signature
pub struct Verifier {
    digest: Arc<dyn DigestFunction>,
    allow_list: Arc<dyn AllowListPredicate>,
    build_scope: String,
}

impl Verifier {
    pub fn new(digest: Arc<dyn DigestFunction>, allow_list: Arc<dyn AllowListPredicate>) -> Self {
        Self {
            digest,
            allow_list,
            build_scope: String::new(),
        }
    }

    /// Bind verification to a build, must match the signing side
    pub fn with_build_scope(mut self, build_scope: impl Into<String>) -> Self {
        self.build_scope = build_scope.into();
        self
    }

    /// Verify a step
    ///
    /// # Arguments
    /// * `command` - Effective command of the job, may be empty
    /// * `plugin_json` - Plugin list as exposed by the agent, may be empty
    /// * `signature` - Signature found in the step environment, may be empty
    ///
    /// # Errors
    /// `MissingSignature` for an unsigned step that is not allow-listed,
    /// `SignatureMismatch` when the recomputed signature differs, and plugin
    /// decoding errors as they occur.
    pub fn verify(
        &self,
        command: &str,
        plugin_json: &str,
        signature: &Signature,
    ) -> Result<Verification> {
        if command.is_empty() && plugin_json.is_empty() {
            info!("No command or plugins set");
            return Ok(Verification::NothingToVerify);
        }

        // a step with plugins is never exempt, whatever its command
        if signature.is_empty() && plugin_json.is_empty() {
            warn!("Command is unsigned, checking if it's allow-listed");
            return match self.allow_list.is_unsigned_command_ok(command) {
                Ok(true) => {
                    info!("Allowing unsigned command");
                    Ok(Verification::Allowed)
                }
                Ok(false) => Err(SignError::MissingSignature),
                Err(e) => {
                    warn!("Unsigned command check failed: {}", e);
                    Err(SignError::MissingSignature)
                }
            };
        }

        let plugins = canonicalize_json(plugin_json)?;
        debug!("Verifying canonicalised plugins {}", plugins);

        let expected = self.digest.compute(&SigningInput {
            command,
            plugins: &plugins,
            build_scope: &self.build_scope,
        })?;

        if !expected.matches(signature) {
            return Err(SignError::SignatureMismatch);
        }

        info!("Signature matched");
        Ok(Verification::SignedMatch)
    }
}
