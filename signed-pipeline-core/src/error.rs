//! Error types for signing and verification

use thiserror::Error;

/// Result type alias for signing and verification
pub type Result<T> = std::result::Result<T, SignError>;

/// Errors raised while signing a pipeline or verifying a step
#[derive(Debug, Error)]
pub enum SignError {
    /// A plugin entry could not be read as `name` or `{name: params}`
    #[error("Malformed plugin reference: {0}")]
    MalformedPluginReference(String),

    /// `command`/`commands` is neither a string nor a list of strings
    #[error("Unsupported type for command: {0}")]
    UnsupportedCommandType(&'static str),

    /// A step is neither a mapping nor a string step such as `wait`
    #[error("Unsupported step type: {0}")]
    UnsupportedStepType(&'static str),

    /// A step's `env` is neither a map nor a list of `KEY=VALUE` strings
    #[error("Unsupported environment type: {0}")]
    UnsupportedEnvironmentType(&'static str),

    /// Plugin JSON received from the agent could not be decoded
    #[error("Invalid plugin JSON: {0}")]
    InvalidPluginJson(#[from] serde_json::Error),

    /// The shared secret could not be used as a digest key
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// Step is unsigned and its command is not permitted to run unsigned
    #[error("Signature missing. The provided command is not permitted to be unsigned")]
    MissingSignature,

    /// Recomputed signature differs from the one attached to the step
    #[error("Signature mismatch. Perhaps check the shared secret is the same across agents?")]
    SignatureMismatch,

    /// Failure while signing a specific step
    #[error("signing {path}: {source}")]
    Step {
        /// Location of the step, e.g. `steps[2].steps[0]`
        path: String,
        /// Underlying failure
        source: Box<SignError>,
    },
}

impl SignError {
    /// Wrap an error with the location of the step that produced it
    pub fn at_step(path: impl Into<String>, source: SignError) -> Self {
        Self::Step {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, with step locations stripped
    pub fn root(&self) -> &SignError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error means the step must not be trusted
    ///
    /// Callers treat a missing and a mismatched signature the same way.
    pub fn is_trust_violation(&self) -> bool {
        matches!(
            self.root(),
            Self::MissingSignature | Self::SignatureMismatch
        )
    }
}
