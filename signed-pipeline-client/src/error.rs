//! Error types for the signed pipeline client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the agent or the secret store
#[derive(Debug, Error)]
pub enum ClientError {
    /// The agent process could not be started
    #[error("Failed to run {program}: {source}")]
    SpawnFailed {
        /// Program that was executed
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The agent process exited unsuccessfully
    #[error("{program} exited with {status}")]
    AgentFailed {
        /// Program that was executed
        program: String,
        /// Exit status as reported by the OS
        status: std::process::ExitStatus,
    },

    /// I/O with a running agent process failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The agent printed something that is not a JSON pipeline
    #[error("Failed to parse pipeline JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The secret store rejected the request
    #[error("Secret store error for {secret_id}: {message}")]
    SecretStore {
        /// Identifier that was looked up
        secret_id: String,
        /// Error reported by the store
        message: String,
    },

    /// The secret exists but has no string value
    #[error("Secret {0} has no string value")]
    SecretNotFound(String),
}

impl ClientError {
    /// Check if this error came from the agent process
    pub fn is_agent_error(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. } | Self::AgentFailed { .. })
    }

    /// Check if this error came from secret retrieval
    pub fn is_secret_error(&self) -> bool {
        matches!(self, Self::SecretStore { .. } | Self::SecretNotFound(_))
    }

    /// Exit code of a failed agent, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::AgentFailed { status, .. } => status.code(),
            _ => None,
        }
    }
}
