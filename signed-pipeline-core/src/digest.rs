//! Keyed step digest
//!
//! The same computation is used to produce a signature at upload time and to
//! recompute it on the agent; verification is compute-then-compare.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Result, SignError};

type HmacSha256 = Hmac<Sha256>;

/// Algorithm tag prefixed to every signature
pub const SIGNATURE_ALGORITHM: &str = "sha256";

/// A step signature, e.g. `sha256:9f86d0...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare two signatures in constant time
    pub fn matches(&self, other: &Signature) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Everything that goes into a step signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningInput<'a> {
    /// Newline-joined command text
    pub command: &'a str,
    /// Canonical plugin JSON, empty when the step has no plugins
    pub plugins: &'a str,
    /// Per-build token binding the signature to one build, may be empty
    pub build_scope: &'a str,
}

/// Computes a signature from signing input
///
/// Injected into [`crate::Signer`] and [`crate::Verifier`] so tests can observe
/// exactly what would be signed.
pub trait DigestFunction: Send + Sync {
    fn compute(&self, input: &SigningInput<'_>) -> Result<Signature>;
}

/// HMAC-SHA256 keyed with the shared secret
///
/// Hashes, in order, the trimmed command, the build scope and the canonical
/// plugin JSON.
pub struct SharedSecretDigest {
    secret: Vec<u8>,
}

impl SharedSecretDigest {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }
}

impl std::fmt::Debug for SharedSecretDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretDigest")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl DigestFunction for SharedSecretDigest {
    fn compute(&self, input: &SigningInput<'_>) -> Result<Signature> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;
        mac.update(input.command.trim().as_bytes());
        mac.update(input.build_scope.as_bytes());
        mac.update(input.plugins.as_bytes());

        let digest = mac.finalize().into_bytes();
        Ok(Signature(format!(
            "{}:{}",
            SIGNATURE_ALGORITHM,
            hex::encode(digest)
        )))
    }
}
