//! Signed Pipeline Core
//!
//! Signing and verification engine for Buildkite pipeline steps.
//!
//! This crate contains:
//! - Signer: walks a decoded pipeline and attaches a `STEP_SIGNATURE` to every
//!   command or plugin step, including steps nested in groups
//! - Verifier: recomputes a step's signature on the agent and decides whether
//!   the step may run
//! - Plugin canonicalisation, command extraction and the keyed digest shared by
//!   both sides
//!
//! Nothing in here reads process arguments or the environment; callers pass
//! the tool name, build identifier and secret in explicitly.

pub mod allow_list;
pub mod command;
pub mod digest;
pub mod error;
pub mod plugin;
pub mod signer;
pub mod value;
pub mod verifier;

pub use allow_list::{AllowListPredicate, ShellPlatform, UploadCommandAllowList};
pub use digest::{DigestFunction, SharedSecretDigest, Signature, SigningInput};
pub use error::{Result, SignError};
pub use plugin::{PluginReference, canonicalize, canonicalize_json, resolve};
pub use signer::{STEP_SIGNATURE_ENV, Signer};
pub use verifier::{Verification, Verifier};
