//! Pipeline signer
//!
//! Walks a decoded pipeline (the JSON the agent prints for
//! `pipeline upload --dry-run`) and returns a copy in which every step that
//! runs a command or plugins carries a `STEP_SIGNATURE` in its `env`.
//!
//! Walking rules:
//! - Only an object document is signed, anything else is returned as is
//! - Of the top-level keys only `steps` is rewritten, all others are copied
//! - String steps (`wait`, `block`) pass through untouched, any other
//!   non-object step fails the pass
//! - Group steps have their nested `steps` signed the same way
//! - Steps with neither command nor plugins are left exactly as they were
//!
//! Any failure aborts the whole pass; a partially signed pipeline is never
//! returned.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::extract;
use crate::digest::{DigestFunction, Signature, SigningInput};
use crate::error::{Result, SignError};
use crate::plugin::canonicalize;
use crate::value::kind_name;

/// Environment variable that carries a step's signature
pub const STEP_SIGNATURE_ENV: &str = "STEP_SIGNATURE";

/// Signs the steps of a pipeline
pub struct Signer {
    digest: Arc<dyn DigestFunction>,
    build_scope: String,
}

impl Signer {
    pub fn new(digest: Arc<dyn DigestFunction>) -> Self {
        Self {
            digest,
            build_scope: String::new(),
        }
    }

    /// Bind signatures to a build, see [`SigningInput::build_scope`]
    pub fn with_build_scope(mut self, build_scope: impl Into<String>) -> Self {
        self.build_scope = build_scope.into();
        self
    }

    /// Sign a pipeline document
    ///
    /// The input is not modified; a signed copy is returned.
    ///
    /// # Errors
    /// Fails on the first step whose plugins, command or env cannot be read.
    /// The error names the step, e.g. `signing steps[3].steps[0]: ...`.
    pub fn sign(&self, pipeline: &Value) -> Result<Value> {
        let signed = self.sign_document(pipeline, "")?;
        info!("Pipeline signed");
        Ok(signed)
    }

    fn sign_document(&self, document: &Value, path: &str) -> Result<Value> {
        let Value::Object(fields) = document else {
            return Ok(document.clone());
        };

        let mut signed = Map::new();
        for (key, item) in fields {
            let item = if key.eq_ignore_ascii_case("steps") {
                self.sign_steps(item, &join_path(path, key))?
            } else {
                item.clone()
            };
            signed.insert(key.clone(), item);
        }

        Ok(Value::Object(signed))
    }

    /// Sign every object in a `steps` list
    ///
    /// A `steps` value that is not a list is kept as it is. Inside a list only
    /// objects and string steps are accepted.
    fn sign_steps(&self, steps: &Value, path: &str) -> Result<Value> {
        let Value::Array(steps) = steps else {
            return Ok(steps.clone());
        };

        let mut signed = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let step_path = format!("{}[{}]", path, index);
            let step = match step {
                Value::Object(fields) => self.sign_step(fields, &step_path).map_err(|e| match e {
                    SignError::Step { .. } => e,
                    other => SignError::at_step(step_path, other),
                })?,
                // `wait`, `block` and friends
                Value::String(_) => step.clone(),
                other => {
                    return Err(SignError::at_step(
                        step_path,
                        SignError::UnsupportedStepType(kind_name(other)),
                    ));
                }
            };
            signed.push(step);
        }

        Ok(Value::Array(signed))
    }

    fn sign_step(&self, step: &Map<String, Value>, path: &str) -> Result<Value> {
        let mut signed = step.clone();

        if step.contains_key("group") {
            if let Some(steps) = step.get("steps") {
                let nested = self.sign_steps(steps, &join_path(path, "steps"))?;
                signed.insert("steps".to_string(), nested);
            }
            return Ok(Value::Object(signed));
        }

        // `commands` is an alias of `command`, a null `command` counts as unset
        let raw_command = step
            .get("command")
            .filter(|command| !command.is_null())
            .or_else(|| step.get("commands"))
            .unwrap_or(&Value::Null);

        let plugins = match step.get("plugins") {
            None | Some(Value::Null) => String::new(),
            Some(plugins) => {
                let canonical = canonicalize(plugins)?;
                debug!("Signing canonicalised plugins {}", canonical);
                canonical
            }
        };

        let command = extract(raw_command)?;

        if command.is_empty() && plugins.is_empty() {
            debug!("Nothing to sign at {}", path);
            return Ok(Value::Object(signed));
        }

        let signature = self.digest.compute(&SigningInput {
            command: &command,
            plugins: &plugins,
            build_scope: &self.build_scope,
        })?;
        debug!("Signed {}", path);

        let env = add_signature(step.get("env"), &signature)?;
        signed.insert("env".to_string(), env);

        Ok(Value::Object(signed))
    }
}

/// Return a step env with the signature added
///
/// Map envs gain (or overwrite) the `STEP_SIGNATURE` key, list envs gain a
/// trailing `STEP_SIGNATURE=<sig>` entry.
fn add_signature(env: Option<&Value>, signature: &Signature) -> Result<Value> {
    match env {
        None | Some(Value::Null) => {
            let mut vars = Map::new();
            vars.insert(
                STEP_SIGNATURE_ENV.to_string(),
                Value::String(signature.to_string()),
            );
            Ok(Value::Object(vars))
        }
        Some(Value::Object(vars)) => {
            let mut vars = vars.clone();
            vars.insert(
                STEP_SIGNATURE_ENV.to_string(),
                Value::String(signature.to_string()),
            );
            Ok(Value::Object(vars))
        }
        Some(Value::Array(vars)) => {
            let mut vars = vars.clone();
            vars.push(Value::String(format!(
                "{}={}",
                STEP_SIGNATURE_ENV, signature
            )));
            Ok(Value::Array(vars))
        }
        Some(other) => Err(SignError::UnsupportedEnvironmentType(kind_name(other))),
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
