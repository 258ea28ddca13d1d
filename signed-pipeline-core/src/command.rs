//! Step command extraction

use serde_json::Value;

use crate::error::{Result, SignError};
use crate::value::kind_name;

/// Flatten a step's `command`/`commands` value into the string that is signed
///
/// A list of commands is joined with newlines in order, which is how the agent
/// presents it to the job as `BUILDKITE_COMMAND`. `null` counts as no command.
pub fn extract(command: &Value) -> Result<String> {
    match command {
        Value::Null => Ok(String::new()),
        Value::String(command) => Ok(command.clone()),
        Value::Array(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(line) => lines.push(line.as_str()),
                    other => return Err(SignError::UnsupportedCommandType(kind_name(other))),
                }
            }
            Ok(lines.join("\n"))
        }
        other => Err(SignError::UnsupportedCommandType(kind_name(other))),
    }
}
