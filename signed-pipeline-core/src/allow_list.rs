//! Unsigned command allow list
//!
//! The first step of a build uploads the signed pipeline, so it cannot carry a
//! signature itself. Exactly that kind of step is let through unsigned: a
//! pipeline upload invocation containing no shell metacharacters. Rejecting
//! metacharacters stops an attacker from hiding a second command inside an
//! otherwise innocent upload, such as a backtick substitution or a `$VAR`
//! expansion in the file argument.

use std::path::Path;

use crate::error::Result;

/// Upload invocation of the stock agent
pub const AGENT_UPLOAD_COMMAND: &str = "buildkite-agent pipeline upload";

/// Quoting, expansion, globbing, redirection and separator characters for
/// POSIX shells
pub const POSIX_SPECIAL_CHARS: &str = "!\"#$&'()*,;<=>?[]\\^`{}|~\n\r";

/// Escape, expansion, redirection and separator characters for `cmd.exe`
pub const BATCH_SPECIAL_CHARS: &str = "^&;,=%|<>\"\n\r";

/// Shell family that will interpret the step command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellPlatform {
    Posix,
    Batch,
}

impl ShellPlatform {
    /// Platform of the running executable
    pub fn current() -> Self {
        if cfg!(windows) {
            ShellPlatform::Batch
        } else {
            ShellPlatform::Posix
        }
    }

    /// Characters that must not appear in an unsigned command
    pub fn special_chars(self) -> &'static str {
        match self {
            ShellPlatform::Posix => POSIX_SPECIAL_CHARS,
            ShellPlatform::Batch => BATCH_SPECIAL_CHARS,
        }
    }
}

/// Decides whether a step without signature or plugins may run
pub trait AllowListPredicate: Send + Sync {
    fn is_unsigned_command_ok(&self, command: &str) -> Result<bool>;
}

/// Allows only pipeline upload commands free of shell metacharacters
#[derive(Debug, Clone)]
pub struct UploadCommandAllowList {
    /// Names this tool may be invoked as
    tool_names: Vec<String>,
    platform: ShellPlatform,
}

impl UploadCommandAllowList {
    /// Creates an allow list for the given tool names
    ///
    /// # Arguments
    /// * `tool_names` - Names `<tool> upload` may be invoked with
    /// * `platform` - Shell family whose metacharacters are rejected
    pub fn new<I, S>(tool_names: I, platform: ShellPlatform) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool_names: tool_names
                .into_iter()
                .map(Into::into)
                .filter(|name| !name.is_empty())
                .collect(),
            platform,
        }
    }

    /// Tool names for an executable invoked as `program`
    ///
    /// The basename of `program`, plus the name without `.exe` on Windows.
    ///
    /// # Example
    /// ```
    /// use signed_pipeline_core::allow_list::{ShellPlatform, UploadCommandAllowList};
    ///
    /// let names = UploadCommandAllowList::tool_names_for(
    ///     "/usr/local/bin/buildkite-signed-pipeline",
    ///     ShellPlatform::Posix,
    /// );
    /// assert_eq!(names, vec!["buildkite-signed-pipeline"]);
    /// ```
    pub fn tool_names_for(program: &str, platform: ShellPlatform) -> Vec<String> {
        let base = Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program)
            .to_string();

        let mut names = vec![base.clone()];
        if platform == ShellPlatform::Batch {
            if let Some(stripped) = base.strip_suffix(".exe") {
                names.push(stripped.to_string());
            }
        }
        names
    }

    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    fn is_upload_command(&self, command: &str) -> bool {
        self.tool_names
            .iter()
            .map(|tool| format!("{} upload", tool))
            .any(|prefix| has_command_prefix(command, &prefix))
            || has_command_prefix(command, AGENT_UPLOAD_COMMAND)
    }

    fn has_special_shell_chars(&self, command: &str) -> bool {
        command.contains(|c: char| self.platform.special_chars().contains(c))
    }
}

impl AllowListPredicate for UploadCommandAllowList {
    fn is_unsigned_command_ok(&self, command: &str) -> Result<bool> {
        if !self.is_upload_command(command) {
            return Ok(false);
        }
        Ok(!self.has_special_shell_chars(command))
    }
}

/// `command` is `prefix` alone or `prefix` followed by arguments
fn has_command_prefix(command: &str, prefix: &str) -> bool {
    match command.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}
