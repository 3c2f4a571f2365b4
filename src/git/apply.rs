//! Commit application.
//!
//! Shells out to the system `git` binary so the user's hooks, signing config,
//! and editor settings apply exactly as they would for a manual commit.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::ApplyError;

use super::collect::Target;

/// A `git commit` invocation carrying the generated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCommand {
    args: Vec<String>,
}

impl CommitCommand {
    /// Build `git commit -m <message>`, with `--amend` when rewriting HEAD.
    pub fn new(message: &str, amend: bool) -> Result<Self, ApplyError> {
        if message.trim().is_empty() {
            return Err(ApplyError::EmptyMessage);
        }

        let mut args = vec!["commit".to_string(), "-m".to_string(), message.to_string()];
        if amend {
            args.push("--amend".to_string());
        }
        Ok(Self { args })
    }

    /// Build the command that records `message` for `target`.
    ///
    /// Only [`Target::Amend`] rewrites HEAD. A message written for a ref
    /// describes changes that are committed as a new commit.
    pub fn for_target(message: &str, target: &Target) -> Result<Self, ApplyError> {
        Self::new(message, matches!(target, Target::Amend))
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render the command so it can be pasted into a POSIX shell.
    pub fn to_shell_string(&self) -> String {
        let mut out = String::from("git");
        for arg in &self.args {
            out.push(' ');
            out.push_str(&shell_quote(arg));
        }
        out
    }

    /// Run the commit with the terminal attached.
    pub fn run(&self) -> Result<(), ApplyError> {
        debug!("Running: {}", self.to_shell_string());

        let status = Command::new("git")
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(ApplyError::SpawnFailed)?;

        if !status.success() {
            return Err(ApplyError::GitFailed {
                code: status.code(),
            });
        }

        Ok(())
    }
}

/// Quote a single argument for a POSIX shell.
///
/// Arguments made only of safe characters are returned unchanged; anything
/// else is wrapped in single quotes with embedded quotes escaped as `'"'"'`.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
}
