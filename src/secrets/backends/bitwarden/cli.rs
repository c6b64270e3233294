//! Bitwarden CLI invocation
//!
//! Every interaction with `bw` goes through [`CliRunner`], so tests can
//! script the CLI without spawning processes.

use crate::errors::{CredentialError, Result};
use crate::secrets::backends::BackendKind;
use crate::secrets::types::SecretString;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// One `bw` invocation.
///
/// Secret material is only ever passed through `env`, which is applied to the
/// child process alone and redacted from debug output.
#[derive(Debug, Clone, Default)]
pub struct CliCommand {
    pub args: Vec<String>,
    pub env: Vec<(String, SecretString)>,
}

impl CliCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { args: args.into_iter().map(Into::into).collect(), env: Vec::new() }
    }

    pub fn with_env(mut self, name: &str, value: SecretString) -> Self {
        self.env.push((name.to_string(), value));
        self
    }

    /// First argument, e.g. `status` or `get`
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// Value of an environment entry, for assertions in fakes
    pub fn env_value(&self, name: &str) -> Option<&SecretString> {
        self.env.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }
}

/// Captured result of a finished invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { success: true, stdout: stdout.into(), stderr: String::new() }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self { success: false, stdout: String::new(), stderr: stderr.into() }
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty
    pub fn diagnostic(&self) -> &str {
        match self.stderr.trim() {
            "" => self.stdout.trim(),
            stderr => stderr,
        }
    }
}

/// Executes `bw` commands
#[async_trait]
pub trait CliRunner: Send + Sync + std::fmt::Debug {
    async fn run(&self, command: &CliCommand) -> Result<CliOutput>;
}

/// Runs the real `bw` binary as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl AsRef<Path>, timeout: Duration) -> Self {
        Self { program: program.as_ref().to_path_buf(), timeout }
    }
}

#[async_trait]
impl CliRunner for ProcessRunner {
    async fn run(&self, command: &CliCommand) -> Result<CliOutput> {
        let operation = format!("bw {}", command.subcommand());
        debug!(operation = %operation, "Running Bitwarden CLI");

        let mut cmd = Command::new(&self.program);
        cmd
            .args(&command.args)
            .env("BW_NOINTERACTION", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in &command.env {
            cmd.env(name, value.expose_secret());
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CredentialError::timeout(operation.clone(), self.timeout))?
            .map_err(|e| {
                CredentialError::transient(
                    BackendKind::PasswordManagerCli,
                    format!("Failed to run {}: {}", self.program.display(), e),
                )
            })?;

        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_debug_redacts_env() {
        let command = CliCommand::new(["unlock", "--passwordenv", "BW_PW", "--raw"])
            .with_env("BW_PW", SecretString::new("hunter2"));

        let debug = format!("{:?}", command);
        assert!(!debug.contains("hunter2"));
        assert_eq!(command.subcommand(), "unlock");
        assert_eq!(command.env_value("BW_PW").unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        assert_eq!(CliOutput::failed("Not found.\n").diagnostic(), "Not found.");
        let output = CliOutput { success: false, stdout: " oops ".into(), stderr: "".into() };
        assert_eq!(output.diagnostic(), "oops");
    }

    #[tokio::test]
    async fn test_missing_binary_is_transient() {
        let runner = ProcessRunner::new("/nonexistent/bw", Duration::from_secs(5));
        let err = runner.run(&CliCommand::new(["status"])).await.unwrap_err();
        assert!(matches!(err, CredentialError::Transient { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_child_hits_deadline() {
        let runner = ProcessRunner::new("sleep", Duration::from_millis(100));
        let err = runner.run(&CliCommand::new(["5"])).await.unwrap_err();
        assert!(matches!(err, CredentialError::Timeout { duration_ms: 100, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_reaches_child_only() {
        let runner = ProcessRunner::new("sh", Duration::from_secs(5));
        let command = CliCommand::new(["-c", "printf %s \"$ENIGMA_TEST_VALUE\""])
            .with_env("ENIGMA_TEST_VALUE", SecretString::new("child-only"));

        let output = runner.run(&command).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "child-only");
        assert!(std::env::var("ENIGMA_TEST_VALUE").is_err());
    }
}
