//! Bitwarden session lifecycle
//!
//! The `bw` CLI keeps its own login state on disk. Before every fetch the
//! state reported by `bw status` is reconciled with the session held here:
//! log in when nobody is logged in, log out and in again when another
//! account is, unlock a locked vault, and reuse the token otherwise. Vault
//! sync runs at most once per interval.

use super::cli::{CliCommand, CliOutput, CliRunner};
use crate::errors::{CredentialError, Result};
use crate::secrets::backends::BackendKind;
use crate::secrets::types::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Environment variable carrying the master password to the child process
pub const PASSWORD_ENV: &str = "ENIGMA_BW_PASSPHRASE";

/// Environment variable carrying the session token to the child process
pub const SESSION_ENV: &str = "BW_SESSION";

const BACKEND: BackendKind = BackendKind::PasswordManagerCli;

/// Lock state reported by `bw status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
    /// No account is logged in
    Absent,
}

/// Parsed output of `bw status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
    pub status: String,
    #[serde(rename = "sessionKey")]
    pub session_key: Option<SecretString>,
}

impl StatusReport {
    pub fn parse(stdout: &str) -> Result<Self> {
        serde_json::from_str(stdout.trim()).map_err(|e| {
            CredentialError::invalid_response(
                BACKEND,
                format!("Unreadable `bw status` output: {}", e),
            )
        })
    }

    pub fn lock_state(&self) -> LockState {
        match self.status.as_str() {
            "unlocked" => LockState::Unlocked,
            "locked" => LockState::Locked,
            _ => LockState::Absent,
        }
    }

    fn is_identity(&self, email: &str) -> bool {
        self.user_email.as_deref().is_some_and(|user| user.eq_ignore_ascii_case(email))
    }

    fn reported_token(&self) -> Option<&SecretString> {
        self.session_key.as_ref().filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: SecretString,
    identity: String,
    last_sync: Option<Instant>,
}

/// Holds the Bitwarden session of one backend instance
#[derive(Debug)]
pub struct SessionCache {
    runner: Arc<dyn CliRunner>,
    email: String,
    master_password: SecretString,
    sync_interval: Duration,
    state: Mutex<Option<Session>>,
}

impl SessionCache {
    pub fn new(
        runner: Arc<dyn CliRunner>,
        email: impl Into<String>,
        master_password: SecretString,
        sync_interval: Duration,
    ) -> Self {
        Self {
            runner,
            email: email.into(),
            master_password,
            sync_interval,
            state: Mutex::new(None),
        }
    }

    pub fn runner(&self) -> &Arc<dyn CliRunner> {
        &self.runner
    }

    /// Return a valid session token, logging in or unlocking as needed.
    ///
    /// Every failure here is an authentication failure.
    pub async fn ensure(&self) -> Result<SecretString> {
        let mut guard = self.state.lock().await;
        let held = guard.as_ref().filter(|s| s.identity.eq_ignore_ascii_case(&self.email));

        // `bw status` only reports "unlocked" for a caller presenting a live session key
        let status = self
            .status(held.map(|s| &s.token))
            .await
            .map_err(|e| e.into_authentication(BACKEND))?;

        let reuse = match (status.lock_state(), held) {
            (LockState::Unlocked, Some(session)) if status.is_identity(&self.email) => status
                .reported_token()
                .map_or(true, |reported| reported == &session.token),
            _ => false,
        };

        if !reuse {
            let token = self.establish(&status).await?;
            // keep the sync stamp when the vault merely re-locked
            let last_sync = held.filter(|s| s.token == token).and_then(|s| s.last_sync);
            *guard = Some(Session { token, identity: self.email.clone(), last_sync });
        } else {
            debug!(email = %self.email, "Reusing Bitwarden session");
        }

        let Some(session) = guard.as_mut() else {
            return Err(CredentialError::authentication(BACKEND, "No Bitwarden session"));
        };

        let due = session.last_sync.map_or(true, |at| at.elapsed() >= self.sync_interval);
        if due {
            session.last_sync = Some(Instant::now());
            self.sync(&session.token).await;
        }

        Ok(session.token.clone())
    }

    async fn establish(&self, status: &StatusReport) -> Result<SecretString> {
        match status.lock_state() {
            LockState::Absent => self.login().await,
            _ if !status.is_identity(&self.email) => {
                info!(
                    current = %status.user_email.as_deref().unwrap_or("unknown"),
                    email = %self.email,
                    "Bitwarden CLI logged in as another account, switching"
                );
                self.cli_logout().await?;
                self.login().await
            }
            LockState::Locked => self.unlock().await,
            LockState::Unlocked => match status.reported_token() {
                Some(token) => {
                    debug!(email = %self.email, "Adopting session reported by Bitwarden CLI");
                    Ok(token.clone())
                }
                None => self.unlock().await,
            },
        }
    }

    async fn run(&self, command: CliCommand) -> Result<CliOutput> {
        self.runner.run(&command).await
    }

    async fn status(&self, session: Option<&SecretString>) -> Result<StatusReport> {
        let mut command = CliCommand::new(["status"]);
        if let Some(token) = session {
            command = command.with_env(SESSION_ENV, token.clone());
        }
        let output = self.run(command).await?;
        if !output.success {
            return Err(CredentialError::transient(
                BACKEND,
                format!("`bw status` failed: {}", output.diagnostic()),
            ));
        }
        StatusReport::parse(&output.stdout)
    }

    fn token_from(output: CliOutput, step: &str) -> Result<SecretString> {
        if !output.success {
            return Err(CredentialError::authentication(
                BACKEND,
                format!("{} failed: {}", step, output.diagnostic()),
            ));
        }
        match output.stdout.trim() {
            "" => Err(CredentialError::authentication(
                BACKEND,
                format!("{} returned no session key", step),
            )),
            token => Ok(SecretString::new(token)),
        }
    }

    async fn login(&self) -> Result<SecretString> {
        info!(email = %self.email, "Logging in to Bitwarden");
        let args = ["login", self.email.as_str(), "--passwordenv", PASSWORD_ENV, "--raw"];
        let command = CliCommand::new(args).with_env(PASSWORD_ENV, self.master_password.clone());
        let output = self.run(command).await.map_err(|e| e.into_authentication(BACKEND))?;
        Self::token_from(output, "bw login")
    }

    async fn unlock(&self) -> Result<SecretString> {
        info!(email = %self.email, "Unlocking Bitwarden vault");
        let command = CliCommand::new(["unlock", "--passwordenv", PASSWORD_ENV, "--raw"])
            .with_env(PASSWORD_ENV, self.master_password.clone());
        let output = self.run(command).await.map_err(|e| e.into_authentication(BACKEND))?;
        Self::token_from(output, "bw unlock")
    }

    async fn sync(&self, token: &SecretString) {
        debug!("Syncing Bitwarden vault");
        let command = CliCommand::new(["sync"]).with_env(SESSION_ENV, token.clone());
        match self.run(command).await {
            Ok(output) if output.success => info!("Bitwarden vault synced"),
            Ok(output) => warn!(error = %output.diagnostic(), "Bitwarden sync failed"),
            Err(e) => warn!(error = %e, "Bitwarden sync failed"),
        }
    }

    /// Log the CLI out and forget the session.
    pub async fn logout(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        let result = self.cli_logout().await;
        *guard = None;
        result
    }

    async fn cli_logout(&self) -> Result<()> {
        let output = self
            .run(CliCommand::new(["logout"]))
            .await
            .map_err(|e| e.into_authentication(BACKEND))?;

        if output.success || output.diagnostic().to_lowercase().contains("not logged in") {
            debug!("Bitwarden CLI logged out");
            Ok(())
        } else {
            Err(CredentialError::authentication(
                BACKEND,
                format!("bw logout failed: {}", output.diagnostic()),
            ))
        }
    }

    /// Forget the in-memory session so the next call re-validates from scratch.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    pub async fn has_session(&self) -> bool {
        self.state.lock().await.is_some()
    }
}
