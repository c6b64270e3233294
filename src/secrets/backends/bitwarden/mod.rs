//! Bitwarden backend driven through the `bw` CLI
//!
//! Items are read with `bw get item <service>`. The login pair, an allow-list
//! of custom fields and the notes are normalized; every other custom field is
//! ignored.

mod cli;
mod session;

pub use cli::{CliCommand, CliOutput, CliRunner, ProcessRunner};
pub use session::{LockState, SessionCache, StatusReport, PASSWORD_ENV, SESSION_ENV};

use super::backend::{BackendKind, PasswordManagerParams, SecretSource};
use crate::errors::{CredentialError, Result};
use crate::secrets::types::NormalizedSecret;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Custom field names that are treated as credentials
pub const CUSTOM_FIELD_ALLOW_LIST: [&str; 7] =
    ["api_key", "api_token", "api_username", "ssh_key", "bot_name", "bot_token", "app_key"];

const BACKEND: BackendKind = BackendKind::PasswordManagerCli;

#[derive(Debug, Default, Deserialize)]
struct LoginSection {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomField {
    name: Option<String>,
    value: Option<String>,
}

/// Subset of a `bw get item` document
#[derive(Debug, Default, Deserialize)]
pub struct BitwardenItem {
    #[serde(default)]
    login: Option<LoginSection>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    fields: Option<Vec<CustomField>>,
}

impl BitwardenItem {
    pub fn parse(stdout: &str) -> Result<Self> {
        serde_json::from_str(stdout.trim()).map_err(|e| {
            CredentialError::invalid_response(
                BACKEND,
                format!("Unreadable `bw get item` output: {}", e),
            )
        })
    }

    /// Flatten into the allow-listed fields plus notes.
    pub fn normalize(self, service: &str) -> NormalizedSecret {
        let mut secret = NormalizedSecret::new(service);

        if let Some(login) = self.login {
            if let Some(username) = login.username {
                secret.insert("username", username);
            }
            if let Some(password) = login.password {
                secret.insert("password", password);
            }
        }

        for field in self.fields.unwrap_or_default() {
            let (Some(name), Some(value)) = (field.name, field.value) else {
                continue;
            };
            if CUSTOM_FIELD_ALLOW_LIST.iter().any(|allowed| allowed.eq_ignore_ascii_case(&name)) {
                secret.insert(&name, value);
            } else {
                debug!(
                    service = %service,
                    field = %name,
                    "Ignoring custom field outside allow-list"
                );
            }
        }

        if let Some(notes) = self.notes {
            secret.set_notes(notes);
        }
        secret
    }
}

/// Map a failed `bw get item` onto the error taxonomy.
fn fetch_error(service: &str, diagnostic: &str) -> CredentialError {
    let lowered = diagnostic.to_lowercase();
    if lowered.starts_with("not found") {
        CredentialError::not_found(service)
    } else if lowered.contains("more than one result") {
        CredentialError::not_found(format!("{} (ambiguous name)", service))
    } else {
        CredentialError::transient(BACKEND, format!("bw get item failed: {}", diagnostic))
    }
}

fn is_session_lost(diagnostic: &str) -> bool {
    let lowered = diagnostic.to_lowercase();
    lowered.contains("not logged in") || lowered.contains("vault is locked")
}

/// Bitwarden secret source
#[derive(Debug)]
pub struct PasswordManagerCliSource {
    session: SessionCache,
}

impl PasswordManagerCliSource {
    /// Validate the parameters and establish the session eagerly.
    pub async fn connect(
        params: &PasswordManagerParams,
        runner: Arc<dyn CliRunner>,
        sync_interval: Duration,
    ) -> Result<Self> {
        if params.email.trim().is_empty() {
            return Err(CredentialError::configuration("Bitwarden email must not be empty"));
        }
        if params.master_password.is_empty() {
            return Err(CredentialError::configuration(
                "Bitwarden master password must not be empty",
            ));
        }

        let session = SessionCache::new(
            runner,
            params.email.trim(),
            params.master_password.clone(),
            sync_interval,
        );
        session.ensure().await?;

        info!(email = %params.email, "Initialized Bitwarden backend");
        Ok(Self { session })
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }
}

#[async_trait]
impl SecretSource for PasswordManagerCliSource {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    async fn fetch(&self, service: &str) -> Result<NormalizedSecret> {
        let token = self.session.ensure().await?;
        debug!(service = %service, "Fetching item from Bitwarden");

        let command = CliCommand::new(["get", "item", service]).with_env(SESSION_ENV, token);
        let output = self.session.runner().run(&command).await?;

        if !output.success {
            let diagnostic = output.diagnostic();
            if is_session_lost(diagnostic) {
                warn!(service = %service, "Bitwarden session lost during fetch");
                self.session.invalidate().await;
            }
            return Err(fetch_error(service, diagnostic));
        }

        Ok(BitwardenItem::parse(&output.stdout)?.normalize(service))
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Logging out of Bitwarden");
        self.session.logout().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const GITHUB_ITEM: &str = r#"{
        "object": "item",
        "name": "github",
        "login": {"username": "u", "password": null, "totp": null},
        "notes": null,
        "fields": [
            {"name": "api_token", "value": "t", "type": 1},
            {"name": "recovery_code", "value": "r", "type": 1}
        ]
    }"#;

    #[test]
    fn test_normalize_applies_allow_list() {
        let secret = BitwardenItem::parse(GITHUB_ITEM).unwrap().normalize("github");

        assert_eq!(secret.get("username").unwrap().expose_secret(), "u");
        assert_eq!(secret.get("api_token").unwrap().expose_secret(), "t");
        assert!(secret.get("password").is_none());
        assert!(secret.get("recovery_code").is_none());
        assert!(secret.project("notes").is_none());
    }

    #[test]
    fn test_normalize_keeps_notes_aside() {
        let item = r#"{"login": null, "notes": "ssh host key", "fields": null}"#;
        let secret = BitwardenItem::parse(item).unwrap().normalize("server");

        assert!(secret.is_empty());
        assert_eq!(secret.project("notes").unwrap().expose_secret(), "ssh host key");
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let item = r#"{"fields": [
            {"name": "API_KEY", "value": "k"},
            {"name": "bot_token", "value": null}
        ]}"#;
        let secret = BitwardenItem::parse(item).unwrap().normalize("bot");

        assert_eq!(secret.get("api_key").unwrap().expose_secret(), "k");
        assert!(secret.get("bot_token").is_none());
    }

    #[test]
    fn test_fetch_error_mapping() {
        assert_eq!(fetch_error("github", "Not found.").kind(), ErrorKind::NotFound);
        assert_eq!(
            fetch_error("github", "More than one result was found.").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(fetch_error("github", "Something exploded").kind(), ErrorKind::Transient);
        assert!(is_session_lost("You are not logged in."));
        assert!(is_session_lost("Vault is locked."));
        assert!(!is_session_lost("Not found."));
    }

    #[test]
    fn test_unparseable_item_is_invalid_response() {
        let err = BitwardenItem::parse("<html>").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidResponse { .. }));
    }
}
