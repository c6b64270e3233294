//! # Configuration Settings
//!
//! Defines the gateway configuration: per-backend construction parameters,
//! cache policy and timeouts.

use crate::errors::{CredentialError, Result};
use crate::secrets::backends::{
    BackendKind, BackendParams, CachePolicy, CloudKmsParams, FactoryOptions,
    PasswordManagerParams, VaultKvParams,
};
use crate::secrets::types::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewaySettings {
    /// AWS Secrets Manager configuration
    #[validate(nested)]
    pub aws: AwsSettings,

    /// Vault configuration
    #[validate(nested)]
    pub vault: VaultSettings,

    /// Bitwarden configuration
    #[validate(nested)]
    pub bitwarden: BitwardenSettings,

    /// Per-backend cache of fetched services
    #[validate(nested)]
    pub cache: CachePolicy,

    /// Deadline of every blocking backend step in seconds
    #[validate(range(min = 1, max = 600, message = "Timeout must be between 1 and 600 seconds"))]
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            aws: AwsSettings::default(),
            vault: VaultSettings::default(),
            bitwarden: BitwardenSettings::default(),
            cache: CachePolicy::default(),
            timeout_secs: 30,
        }
    }
}

/// AWS Secrets Manager configuration
///
/// Credentials left unset here are resolved through the AWS default provider
/// chain (environment, shared profile files, instance roles) when the backend
/// is constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AwsSettings {
    #[validate(length(min = 1, message = "AWS access key id cannot be empty"))]
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
    #[validate(length(min = 1, message = "AWS region cannot be empty"))]
    pub region: Option<String>,
    #[validate(url(message = "AWS endpoint must be a URL"))]
    pub endpoint: Option<String>,
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VaultSettings {
    #[validate(url(message = "Vault address must be a URL"))]
    pub address: Option<String>,
    pub token: Option<SecretString>,
    /// PEM CA certificate; system roots are used when unset
    pub ca_cert: Option<PathBuf>,
    #[validate(length(min = 1, message = "Vault mount cannot be empty"))]
    pub mount: String,
    pub namespace: Option<String>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: None,
            token: None,
            ca_cert: None,
            mount: crate::secrets::backends::vault::DEFAULT_KV_MOUNT.to_string(),
            namespace: None,
        }
    }
}

/// Bitwarden configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BitwardenSettings {
    #[validate(email(message = "Bitwarden email is not a valid address"))]
    pub email: Option<String>,
    pub master_password: Option<SecretString>,
    /// `bw` executable, looked up on `PATH` when relative
    pub cli_path: PathBuf,
    /// Minimum seconds between two vault syncs
    #[validate(range(
        min = 1,
        max = 86400,
        message = "Sync interval must be between 1 second and 1 day"
    ))]
    pub sync_interval_secs: u64,
}

impl Default for BitwardenSettings {
    fn default() -> Self {
        Self {
            email: None,
            master_password: None,
            cli_path: PathBuf::from("bw"),
            sync_interval_secs: 300,
        }
    }
}

fn first(lookup: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names.iter().copied().find_map(|name| lookup(name).filter(|value| !value.is_empty()))
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match first(lookup, &[name]) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CredentialError::configuration(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
    }
}

impl GatewaySettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings from environment-style variables seen by `lookup`.
    ///
    /// `ENIGMA_*` names win over the conventional `VAULT_*` and `BW_*` ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        settings.aws = AwsSettings {
            access_key_id: first(&lookup, &["ENIGMA_AWS_ACCESS_KEY_ID"]),
            secret_access_key: first(&lookup, &["ENIGMA_AWS_SECRET_ACCESS_KEY"])
                .map(SecretString::new),
            session_token: first(&lookup, &["ENIGMA_AWS_SESSION_TOKEN"]).map(SecretString::new),
            region: first(&lookup, &["ENIGMA_AWS_REGION"]),
            endpoint: first(&lookup, &["ENIGMA_AWS_ENDPOINT"]),
        };

        settings.vault.address = first(&lookup, &["ENIGMA_VAULT_ADDR", "VAULT_ADDR"]);
        settings.vault.token =
            first(&lookup, &["ENIGMA_VAULT_TOKEN", "VAULT_TOKEN"]).map(SecretString::new);
        settings.vault.ca_cert =
            first(&lookup, &["ENIGMA_VAULT_CACERT", "VAULT_CACERT"]).map(PathBuf::from);
        settings.vault.namespace = first(&lookup, &["ENIGMA_VAULT_NAMESPACE", "VAULT_NAMESPACE"]);
        if let Some(mount) = first(&lookup, &["ENIGMA_VAULT_MOUNT"]) {
            settings.vault.mount = mount;
        }

        settings.bitwarden.email = first(&lookup, &["ENIGMA_BW_EMAIL", "BW_EMAIL"]);
        settings.bitwarden.master_password =
            first(&lookup, &["ENIGMA_BW_PASSWORD", "BW_PASSWORD"]).map(SecretString::new);
        if let Some(cli_path) = first(&lookup, &["ENIGMA_BW_CLI"]) {
            settings.bitwarden.cli_path = PathBuf::from(cli_path);
        }
        if let Some(secs) = parse_var(&lookup, "ENIGMA_BW_SYNC_INTERVAL_SECS")? {
            settings.bitwarden.sync_interval_secs = secs;
        }

        if let Some(enabled) = parse_var(&lookup, "ENIGMA_CACHE_ENABLED")? {
            settings.cache.enabled = enabled;
        }
        if let Some(ttl) = parse_var(&lookup, "ENIGMA_CACHE_TTL_SECS")? {
            settings.cache.ttl_secs = ttl;
        }
        if let Some(capacity) = parse_var(&lookup, "ENIGMA_CACHE_CAPACITY")? {
            settings.cache.capacity = capacity;
        }
        if let Some(timeout) = parse_var(&lookup, "ENIGMA_TIMEOUT_SECS")? {
            settings.timeout_secs = timeout;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CredentialError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| CredentialError::configuration(format!("Invalid settings file: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;
        self.validate_custom()
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if self.aws.access_key_id.is_some() != self.aws.secret_access_key.is_some() {
            return Err(CredentialError::configuration(
                "AWS access key id and secret access key must be set together",
            ));
        }

        let empty_secret =
            |value: &Option<SecretString>| value.as_ref().is_some_and(|v| v.is_empty());
        if empty_secret(&self.aws.secret_access_key)
            || empty_secret(&self.vault.token)
            || empty_secret(&self.bitwarden.master_password)
        {
            return Err(CredentialError::configuration("Secret settings cannot be empty"));
        }

        if self.bitwarden.cli_path.as_os_str().is_empty() {
            return Err(CredentialError::configuration("Bitwarden CLI path cannot be empty"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for the backend factory
    pub fn factory_options(&self) -> FactoryOptions {
        FactoryOptions {
            timeout: self.timeout(),
            cache: self.cache,
            sync_interval: Duration::from_secs(self.bitwarden.sync_interval_secs),
        }
    }

    /// Construction parameters for `kind`.
    ///
    /// Missing required values are configuration errors.
    pub fn backend_params(&self, kind: BackendKind) -> Result<BackendParams> {
        match kind {
            BackendKind::CloudKms => Ok(BackendParams::CloudKms(CloudKmsParams {
                access_key_id: self.aws.access_key_id.clone(),
                secret_access_key: self.aws.secret_access_key.clone(),
                session_token: self.aws.session_token.clone(),
                region: self.aws.region.clone(),
                endpoint: self.aws.endpoint.clone(),
            })),
            BackendKind::VaultKv => {
                let address = self.vault.address.clone().ok_or_else(|| {
                    CredentialError::configuration("Vault address is not configured (VAULT_ADDR)")
                })?;
                let token = self.vault.token.clone().ok_or_else(|| {
                    CredentialError::configuration("Vault token is not configured (VAULT_TOKEN)")
                })?;
                Ok(BackendParams::VaultKv(VaultKvParams {
                    address,
                    token,
                    ca_cert: self.vault.ca_cert.clone(),
                    mount: self.vault.mount.clone(),
                    namespace: self.vault.namespace.clone(),
                }))
            }
            BackendKind::PasswordManagerCli => {
                let email = self.bitwarden.email.clone().ok_or_else(|| {
                    CredentialError::configuration("Bitwarden email is not configured (BW_EMAIL)")
                })?;
                let master_password = self.bitwarden.master_password.clone().ok_or_else(|| {
                    CredentialError::configuration(
                        "Bitwarden master password is not configured (BW_PASSWORD)",
                    )
                })?;
                Ok(BackendParams::PasswordManagerCli(PasswordManagerParams {
                    email,
                    master_password,
                    cli_path: self.bitwarden.cli_path.clone(),
                }))
            }
        }
    }
}
