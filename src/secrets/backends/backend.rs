//! Credential backend trait and types
//!
//! Defines the capability contract shared by every backend and the seam
//! between a backend's raw fetch and the generic retrieval pipeline.

use crate::errors::{CredentialError, Result};
use crate::secrets::types::{NormalizedSecret, SecretString};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of credential backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// AWS Secrets Manager
    #[serde(rename = "aws")]
    CloudKms,
    /// HashiCorp Vault KV v2
    #[serde(rename = "vault")]
    VaultKv,
    /// Bitwarden CLI (`bw`)
    #[serde(rename = "bitwarden")]
    PasswordManagerCli,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::CloudKms, Self::VaultKv, Self::PasswordManagerCli];

    /// Canonical identifier of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudKms => "aws",
            Self::VaultKv => "vault",
            Self::PasswordManagerCli => "bitwarden",
        }
    }
}

impl FromStr for BackendKind {
    type Err = CredentialError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" | "aws_secrets_manager" => Ok(Self::CloudKms),
            "vault" | "hashicorp" => Ok(Self::VaultKv),
            "bitwarden" | "bw" => Ok(Self::PasswordManagerCli),
            other => Err(CredentialError::configuration(format!(
                "Unknown credential backend: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Construction parameters for AWS Secrets Manager.
///
/// Every field is optional; omitted credentials are resolved through the AWS
/// default provider chain at construction time.
#[derive(Debug, Clone, Default)]
pub struct CloudKmsParams {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
    pub region: Option<String>,
    /// Endpoint override (VPC endpoints, local mocks)
    pub endpoint: Option<String>,
}

/// Construction parameters for Vault KV v2.
#[derive(Debug, Clone)]
pub struct VaultKvParams {
    pub address: String,
    pub token: SecretString,
    /// PEM-encoded CA certificate used to verify the server
    pub ca_cert: Option<PathBuf>,
    pub mount: String,
    pub namespace: Option<String>,
}

/// Construction parameters for the Bitwarden CLI.
#[derive(Debug, Clone)]
pub struct PasswordManagerParams {
    pub email: String,
    pub master_password: SecretString,
    pub cli_path: PathBuf,
}

/// Parameters needed to construct one backend.
#[derive(Debug, Clone)]
pub enum BackendParams {
    CloudKms(CloudKmsParams),
    VaultKv(VaultKvParams),
    PasswordManagerCli(PasswordManagerParams),
}

impl BackendParams {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::CloudKms(_) => BackendKind::CloudKms,
            Self::VaultKv(_) => BackendKind::VaultKv,
            Self::PasswordManagerCli(_) => BackendKind::PasswordManagerCli,
        }
    }
}

/// An authenticated, ready-to-query credential backend.
///
/// `get_secret` never fails for recoverable conditions (missing item,
/// missing field, denied access, throttling, transient outages); those yield
/// an empty value. Only authentication and configuration errors surface.
#[async_trait]
pub trait CredentialBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Value of `field` for `service`, or an empty string.
    async fn get_secret(&self, service: &str, field: &str) -> Result<SecretString>;

    /// Every normalized field of `service`, or `None` on a recoverable failure.
    async fn fetch_service(&self, service: &str) -> Result<Option<NormalizedSecret>>;

    /// Drop every cached service of this instance.
    async fn clear_cache(&self);

    /// Release the connection (log out of stateful backends).
    async fn shutdown(&self) -> Result<()>;
}

/// Raw fetch and normalization step of one backend.
///
/// Implementations return the full error taxonomy; the retrieval pipeline
/// decides which failures reach the caller.
#[async_trait]
pub trait SecretSource: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Fetch the item stored for `service` and normalize it.
    async fn fetch(&self, service: &str) -> Result<NormalizedSecret>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
