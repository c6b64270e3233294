//! Vault KV v2 backend
//!
//! Reads `{mount}/data/{service}` through `vaultrs` with a static token and
//! keeps the inner `data` object of the KV v2 envelope. The token is verified
//! once against `auth/token/lookup-self` when the backend is constructed.

use super::backend::{BackendKind, SecretSource, VaultKvParams};
use crate::errors::{CredentialError, Result};
use crate::secrets::types::NormalizedSecret;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

/// Default KV v2 mount
pub const DEFAULT_KV_MOUNT: &str = "secret";

const BACKEND: BackendKind = BackendKind::VaultKv;

/// HashiCorp Vault KV v2 secret source
pub struct VaultKvSource {
    client: VaultClient,
    address: String,
    mount: String,
    timeout: Duration,
}

impl std::fmt::Debug for VaultKvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKvSource")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultKvSource {
    /// Build the client and verify the token.
    ///
    /// An unreadable CA file, an unreachable server and a rejected token all
    /// fail as authentication errors.
    pub async fn connect(params: &VaultKvParams, timeout: Duration) -> Result<Self> {
        if params.token.is_empty() {
            return Err(CredentialError::configuration("Vault token must not be empty"));
        }
        // the settings builder panics on a malformed address
        let address = Url::parse(&params.address).map_err(|e| {
            CredentialError::configuration(format!(
                "Invalid Vault address '{}': {}",
                params.address, e
            ))
        })?;

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(address.as_str());
        settings_builder.token(params.token.expose_secret());

        if let Some(ref namespace) = params.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }
        if let Some(ref ca_cert) = params.ca_cert {
            settings_builder.ca_certs(vec![ca_cert.to_string_lossy().into_owned()]);
        }

        let settings = settings_builder.build().map_err(|e| {
            CredentialError::configuration(format!("Invalid Vault backend configuration: {}", e))
        })?;

        let client = VaultClient::new(settings).map_err(|e| {
            CredentialError::authentication(
                BACKEND,
                format!("Failed to create Vault client: {}", e),
            )
        })?;

        let source = Self {
            client,
            address: params.address.clone(),
            mount: normalize_mount(&params.mount),
            timeout,
        };
        source.verify_token().await?;

        info!(address = %source.address, kv_mount = %source.mount, "Initialized Vault KV backend");
        Ok(source)
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    async fn verify_token(&self) -> Result<()> {
        let lookup = self
            .bounded("token lookup", vaultrs::token::lookup_self(&self.client))
            .await
            .map_err(|e| e.into_authentication(BACKEND))?;

        match lookup {
            Ok(_) => {
                debug!("Vault token accepted");
                Ok(())
            }
            Err(ClientError::APIError { code: 401 | 403, .. }) => Err(
                CredentialError::authentication(BACKEND, "Vault rejected the configured token"),
            ),
            Err(e) => Err(CredentialError::authentication(
                BACKEND,
                format!("Vault token lookup failed: {}", e),
            )),
        }
    }

    /// Run one Vault call under the configured deadline.
    async fn bounded<T>(&self, operation: &str, call: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CredentialError::timeout(format!("vault {}", operation), self.timeout))
    }
}

/// Mount path without surrounding slashes, falling back to [`DEFAULT_KV_MOUNT`].
pub fn normalize_mount(mount: &str) -> String {
    match mount.trim_matches('/') {
        "" => DEFAULT_KV_MOUNT.to_string(),
        mount => mount.to_string(),
    }
}

/// Map a Vault API status onto the error taxonomy.
pub fn status_error(code: u16, reference: &str, errors: &[String]) -> CredentialError {
    let message = match errors {
        [] => format!("Vault returned {}", code),
        errors => format!("Vault returned {}: {}", code, errors.join("; ")),
    };
    match code {
        404 => CredentialError::not_found(reference),
        401 | 403 => CredentialError::permission_denied(reference, message),
        429 => CredentialError::rate_limited(BACKEND, message),
        _ => CredentialError::transient(BACKEND, message),
    }
}

/// Map a failed KV read onto the error taxonomy.
pub fn read_error(err: ClientError, reference: &str) -> CredentialError {
    match err {
        ClientError::APIError { code, errors } => status_error(code, reference, &errors),
        other => CredentialError::transient(BACKEND, format!("KV read failed: {}", other)),
    }
}

#[async_trait]
impl SecretSource for VaultKvSource {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    async fn fetch(&self, service: &str) -> Result<NormalizedSecret> {
        let path = service.trim_matches('/');
        let reference = format!("{}/{}", self.mount, path);
        debug!(reference = %reference, kv_mount = %self.mount, "Fetching secret from Vault");

        let data: HashMap<String, serde_json::Value> = self
            .bounded("KV read", kv2::read(&self.client, &self.mount, path))
            .await?
            .map_err(|e| {
                debug!(reference = %reference, error = %e, "Vault KV read failed");
                read_error(e, &reference)
            })?;

        let object: serde_json::Map<String, serde_json::Value> = data.into_iter().collect();
        Ok(NormalizedSecret::from_json_object(service, &object))
    }
}
