//! AWS Secrets Manager backend
//!
//! Calls `GetSecretValue` through the AWS SDK. Credentials come from the
//! backend parameters when given, otherwise from the SDK default provider
//! chain (environment, shared credentials and config files with
//! `AWS_PROFILE`, web identity, container and instance metadata). The
//! secret's `SecretString` must hold a JSON object; its members become the
//! normalized fields.

use super::backend::{BackendKind, CloudKmsParams, SecretSource};
use crate::errors::{CredentialError, Result};
use crate::secrets::types::NormalizedSecret;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_secretsmanager::config::http::HttpResponse;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_sdk_secretsmanager::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Region used when neither parameters, environment nor profile name one
pub const DEFAULT_REGION: &str = "eu-west-3";

const BACKEND: BackendKind = BackendKind::CloudKms;
const PROVIDER_NAME: &str = "enigma-settings";

/// Credentials pinned by the backend parameters, if any.
///
/// `None` defers to the SDK default provider chain.
pub fn explicit_credentials(params: &CloudKmsParams) -> Result<Option<Credentials>> {
    match (&params.access_key_id, &params.secret_access_key) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
            let session_token = params
                .session_token
                .as_ref()
                .filter(|token| !token.is_empty())
                .map(|token| token.expose_secret().to_string());
            Ok(Some(Credentials::new(
                id.clone(),
                secret.expose_secret().to_string(),
                session_token,
                None,
                PROVIDER_NAME,
            )))
        }
        (None, None) => Ok(None),
        _ => Err(CredentialError::configuration(
            "AWS access key id and secret access key must be given together",
        )),
    }
}

/// Region from parameters, `AWS_REGION` or `AWS_DEFAULT_REGION`; empty values are skipped.
pub fn resolve_region(
    params: &CloudKmsParams,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    non_empty(params.region.clone())
        .or_else(|| non_empty(lookup("AWS_REGION")))
        .or_else(|| non_empty(lookup("AWS_DEFAULT_REGION")))
}

/// Map a Secrets Manager error code or HTTP status onto the error taxonomy.
pub fn classify_error(
    code: Option<&str>,
    status: Option<u16>,
    message: Option<&str>,
    reference: &str,
) -> CredentialError {
    let code = code.map(|c| c.rsplit('#').next().unwrap_or(c)).unwrap_or_default();
    let message = match (message, status) {
        (Some(message), _) => message.to_string(),
        (None, Some(status)) => format!("Secrets Manager returned {}", status),
        (None, None) => "Secrets Manager request failed".to_string(),
    };

    match code {
        "ResourceNotFoundException" => CredentialError::not_found(reference),
        "AccessDeniedException"
        | "UnrecognizedClientException"
        | "InvalidSignatureException"
        | "ExpiredTokenException"
        | "DecryptionFailure" => CredentialError::permission_denied(reference, message),
        "ThrottlingException" | "TooManyRequestsException" | "LimitExceededException" => {
            CredentialError::rate_limited(BACKEND, message)
        }
        _ if status == Some(429) => CredentialError::rate_limited(BACKEND, message),
        _ if status == Some(403) => CredentialError::permission_denied(reference, message),
        "" => CredentialError::transient(BACKEND, message),
        other => CredentialError::transient(BACKEND, format!("{}: {}", other, message)),
    }
}

/// Parse a `SecretString` as a flat field map.
pub fn parse_secret_string(service: &str, secret_string: Option<&str>) -> Result<NormalizedSecret> {
    let blob = secret_string.ok_or_else(|| {
        CredentialError::invalid_response(BACKEND, "secret has no SecretString (binary secret)")
    })?;
    let value: serde_json::Value = serde_json::from_str(blob).map_err(|e| {
        CredentialError::invalid_response(BACKEND, format!("SecretString is not JSON: {}", e))
    })?;
    let object = value.as_object().ok_or_else(|| {
        CredentialError::invalid_response(BACKEND, "SecretString is not a JSON object")
    })?;
    Ok(NormalizedSecret::from_json_object(service, object))
}

/// AWS Secrets Manager secret source
pub struct CloudKmsSource {
    client: Client,
    region: String,
    timeout: Duration,
}

impl std::fmt::Debug for CloudKmsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudKmsSource")
            .field("region", &self.region)
            .field("client", &"[SecretsManagerClient]")
            .finish()
    }
}

impl CloudKmsSource {
    /// Build the client and resolve credentials once.
    ///
    /// No credentials anywhere in the provider chain is an authentication
    /// error. SDK retries are disabled so one fetch is one request.
    pub async fn connect(params: &CloudKmsParams, timeout: Duration) -> Result<Self> {
        let explicit = explicit_credentials(params)?;
        let region = resolve_region(params, |name| std::env::var(name).ok());

        let region_chain = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(region_chain)
            .retry_config(RetryConfig::disabled())
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        if let Some(credentials) = explicit {
            loader = loader.credentials_provider(credentials);
        }
        if let Some(endpoint) = &params.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let config = loader.load().await;

        let provider = config.credentials_provider().ok_or_else(|| {
            CredentialError::authentication(BACKEND, "No AWS credentials provider configured")
        })?;
        let credentials = tokio::time::timeout(timeout, provider.provide_credentials())
            .await
            .map_err(|_| {
                CredentialError::timeout("AWS credential resolution", timeout)
                    .into_authentication(BACKEND)
            })?
            .map_err(|e| {
                CredentialError::authentication(
                    BACKEND,
                    format!("No AWS credentials found: {}", DisplayErrorContext(&e)),
                )
            })?;
        debug!(access_key_id = %credentials.access_key_id(), "AWS credentials resolved");

        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        info!(
            region = %region,
            endpoint = %params.endpoint.as_deref().unwrap_or("default"),
            "Initialized AWS Secrets Manager backend"
        );
        Ok(Self { client: Client::new(&config), region, timeout })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn fetch_error(
        &self,
        err: SdkError<GetSecretValueError, HttpResponse>,
        reference: &str,
    ) -> CredentialError {
        match &err {
            SdkError::TimeoutError(_) => CredentialError::timeout("GetSecretValue", self.timeout),
            SdkError::DispatchFailure(_) | SdkError::ConstructionFailure(_) => {
                CredentialError::transient(
                    BACKEND,
                    format!("GetSecretValue failed: {}", DisplayErrorContext(&err)),
                )
            }
            _ => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                classify_error(err.code(), status, err.message(), reference)
            }
        }
    }
}

#[async_trait]
impl SecretSource for CloudKmsSource {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    async fn fetch(&self, service: &str) -> Result<NormalizedSecret> {
        debug!(secret_id = %service, region = %self.region, "Fetching secret from AWS");

        let output = self
            .client
            .get_secret_value()
            .secret_id(service)
            .send()
            .await
            .map_err(|e| self.fetch_error(e, service))?;

        parse_secret_string(service, output.secret_string())
    }
}
