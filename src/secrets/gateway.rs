//! Public entry point of the credential gateway.
//!
//! [`CredentialGateway`] resolves a backend identifier, pulls the matching
//! construction parameters out of [`GatewaySettings`] and serves the request
//! through the [`BackendRegistry`].

use super::backends::{
    BackendFactory, BackendKind, BackendRegistry, CredentialBackend, DefaultBackendFactory,
};
use super::types::{NormalizedSecret, SecretString};
use crate::config::GatewaySettings;
use crate::errors::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Credential gateway over every configured backend
#[derive(Debug)]
pub struct CredentialGateway {
    settings: GatewaySettings,
    registry: BackendRegistry,
}

impl CredentialGateway {
    /// Gateway building real backends from `settings`.
    pub fn new(settings: GatewaySettings) -> Self {
        let factory = Arc::new(DefaultBackendFactory::new(settings.factory_options()));
        Self::with_factory(settings, factory)
    }

    /// Gateway constructing backends through `factory`.
    pub fn with_factory(settings: GatewaySettings, factory: Arc<dyn BackendFactory>) -> Self {
        Self { settings, registry: BackendRegistry::new(factory) }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// The authenticated backend named by `backend`, constructing it on first use.
    pub async fn backend(&self, backend: &str) -> Result<Arc<dyn CredentialBackend>> {
        let kind: BackendKind = backend.parse()?;
        let params = self.settings.backend_params(kind)?;
        self.registry.get_or_create(kind, &params).await
    }

    /// Value of `field` stored for `service` in `backend`.
    ///
    /// Returns an empty string when the value cannot be found or read, and an
    /// error only for authentication or configuration problems.
    pub async fn get_secret(
        &self,
        backend: &str,
        service: &str,
        field: &str,
    ) -> Result<SecretString> {
        debug!(backend = %backend, service = %service, field = %field, "Resolving credential");
        self.backend(backend).await?.get_secret(service, field).await
    }

    /// Every normalized field of `service`, or `None` when unavailable.
    pub async fn fetch_service(
        &self,
        backend: &str,
        service: &str,
    ) -> Result<Option<NormalizedSecret>> {
        self.backend(backend).await?.fetch_service(service).await
    }

    /// Reset every backend, logging out of stateful ones.
    pub async fn shutdown(&self) {
        info!("Shutting down credential gateway");
        self.registry.reset_all().await;
    }
}
