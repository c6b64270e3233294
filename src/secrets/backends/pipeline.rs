//! Generic retrieval pipeline
//!
//! Wraps a [`SecretSource`] with the per-instance cache, field projection and
//! the failure policy of [`crate::secrets::classifier`], turning it into a
//! [`CredentialBackend`].

use super::backend::{BackendKind, CredentialBackend, SecretSource};
use super::cache::{CachePolicy, SecretCache};
use crate::errors::{CredentialError, Result};
use crate::secrets::classifier;
use crate::secrets::types::{NormalizedSecret, SecretString};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A [`SecretSource`] behind the cache and the failure policy
#[derive(Debug)]
pub struct RetrievalPipeline<S> {
    source: S,
    cache: Option<SecretCache>,
}

impl<S: SecretSource> RetrievalPipeline<S> {
    pub fn new(source: S, policy: &CachePolicy) -> Self {
        let cache = policy.enabled.then(|| SecretCache::from_policy(policy));
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Service names are case-insensitive: the cache and the source both see this form.
    pub fn canonical_service(service: &str) -> String {
        service.trim().to_lowercase()
    }

    /// Cached or freshly fetched normalized secret, with the raw error.
    async fn load(&self, service: &str) -> Result<NormalizedSecret> {
        let service = Self::canonical_service(service);
        let service = service.as_str();

        if let Some(cache) = &self.cache {
            if let Some(secret) = cache.get(service).await {
                return Ok(secret);
            }
        }

        let secret = self.source.fetch(service).await?;
        debug!(
            backend = %self.source.kind(),
            service = %service,
            fields = secret.len(),
            "Fetched secret from backend"
        );

        if let Some(cache) = &self.cache {
            cache.insert(service, secret.clone()).await;
        }
        Ok(secret)
    }

    fn require(value: &str, what: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(CredentialError::configuration(format!("{} must not be empty", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: SecretSource> CredentialBackend for RetrievalPipeline<S> {
    fn kind(&self) -> BackendKind {
        self.source.kind()
    }

    #[instrument(skip(self), fields(backend = %self.source.kind()))]
    async fn get_secret(&self, service: &str, field: &str) -> Result<SecretString> {
        Self::require(service, "service name")?;
        Self::require(field, "field name")?;

        let secret = match self.load(service).await {
            Ok(secret) => secret,
            Err(e) => return classifier::recover(self.kind(), service, Some(field), e),
        };

        match secret.project(field) {
            Some(value) => Ok(value.clone()),
            None => classifier::recover(
                self.kind(),
                service,
                Some(field),
                CredentialError::not_found(format!("{}/{}", service, field)),
            ),
        }
    }

    async fn fetch_service(&self, service: &str) -> Result<Option<NormalizedSecret>> {
        Self::require(service, "service name")?;

        match self.load(service).await {
            Ok(secret) => Ok(Some(secret)),
            Err(e) => classifier::recover(self.kind(), service, None, e),
        }
    }

    async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.clear_cache().await;
        self.source.shutdown().await
    }
}
