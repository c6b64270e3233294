//! Credential backend registry
//!
//! Lazily constructs one authenticated backend per [`BackendKind`] and hands
//! out the same instance until it is reset. Construction of a given kind is
//! serialized by a lock owned by that kind's slot, so two kinds never wait on
//! each other and a kind is never built twice concurrently.

use super::backend::{BackendKind, BackendParams, CredentialBackend};
use super::factory::BackendFactory;
use crate::errors::{CredentialError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Slot = Arc<Mutex<Option<Arc<dyn CredentialBackend>>>>;

/// Registry of lazily constructed credential backends
pub struct BackendRegistry {
    factory: Arc<dyn BackendFactory>,
    slots: DashMap<BackendKind, Slot>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.slots.iter().map(|e| *e.key()).collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory, slots: DashMap::new() }
    }

    fn slot(&self, kind: BackendKind) -> Slot {
        // the DashMap shard guard is released before the slot lock is awaited
        self.slots.entry(kind).or_default().value().clone()
    }

    /// Return the backend for `kind`, constructing and authenticating it once.
    ///
    /// A failed construction is not remembered; the next call tries again.
    pub async fn get_or_create(
        &self,
        kind: BackendKind,
        params: &BackendParams,
    ) -> Result<Arc<dyn CredentialBackend>> {
        if params.kind() != kind {
            return Err(CredentialError::configuration(format!(
                "Parameters for '{}' cannot build a '{}' backend",
                params.kind(),
                kind
            )));
        }

        let slot = self.slot(kind);
        let mut guard = slot.lock().await;

        if let Some(backend) = guard.as_ref() {
            debug!(backend = %kind, "Reusing initialized credential backend");
            return Ok(Arc::clone(backend));
        }

        info!(backend = %kind, "Initializing credential backend");
        let backend = self.factory.create(params).await.map_err(|e| {
            warn!(backend = %kind, error = %e, "Credential backend initialization failed");
            e
        })?;

        *guard = Some(Arc::clone(&backend));
        info!(backend = %kind, "Credential backend ready");
        Ok(backend)
    }

    /// The initialized backend for `kind`, if any.
    pub async fn get(&self, kind: BackendKind) -> Option<Arc<dyn CredentialBackend>> {
        let slot = self.slots.get(&kind).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.clone()
    }

    pub async fn is_initialized(&self, kind: BackendKind) -> bool {
        self.get(kind).await.is_some()
    }

    /// Drop the backend for `kind` and shut it down.
    ///
    /// Shutdown failures are logged; the slot is emptied regardless.
    pub async fn reset(&self, kind: BackendKind) {
        let Some(slot) = self.slots.get(&kind).map(|entry| entry.value().clone()) else {
            return;
        };

        let previous = slot.lock().await.take();
        if let Some(backend) = previous {
            info!(backend = %kind, "Resetting credential backend");
            if let Err(e) = backend.shutdown().await {
                warn!(backend = %kind, error = %e, "Credential backend shutdown failed");
            }
        }
    }

    /// Reset every kind.
    pub async fn reset_all(&self) {
        for kind in BackendKind::ALL {
            self.reset(kind).await;
        }
    }
}
