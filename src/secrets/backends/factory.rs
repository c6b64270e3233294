//! Backend construction
//!
//! [`BackendFactory`] is the seam the registry constructs backends through.
//! [`DefaultBackendFactory`] builds the real AWS, Vault and Bitwarden
//! backends, each wrapped in a [`RetrievalPipeline`].

use super::aws::CloudKmsSource;
use super::backend::{BackendParams, CredentialBackend};
use super::bitwarden::{CliRunner, PasswordManagerCliSource, ProcessRunner};
use super::cache::CachePolicy;
use super::pipeline::RetrievalPipeline;
use super::vault::VaultKvSource;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline of every blocking backend step
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between two `bw sync` calls
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Builds an authenticated backend from its parameters
#[async_trait]
pub trait BackendFactory: Send + Sync + std::fmt::Debug {
    async fn create(&self, params: &BackendParams) -> Result<Arc<dyn CredentialBackend>>;
}

/// Knobs shared by every backend built by [`DefaultBackendFactory`]
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    pub timeout: Duration,
    pub cache: CachePolicy,
    pub sync_interval: Duration,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cache: CachePolicy::default(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Production factory
#[derive(Debug)]
pub struct DefaultBackendFactory {
    options: FactoryOptions,
    cli_runner: Option<Arc<dyn CliRunner>>,
}

impl DefaultBackendFactory {
    pub fn new(options: FactoryOptions) -> Self {
        Self { options, cli_runner: None }
    }

    /// Run Bitwarden commands through `runner` instead of spawning processes.
    pub fn with_cli_runner(mut self, runner: Arc<dyn CliRunner>) -> Self {
        self.cli_runner = Some(runner);
        self
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }
}

impl Default for DefaultBackendFactory {
    fn default() -> Self {
        Self::new(FactoryOptions::default())
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn create(&self, params: &BackendParams) -> Result<Arc<dyn CredentialBackend>> {
        let options = &self.options;
        let backend: Arc<dyn CredentialBackend> = match params {
            BackendParams::CloudKms(p) => {
                let source = CloudKmsSource::connect(p, options.timeout).await?;
                Arc::new(RetrievalPipeline::new(source, &options.cache))
            }
            BackendParams::VaultKv(p) => {
                let source = VaultKvSource::connect(p, options.timeout).await?;
                Arc::new(RetrievalPipeline::new(source, &options.cache))
            }
            BackendParams::PasswordManagerCli(p) => {
                let runner = match &self.cli_runner {
                    Some(runner) => Arc::clone(runner),
                    None => Arc::new(ProcessRunner::new(&p.cli_path, options.timeout)),
                };
                let source =
                    PasswordManagerCliSource::connect(p, runner, options.sync_interval).await?;
                Arc::new(RetrievalPipeline::new(source, &options.cache))
            }
        };
        Ok(backend)
    }
}
