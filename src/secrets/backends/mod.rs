//! Pluggable credential backend architecture
//!
//! Every backend kind implements [`SecretSource`] (raw fetch and
//! normalization) and is served through a [`RetrievalPipeline`], which adds
//! the cache and the failure policy and exposes the [`CredentialBackend`]
//! contract. The [`BackendRegistry`] constructs one instance per kind.
//!
//! ## Supported Backends
//!
//! - **AWS Secrets Manager**: `GetSecretValue`, JSON `SecretString`
//! - **Vault**: HashiCorp Vault KV v2 engine, static token
//! - **Bitwarden**: the `bw` CLI, with login/unlock session handling

pub mod aws;
pub mod backend;
pub mod bitwarden;
pub mod cache;
pub mod factory;
pub mod pipeline;
pub mod registry;
pub mod vault;

pub use aws::CloudKmsSource;
pub use backend::{
    BackendKind, BackendParams, CloudKmsParams, CredentialBackend, PasswordManagerParams,
    SecretSource, VaultKvParams,
};
pub use bitwarden::PasswordManagerCliSource;
pub use cache::{CachePolicy, SecretCache};
pub use factory::{BackendFactory, DefaultBackendFactory, FactoryOptions};
pub use pipeline::RetrievalPipeline;
pub use registry::BackendRegistry;
pub use vault::VaultKvSource;
