//! Credential retrieval over heterogeneous secret stores.
//!
//! # Architecture
//!
//! - [`backends`]: one [`CredentialBackend`] per store (AWS Secrets Manager,
//!   Vault KV v2, the Bitwarden CLI), the shared retrieval pipeline and the
//!   registry that constructs each backend once
//! - [`classifier`]: which failures reach the caller and which become empty
//!   results
//! - [`gateway`]: the string-keyed entry point used by the binary
//! - [`env`]: optional export of a service's fields as environment variables
//!
//! # Example
//!
//! ```rust,ignore
//! use enigma::config::GatewaySettings;
//! use enigma::secrets::CredentialGateway;
//!
//! let gateway = CredentialGateway::new(GatewaySettings::from_env()?);
//! let key = gateway.get_secret("vault", "bugzilla", "api_key").await?;
//! if key.is_empty() {
//!     // missing, denied or unreachable; see the logs
//! }
//! ```
//!
//! # Security Considerations
//!
//! - Values are wrapped in [`SecretString`] and never logged
//! - Passwords and session tokens reach `bw` only through its environment
//! - The gateway never writes, creates or deletes secrets

pub mod backends;
pub mod classifier;
pub mod env;
pub mod gateway;
pub mod types;

pub use backends::{BackendKind, BackendRegistry, CredentialBackend};
pub use gateway::CredentialGateway;
pub use types::{NormalizedSecret, SecretString};
