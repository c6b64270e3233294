//! # Enigma
//!
//! Unified credential retrieval. Given a backend identifier (`aws`, `vault`,
//! `bitwarden`), a service name and a field name, Enigma returns the stored
//! value as a string and hides the differences between the stores behind one
//! contract.
//!
//! ## Architecture
//!
//! ```text
//! CredentialGateway → BackendRegistry → RetrievalPipeline → SecretSource
//!                          ↓                  ↓                   ↓
//!                   BackendFactory     SecretCache +       AWS / Vault / bw CLI
//!                                     ErrorClassifier
//! ```
//!
//! ## Failure policy
//!
//! A lookup yields the value, an empty string (missing item or field, denied
//! access, throttling, outage) or an error. Errors are limited to
//! authentication and configuration problems.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use enigma::{config::GatewaySettings, secrets::CredentialGateway, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let gateway = CredentialGateway::new(GatewaySettings::from_env()?);
//!     let token = gateway.get_secret("bitwarden", "github", "api_token").await?;
//!     println!("{} bytes", token.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::GatewaySettings;
pub use errors::{CredentialError, ErrorKind, Result};
pub use secrets::{BackendKind, CredentialGateway, NormalizedSecret, SecretString};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
