//! # Configuration Management
//!
//! Gateway settings are read from `ENIGMA_*` environment variables (with the
//! conventional `VAULT_*` and `BW_*` fallbacks) or from a TOML file.

pub mod settings;

pub use settings::{AwsSettings, BitwardenSettings, GatewaySettings, VaultSettings};
