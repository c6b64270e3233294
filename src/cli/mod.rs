//! # Command Line Interface
//!
//! `enigma get <backend> <service> <field>` prints one credential;
//! `enigma export <backend> <service>` prints shell `export` lines for every
//! field of a service.

use crate::config::GatewaySettings;
use crate::observability::init_logging;
use crate::secrets::env::{export_assignments, export_line};
use crate::secrets::CredentialGateway;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "enigma")]
#[command(about = "Unified credential retrieval from AWS Secrets Manager, Vault and Bitwarden")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// TOML settings file (defaults to the environment)
    #[arg(short, long, global = true, env = "ENIGMA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print one credential field (empty line when unavailable)
    Get {
        /// Backend: aws, vault or bitwarden
        backend: String,
        /// Service (secret or item) name
        service: String,
        /// Field name, or `notes` for Bitwarden notes
        field: String,
    },

    /// Print `export NAME='value'` lines for every field of a service
    Export {
        /// Backend: aws, vault or bitwarden
        backend: String,
        /// Service (secret or item) name
        service: String,
    },
}

fn load_settings(cli: &Cli) -> anyhow::Result<GatewaySettings> {
    let mut settings = match &cli.config {
        Some(path) => GatewaySettings::from_toml_file(path)?,
        None => GatewaySettings::from_env()?,
    };
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
        settings.validate()?;
    }
    Ok(settings)
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let settings = load_settings(&cli)?;
    let gateway = CredentialGateway::new(settings);

    match &cli.command {
        Commands::Get { backend, service, field } => {
            let value = gateway.get_secret(backend, service, field).await?;
            println!("{}", value.expose_secret());
        }
        Commands::Export { backend, service } => {
            match gateway.fetch_service(backend, service).await? {
                Some(secret) => {
                    for (name, value) in export_assignments(&secret) {
                        println!("{}", export_line(&name, &value));
                    }
                }
                None => info!(backend = %backend, service = %service, "Nothing to export"),
            }
        }
    }

    Ok(())
}
