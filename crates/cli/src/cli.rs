//! Command-line definition and dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tandem_coordinator_core::logging::{parse_log_level, setup_logging, LoggingConfig};
use tandem_coordinator_core::{PairingIdentity, ParticipantId, SessionConfig};

use crate::simulate::{self, Scenario};

#[derive(Debug, Parser)]
#[command(name = "tandem", version, about = "Two-party session coordinator tools")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "TANDEM_LOG")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Session configuration file (TOML)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve partner and role from a party id
    Pairing {
        /// Our participant id
        self_id: u64,
        /// Party id, ids separated by ':'
        party_id: String,
    },

    /// Validate a configuration and print it with defaults filled in
    CheckConfig,

    /// Run two paired sessions against a loopback hub
    Simulate {
        /// Drop the primary's connection once the pair is active
        #[arg(long)]
        drop_primary: bool,

        /// Seconds the secondary stays once the pair is active before leaving for good
        #[arg(long, default_value_t = 2.0)]
        secondary_leaves_after: f64,

        /// Partner disconnect countdown in seconds [default: config file, else 5]
        #[arg(long)]
        partner_timeout: Option<f64>,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut logging = LoggingConfig::new(parse_log_level(&self.log_level)?);
        if self.json_logs {
            logging = logging.with_json();
        }
        setup_logging(&logging)?;

        let from_file = self.config.is_some();
        let config = match &self.config {
            Some(path) => SessionConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SessionConfig::default(),
        };

        match self.command {
            Command::Pairing { self_id, party_id } => {
                let pairing = PairingIdentity::new(ParticipantId(self_id), party_id).resolve()?;
                println!("{}", serde_json::to_string_pretty(&pairing)?);
            }
            Command::CheckConfig => {
                config.validate()?;
                info!("✅ Configuration is valid");
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Command::Simulate {
                drop_primary,
                secondary_leaves_after,
                partner_timeout,
            } => {
                let config = match partner_timeout {
                    Some(secs) => config.with_partner_disconnect_time(secs),
                    None if !from_file => config.with_partner_disconnect_time(5.0),
                    None => config,
                };
                let scenario = Scenario {
                    drop_primary,
                    secondary_leaves_after,
                };
                simulate::run(config, scenario).await?;
            }
        }

        Ok(())
    }
}
