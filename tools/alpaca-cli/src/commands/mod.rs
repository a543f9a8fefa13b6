//! CLI command implementations.

pub mod config;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the root scope and every location scope.
    Show,
    /// Validate every scope of the config file.
    Validate,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Show the settings that apply to a request path.
    Resolve {
        /// Request path, e.g. `/static/app.css`.
        uri: String,
    },
}
