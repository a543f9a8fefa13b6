//! ALPaCA CLI - Command line tool for the padding filter configuration.
//!
//! Commands:
//! - `alpaca config show` - Print the root scope and every location scope
//! - `alpaca config validate` - Validate every scope and list all errors
//! - `alpaca config init` - Write a commented default `alpaca.toml`
//! - `alpaca config resolve <uri>` - Show the settings a request path gets

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use alpaca_observability::{init_tracing, LogFormat};
use commands::ConfigArgs;

/// ALPaCA CLI - Inspect and validate padding filter configuration
#[derive(Parser)]
#[command(name = "alpaca")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let format = if cli.json { LogFormat::Json } else { LogFormat::Human };
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    if let Err(e) = init_tracing(format, default_filter) {
        output.warn(&format!("logging disabled: {}", e));
    }

    let ctx = context::Context::load(cli.config.as_deref(), output)?;
    tracing::debug!(config = ?ctx.config_path, cwd = %ctx.cwd.display(), "context loaded");

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx),
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
