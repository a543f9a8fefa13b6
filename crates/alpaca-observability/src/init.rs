//! Subscriber setup.

use tracing_subscriber::EnvFilter;

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (for development).
    #[default]
    Human,
    /// JSON format (for log aggregation).
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> Result<(), InitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| InitError::Filter {
            filter: default_filter.to_string(),
            message: e.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| InitError::Install(e.to_string()))
}
