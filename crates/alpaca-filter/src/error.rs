//! Filter error types.

use alpaca_core::RequestId;
use alpaca_streaming::SinkError;

/// Errors surfaced to the host.
///
/// Everything else falls back to pass-through inside the controller.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("downstream error: {0}")]
    Sink(#[from] SinkError),
}

/// Errors when tracking a request.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("request registry is full ({limit} requests tracked)")]
    Full { limit: usize },

    #[error("request {0} is already tracked")]
    Duplicate(RequestId),
}
