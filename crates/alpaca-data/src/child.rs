//! Child fetch boundary.

use alpaca_core::RequestId;
use http::StatusCode;

/// Error type for child fetches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("child fetch for {uri} refused: {reason}")]
    Refused { uri: String, reason: String },

    #[error("HTTP error: {status} for {uri}")]
    Http { status: u16, uri: String },

    #[error("child fetch for {uri} aborted")]
    Aborted { uri: String },

    #[error("could not capture body of {uri}: {reason}")]
    Capture { uri: String, reason: String },
}

/// Starts internal fetches on behalf of a page.
///
/// Issued children report back through the filter's header and body events
/// under the identity returned here.
pub trait ChildFetcher {
    /// Start a non-terminal fetch of `uri` for the page `parent`.
    fn issue(&mut self, parent: RequestId, uri: &str) -> Result<RequestId, FetchError>;
}

/// A child fetch that has been issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRequest {
    pub id: RequestId,
    pub parent: RequestId,
    pub uri: String,
}

/// Result of a finished child fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOutcome {
    /// The body was captured in full.
    Captured(Vec<u8>),
    /// The child failed and is left out of the cache.
    Failed(FetchError),
}

impl ChildOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, ChildOutcome::Captured(_))
    }

    /// Captured byte count, zero on failure.
    pub fn captured_len(&self) -> usize {
        match self {
            ChildOutcome::Captured(body) => body.len(),
            ChildOutcome::Failed(_) => 0,
        }
    }
}

/// Classify a finished child by its status. Only 2xx bodies are captured.
pub fn classify(uri: &str, status: StatusCode, body: Vec<u8>) -> ChildOutcome {
    if status.is_success() {
        ChildOutcome::Captured(body)
    } else {
        ChildOutcome::Failed(FetchError::Http {
            status: status.as_u16(),
            uri: uri.to_string(),
        })
    }
}
