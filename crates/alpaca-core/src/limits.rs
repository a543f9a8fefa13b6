//! Resource limits for intercepted requests.

use serde::{Deserialize, Serialize};

/// Caps on the memory the filter holds.
///
/// Hitting a cap makes the affected request fall back to pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLimits {
    /// Maximum number of requests tracked at once (children excluded).
    pub max_tracked_requests: usize,
    /// Maximum accumulated body size of one request in bytes.
    pub max_body_bytes: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_tracked_requests: 4096,
            max_body_bytes: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl FilterLimits {
    /// Create limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum tracked requests.
    pub fn with_max_tracked_requests(mut self, max: usize) -> Self {
        self.max_tracked_requests = max;
        self
    }

    /// Set maximum body size in bytes.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}
