//! Final page output.

use alpaca_streaming::ChunkOrigin;

/// The one body emitted for a finished page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final body bytes.
    pub data: Vec<u8>,
    /// Engine output or the filter's own copy of the page.
    pub origin: ChunkOrigin,
    /// Set when the engine could not render and the captured page is served.
    pub fell_back: bool,
}

impl RenderedPage {
    /// Engine-rendered document.
    pub fn rendered(data: Vec<u8>) -> Self {
        Self {
            data,
            origin: ChunkOrigin::Engine,
            fell_back: false,
        }
    }

    /// Original captured document.
    pub fn original(data: Vec<u8>) -> Self {
        Self {
            data,
            origin: ChunkOrigin::Pool,
            fell_back: true,
        }
    }
}
