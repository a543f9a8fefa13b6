//! Morph request value object.

use alpaca_core::{FilterConfig, PaddingMode, ResponseHead};

/// Query parameter carrying a requested padding size.
pub const PADDING_QUERY_PARAM: &str = "alpaca-padding";

/// Config parameters the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphParams {
    pub mode: PaddingMode,
    pub use_total_obj_size: bool,
    pub obj_inlining_enabled: bool,
}

impl From<&FilterConfig> for MorphParams {
    fn from(config: &FilterConfig) -> Self {
        Self {
            mode: config.mode.clone(),
            use_total_obj_size: config.use_total_obj_size,
            obj_inlining_enabled: config.obj_inlining_enabled,
        }
    }
}

/// Content and page parameters passed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphRequest {
    /// Current content. Replaced by successful engine calls.
    pub content: Vec<u8>,
    pub content_type: String,
    pub host: String,
    pub uri: String,
    pub query: String,
    pub params: MorphParams,
}

impl MorphRequest {
    /// Build a request from a response head and its scope settings.
    pub fn from_head(head: &ResponseHead, config: &FilterConfig, content: Vec<u8>) -> Self {
        Self {
            content,
            content_type: head.content_type().unwrap_or_default().to_string(),
            host: head.host.clone(),
            uri: head.uri.clone(),
            query: head.query.clone(),
            params: MorphParams::from(config),
        }
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Requested padding size from the query string.
    pub fn padding_target(&self) -> Option<usize> {
        padding_target(&self.query)
    }
}

/// Extract the `alpaca-padding` value from a raw query string.
pub fn padding_target(query: &str) -> Option<usize> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == PADDING_QUERY_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}
