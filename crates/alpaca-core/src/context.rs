//! Request identity and response head events.

use http::header::{HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use http::{HeaderMap, StatusCode};

/// Reserved URI of the synthetic padding object.
pub const SENTINEL_URI: &str = "/__alpaca_fake_image.png";

/// Content type forced on sentinel responses.
pub const SENTINEL_CONTENT_TYPE: &str = "image/png";

/// Accumulation capacity for HTML pages without a `Content-Length`.
pub const DEFAULT_HTML_CAPACITY: usize = 1000;

/// Host-assigned request identity.
///
/// Identities are unique among live requests in one worker; child fetches get
/// their own identity when they are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Whether a request came from the client or was issued internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRole {
    /// Client-originated request.
    TopLevel,
    /// Child fetch issued for a page assembly.
    Subrequest,
}

/// Response header event.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Request path (without query).
    pub uri: String,
    /// Raw query string, empty when absent.
    pub query: String,
    /// Request host.
    pub host: String,
    /// Set when the body must be fully materialized in memory.
    pub needs_in_memory: bool,
}

impl ResponseHead {
    /// Create a head for `uri` with status 200 and no headers.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            uri: uri.into(),
            query: String::new(),
            host: String::new(),
            needs_in_memory: false,
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.set_content_type(content_type);
        self
    }

    /// Set the announced content length.
    pub fn with_content_length(mut self, length: u64) -> Self {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        self
    }

    /// Raw content type, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Replace the content type. Invalid header text is ignored.
    pub fn set_content_type(&mut self, content_type: &str) {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
    }

    /// Announced content length, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Drop headers that announce the final body.
    ///
    /// The padded body differs in length and content, so length, entity tag
    /// and range support must not reach the client.
    pub fn strip_length_announcements(&mut self) {
        self.headers.remove(CONTENT_LENGTH);
        self.headers.remove(ETAG);
        self.headers.remove(ACCEPT_RANGES);
    }

    /// Whether the request targets the synthetic padding object.
    pub fn is_sentinel(&self) -> bool {
        self.uri.starts_with(SENTINEL_URI)
    }

    /// Whether the response is an HTML document.
    pub fn is_html(&self) -> bool {
        self.media_type().is_some_and(|t| t == "text/html")
    }

    /// Whether the response is a stylesheet.
    pub fn is_css(&self) -> bool {
        self.media_type().is_some_and(|t| t == "text/css")
    }

    /// Whether the response is a paddable leaf object (image, script or stylesheet).
    pub fn is_paddable(&self) -> bool {
        self.media_type().is_some_and(|t| {
            t.starts_with("image/")
                || t == "application/javascript"
                || t == "text/javascript"
                || t == "text/css"
        })
    }

    fn media_type(&self) -> Option<String> {
        self.content_type().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId(42).to_string(), "req-42");
        assert_eq!(RequestId::from(7), RequestId(7));
    }

    #[test]
    fn test_content_type_predicates() {
        let html = ResponseHead::new("/").with_content_type("text/html; charset=utf-8");
        assert!(html.is_html());
        assert!(!html.is_paddable());

        let css = ResponseHead::new("/a.css").with_content_type("Text/CSS");
        assert!(css.is_css());
        assert!(css.is_paddable());

        let png = ResponseHead::new("/a.png").with_content_type("image/png");
        assert!(png.is_paddable());

        let js = ResponseHead::new("/a.js").with_content_type("application/javascript");
        assert!(js.is_paddable());

        let json = ResponseHead::new("/a.json").with_content_type("application/json");
        assert!(!json.is_paddable());
        assert!(!json.is_html());

        assert!(!ResponseHead::new("/none").is_paddable());
    }

    #[test]
    fn test_sentinel_match() {
        assert!(ResponseHead::new("/__alpaca_fake_image.png").is_sentinel());
        assert!(!ResponseHead::new("/images/__alpaca_fake_image.png").is_sentinel());
    }

    #[test]
    fn test_strip_length_announcements() {
        let mut head = ResponseHead::new("/").with_content_length(1234);
        head.headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        head.headers
            .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        assert_eq!(head.content_length(), Some(1234));

        head.strip_length_announcements();

        assert_eq!(head.content_length(), None);
        assert!(head.headers.get(ETAG).is_none());
        assert!(head.headers.get(ACCEPT_RANGES).is_none());
    }
}
