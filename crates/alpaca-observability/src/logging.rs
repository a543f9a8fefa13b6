//! Structured logging with request context.

use std::collections::BTreeMap;
use std::time::Instant;

use alpaca_core::RequestId;

/// Logged when an HTML page cannot be rendered.
pub const RENDER_FAILURE_HINT: &str = "could not process html content. If you use proxy_pass, \
     set proxy_set_header Accept-Encoding \"\" so that the upstream server returns raw html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One event, with the request context it is logged under.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub request_id: RequestId,
    pub uri: String,
    /// Owning page, for child fetches.
    pub page: Option<RequestId>,
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Microseconds since the logger was created.
    pub elapsed_us: u64,
}

impl LogEntry {
    fn dispatch(self) {
        let request_id = self.request_id.to_string();
        let page = self.page.map(|p| p.to_string()).unwrap_or_default();
        let fields = serde_json::Value::Object(self.fields.into_iter().collect());
        let (uri, elapsed_us, message) = (self.uri, self.elapsed_us, self.message);

        match self.level {
            LogLevel::Debug => tracing::debug!(
                %request_id, %uri, %page, elapsed_us, %fields, "{}", message
            ),
            LogLevel::Info => tracing::info!(
                %request_id, %uri, %page, elapsed_us, %fields, "{}", message
            ),
            LogLevel::Warn => tracing::warn!(
                %request_id, %uri, %page, elapsed_us, %fields, "{}", message
            ),
            LogLevel::Error => tracing::error!(
                %request_id, %uri, %page, elapsed_us, %fields, "{}", message
            ),
        }
    }
}

/// Request-scoped logger.
///
/// Every event carries the request id and uri, plus the owning page for
/// child fetches, and is dispatched through `tracing`.
#[derive(Debug, Clone)]
pub struct FilterLogger {
    request_id: RequestId,
    uri: String,
    page: Option<RequestId>,
    start: Instant,
}

impl FilterLogger {
    pub fn new(request_id: RequestId, uri: impl Into<String>) -> Self {
        Self {
            request_id,
            uri: uri.into(),
            page: None,
            start: Instant::now(),
        }
    }

    /// Set the page that issued this request.
    pub fn with_page(mut self, page: RequestId) -> Self {
        self.page = Some(page);
        self
    }

    pub fn debug(&self, message: &str) {
        self.debug_builder(message).emit();
    }

    pub fn warn(&self, message: &str) {
        self.warn_builder(message).emit();
    }

    fn entry(
        &self,
        level: LogLevel,
        message: &str,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> LogEntry {
        LogEntry {
            level,
            message: message.to_string(),
            request_id: self.request_id,
            uri: self.uri.clone(),
            page: self.page,
            fields,
            elapsed_us: self.start.elapsed().as_micros() as u64,
        }
    }

    pub fn debug_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Debug, message)
    }

    pub fn info_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Info, message)
    }

    pub fn warn_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Warn, message)
    }

    pub fn error_builder(&self, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, LogLevel::Error, message)
    }
}

/// Fluent builder for an event with structured fields.
pub struct LogBuilder<'a> {
    logger: &'a FilterLogger,
    level: LogLevel,
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
}

impl<'a> LogBuilder<'a> {
    fn new(logger: &'a FilterLogger, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger,
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::json!(value.into()));
        self
    }

    pub fn field_u64(mut self, key: &str, value: u64) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Add the error's message as the `error` field.
    pub fn error(self, err: &dyn std::error::Error) -> Self {
        self.field("error", err.to_string())
    }

    /// The entry this builder would emit.
    pub fn build(self) -> LogEntry {
        self.logger.entry(self.level, &self.message, self.fields)
    }

    pub fn emit(self) {
        self.build().dispatch();
    }
}
