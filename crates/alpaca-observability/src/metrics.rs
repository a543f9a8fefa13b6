//! Per-page assembly metrics.

use std::time::{Duration, Instant};

use alpaca_core::RequestId;
use serde::{Deserialize, Serialize};

/// Metrics for one finished page assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    pub uri: String,
    /// Discovery rounds that issued children.
    pub rounds: u32,
    pub children_issued: usize,
    pub children_refused: usize,
    pub children_failed: usize,
    /// Bytes captured from children.
    pub captured_bytes: usize,
    /// Size of the emitted page.
    pub final_size: usize,
    /// Whether the original page was served instead of a rendered one.
    pub render_fell_back: bool,
    /// Time from interception until the page body was complete (microseconds).
    pub capture_us: Option<u64>,
    /// Time spent waiting for child fetches (microseconds).
    pub children_wait_us: Option<u64>,
    /// Time from the first body event to the final chunk (microseconds).
    pub total_duration_us: u64,
}

/// Collects metrics while a page is assembled.
#[derive(Debug)]
pub struct MetricsCollector {
    request_id: RequestId,
    uri: String,
    start: Instant,
    rounds: u32,
    children_issued: usize,
    children_refused: usize,
    children_failed: usize,
    captured_bytes: usize,
    final_size: Option<usize>,
    render_fell_back: bool,
    capture: Option<Duration>,
    children_wait: Option<Duration>,
}

impl MetricsCollector {
    pub fn new(request_id: RequestId, uri: impl Into<String>) -> Self {
        Self {
            request_id,
            uri: uri.into(),
            start: Instant::now(),
            rounds: 0,
            children_issued: 0,
            children_refused: 0,
            children_failed: 0,
            captured_bytes: 0,
            final_size: None,
            render_fell_back: false,
            capture: None,
            children_wait: None,
        }
    }

    /// Record the issuance of one discovery round.
    pub fn record_round(&mut self, issued: usize, refused: usize) {
        self.rounds += 1;
        self.children_issued += issued;
        self.children_refused += refused;
    }

    /// Record a finished child.
    pub fn record_child(&mut self, captured_bytes: Option<usize>) {
        match captured_bytes {
            Some(bytes) => self.captured_bytes += bytes,
            None => self.children_failed += 1,
        }
    }

    /// Record the emitted page.
    pub fn record_final(&mut self, size: usize, fell_back: bool) {
        self.final_size = Some(size);
        self.render_fell_back = fell_back;
    }

    /// Record how long the page spent capturing its body and waiting for children.
    pub fn record_phases(&mut self, capture: Option<Duration>, children_wait: Option<Duration>) {
        self.capture = capture;
        self.children_wait = children_wait;
    }

    /// Finalize and return the metrics.
    pub fn finalize(self) -> PageMetrics {
        PageMetrics {
            request_id: self.request_id.to_string(),
            uri: self.uri,
            rounds: self.rounds,
            children_issued: self.children_issued,
            children_refused: self.children_refused,
            children_failed: self.children_failed,
            captured_bytes: self.captured_bytes,
            final_size: self.final_size.unwrap_or(0),
            render_fell_back: self.render_fell_back,
            capture_us: self.capture.map(|d| d.as_micros() as u64),
            children_wait_us: self.children_wait.map(|d| d.as_micros() as u64),
            total_duration_us: self.start.elapsed().as_micros() as u64,
        }
    }
}
