//! Observability for the ALPaCA padding filter.
//!
//! This crate provides:
//! - `FilterLogger` - Request-scoped structured logging over `tracing`
//! - `MetricsCollector` / `PageMetrics` - Per-page assembly counters
//! - `init_tracing` - Subscriber setup for binaries

mod init;
mod logging;
mod metrics;

pub use init::*;
pub use logging::*;
pub use metrics::*;

pub use alpaca_core::RequestId;
