//! Core types for the ALPaCA response padding filter.
//!
//! This crate provides the fundamental types shared by every stage:
//! - `ScopeConfig` / `FilterConfig` - Per-scope settings and their validation
//! - `RequestId` / `ResponseHead` - Request identity and header events
//! - `FilterPhase` - Per-request lifecycle tracking
//! - `FilterLimits` - Resource caps that force pass-through

mod config;
mod context;
mod lifecycle;
mod limits;

pub use config::*;
pub use context::*;
pub use lifecycle::*;
pub use limits::*;
