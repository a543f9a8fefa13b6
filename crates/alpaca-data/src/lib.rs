//! Child fetch layer for page assemblies.
//!
//! This crate provides:
//! - `ChildFetcher` - Host hook that starts an internal fetch
//! - `ChildOutcome` - Captured body or failure of a finished child
//! - `QueuedFetcher` - In-memory fetcher for embedding and tests

mod child;
mod queue;

pub use child::*;
pub use queue::*;
