//! Subrequest orchestration for page assemblies.
//!
//! This crate drives the child-fetch protocol of one HTML page:
//! - `PageAssembly` - Per-page discovery, issuance, fan-in and render
//! - `RoundTracker` - Expected/completed accounting of one discovery round
//! - `RenderedPage` - The single final body of a page

mod assembly;
mod render;
mod round;

pub use assembly::*;
pub use render::*;
pub use round::*;
