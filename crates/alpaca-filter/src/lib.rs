//! Response filter for the ALPaCA padding scheme.
//!
//! The host calls into a `FilterController` for every header and body event
//! of every request it serves. The controller:
//! - Decides per response whether to participate (sentinel, HTML page, paddable leaf)
//! - Accumulates bodies and drives page assemblies through their child fetches
//! - Emits exactly one final chunk per intercepted response
//! - Falls back to the unmodified response whenever padding cannot be done
//!
//! All per-request state lives in a `RequestRegistry` keyed by request identity.

mod context;
mod controller;
mod error;
mod leaf;
mod page;
mod registry;

pub use context::*;
pub use controller::*;
pub use error::*;
pub use registry::*;
