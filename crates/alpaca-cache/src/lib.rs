//! Captured object storage for one page assembly.
//!
//! - `ResponseCache` - Referenced URI to captured bytes, disposed with its page

mod response;

pub use response::*;
