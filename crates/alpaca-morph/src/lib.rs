//! Morph engine boundary.
//!
//! The engine decides padding sizes and rewrites documents; the filter only
//! moves bytes in and out of it:
//! - `MorphRequest` - Content plus page parameters handed to the engine
//! - `MorphEngine` - The five engine operations and buffer release
//! - `Morph` - Transfer-then-release glue around an engine

mod engine;
mod request;

pub use engine::*;
pub use request::*;
