//! Body streaming primitives for the padding filter.
//!
//! This crate models the body side of a response:
//! - `BodyChain` / `Fragment` - Ordered body fragments with an end-of-body flag
//! - `ResponseAccumulator` - Rebuilds one complete body across invocations
//! - `Downstream` - The next stage in the output pipeline
//! - `FinalEmitter` - Guarantees a single final chunk per request

mod accumulator;
mod chain;
mod sink;

pub use accumulator::*;
pub use chain::*;
pub use sink::*;
