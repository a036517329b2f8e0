//! Tool-call reassembly from streamed deltas.

pub mod accumulator;
pub mod repair;

pub use accumulator::{DeltaAccumulator, ForcedCompletion};
pub use repair::repair;
