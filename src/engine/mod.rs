//! The turn engine: continuation loop, client sink and turn outcomes.

pub mod controller;
pub mod sink;
pub mod state;

pub use controller::{ContinuationController, TurnRequest};
pub use sink::ChunkSink;
pub use state::{ControllerState, TurnOutcome, TurnStatus};
