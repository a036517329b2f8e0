//! Core types for turnloop.

pub mod chunk;
pub mod message;
pub mod tool_call;

pub use chunk::*;
pub use message::*;
pub use tool_call::*;
