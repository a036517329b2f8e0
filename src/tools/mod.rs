//! Tool system: routing, registries and dispatch.

pub mod dispatcher;
pub mod external;
pub mod registry;
pub mod route;
pub mod tool;
pub mod types;

pub use dispatcher::{BatchRun, ToolDispatcher, DEFAULT_TOOL_TIMEOUT};
pub use external::{ExternalToolRegistry, ServerStatus, ServerTool, ToolServer};
pub use registry::InternalToolRegistry;
pub use route::ToolRoute;
pub use tool::{FnTool, Tool, ToolContext};
pub use types::{ToolDefinition, ToolParameters, ToolResult};
