//! Sandboxed tool subsystem: filesystem, shell, and completion tools, all
//! resolved through `PathGuard` and invoked through `ToolRegistry`.

pub mod complete;
pub mod filesystem;
pub mod integrity;
pub mod registry;
pub mod shell;
pub mod types;

pub use registry::ToolRegistry;
pub use types::{CancellationToken, Tool, ToolCategory, ToolContext, ToolResponse, ToolStatus};
