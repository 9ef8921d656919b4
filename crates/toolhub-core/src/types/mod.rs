//! Core types shared by the registry, the client and the bindings

mod tool;
mod cancellation;

pub use tool::{ToolCall, ToolDefinition, ToolOutput, ToolResult};
pub use cancellation::CancellationToken;
