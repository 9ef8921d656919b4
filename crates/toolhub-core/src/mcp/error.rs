//! Transport and session errors

use thiserror::Error;

/// MCP session errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A release action observed cancellation instead of finishing
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl McpError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, McpError::Cancelled(_))
    }
}

pub type McpResult<T> = Result<T, McpError>;
