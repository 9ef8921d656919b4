//! Client and registry errors

use std::time::Duration;

use thiserror::Error;

use crate::client::ConnectionState;
use crate::config::ConfigError;
use crate::mcp::McpError;

/// Errors raised by connection lifecycle and registry dispatch
///
/// Only lifecycle calls (`connect`, `disconnect`) and registry lookups return
/// these. `NotConnected` and `RemoteExecution` are rendered into a
/// [`ToolOutput::Error`](crate::types::ToolOutput) by the tool itself.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport or handshake failure during connect
    #[error("failed to connect to server '{server_id}': {source}")]
    Connection {
        server_id: String,
        #[source]
        source: McpError,
    },

    /// Empty URL or command
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("not connected to server '{0}'")]
    NotConnected(String),

    #[error("Error executing tool: {0}")]
    RemoteExecution(String),

    #[error("disconnect from server '{server_id}' timed out after {timeout:?}")]
    TeardownTimeout { server_id: String, timeout: Duration },

    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    #[error("server '{server_id}' cannot move from {from} to {to}")]
    InvalidState {
        server_id: String,
        from: ConnectionState,
        to: ConnectionState,
    },

    /// The teardown task itself failed (panicked)
    #[error("teardown of server '{server_id}' failed: {reason}")]
    Teardown { server_id: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn connection(server_id: impl Into<String>, source: McpError) -> Self {
        Self::Connection {
            server_id: server_id.into(),
            source,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
