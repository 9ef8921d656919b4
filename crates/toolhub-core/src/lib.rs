//! Toolhub Core
//!
//! Runtime-agnostic multi-server tool client for the Model Context Protocol.
//! This crate can be used from any environment (Python via PyO3, native
//! CLI, etc.)
//!
//! ## Tool Orchestration
//!
//! [`MultiServerClient`] keeps one session per tool provider and publishes
//! every discovered operation into a shared [`ToolRegistry`]:
//! - Connect over a network stream or a child process
//! - Registry names are unique and valid identifiers
//! - Disconnects are bounded by a timeout and never leave stale tools
//!
//! ```rust,ignore
//! use toolhub_core::{MultiServerClient, NoOpLogger, FileConfigProvider};
//!
//! let client = MultiServerClient::with_rmcp(Arc::new(NoOpLogger::new()));
//! let failures = client.connect_configured(&FileConfigProvider::user()).await;
//!
//! // Tools for a planning loop
//! let tools = client.list_tools();
//!
//! // Execute tool calls from an LLM response
//! let results = client.registry().execute_tool_calls(&tool_calls).await;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod mcp;
pub mod tools;
pub mod client;
pub mod error;

// Re-export commonly used types
pub use types::{CancellationToken, ToolCall, ToolDefinition, ToolOutput, ToolResult};

pub use logging::{ConsoleLogger, LogLevel, Logger, NoOpLogger, RecordingLogger};

pub use config::{
    ClientSettings, ConfigError, ConfigProvider, ConfigResult, FileConfigProvider,
    MemoryConfigProvider, ServerConfig, TransportKind,
};

pub use mcp::{Connector, McpError, McpResult, RemoteOperation, RmcpConnector, ToolSession, TransportTarget};

pub use tools::{LocalTool, RegisteredTool, RemoteToolProxy, ToolRegistry};

pub use client::{ClientOptions, ConnectionState, MultiServerClient};

pub use error::{ClientError, ClientResult};
