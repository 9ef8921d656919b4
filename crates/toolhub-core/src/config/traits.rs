//! Configuration provider trait

use async_trait::async_trait;

use super::server::ServerConfig;

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: Reads from YAML file (~/.config/toolhub/servers.yaml)
///
/// Server ids are matched case-sensitively since they end up in registry
/// names.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Get all configured servers, in file order
    async fn get_servers(&self) -> Vec<ServerConfig>;

    /// Update a server's configuration
    async fn update_server(&self, id: &str, config: ServerConfig) -> ConfigResult<()>;

    /// Add a new server
    async fn add_server(&self, config: ServerConfig) -> ConfigResult<()>;

    /// Remove a server
    async fn remove_server(&self, id: &str) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server already exists: {0}")]
    ServerExists(String),

    #[error("Invalid server '{id}': {reason}")]
    InvalidServer { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
