//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::ServerConfig;
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    servers: RwLock<Vec<ServerConfig>>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial servers
    pub fn with_servers(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// Set servers directly
    pub fn set_servers(&self, servers: Vec<ServerConfig>) {
        *self.servers.write() = servers;
    }

    pub fn clear(&self) {
        self.servers.write().clear();
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn get_servers(&self) -> Vec<ServerConfig> {
        self.servers.read().clone()
    }

    async fn update_server(&self, id: &str, config: ServerConfig) -> ConfigResult<()> {
        let mut guard = self.servers.write();
        match guard.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                *existing = config;
                Ok(())
            }
            None => Err(ConfigError::ServerNotFound(id.to_string())),
        }
    }

    async fn add_server(&self, config: ServerConfig) -> ConfigResult<()> {
        let mut guard = self.servers.write();
        if guard.iter().any(|s| s.id == config.id) {
            return Err(ConfigError::ServerExists(config.id));
        }
        guard.push(config);
        Ok(())
    }

    async fn remove_server(&self, id: &str) -> ConfigResult<()> {
        let mut guard = self.servers.write();
        let original_len = guard.len();
        guard.retain(|s| s.id != id);

        if guard.len() == original_len {
            Err(ConfigError::ServerNotFound(id.to_string()))
        } else {
            Ok(())
        }
    }
}
