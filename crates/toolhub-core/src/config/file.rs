//! YAML server list on disk
//!
//! One file per level: `~/.config/toolhub/servers.yaml` for the user and
//! `<root>/.config/toolhub/servers.yaml` for a workspace.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::server::{ClientSettings, McpServersDocument, ServerConfig};
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// On-disk layout of `servers.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Configured servers, connected in this order
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ClientSettings>,
}

/// Where a server list lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/toolhub/servers.yaml)
    User,
    /// Workspace-level config (.config/toolhub/servers.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// Server list backed by a YAML file, cached after the first read
///
/// ```no_run
/// use toolhub_core::config::FileConfigProvider;
///
/// let mine = FileConfigProvider::user();
/// let project = FileConfigProvider::workspace("/srv/project");
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<ConfigFile>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/toolhub/servers.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("toolhub").join("servers.yaml"), ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/toolhub/servers.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("toolhub").join("servers.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> ConfigResult<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Other(format!("Failed to parse YAML: {}", e)))
    }

    fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(config)
            .map_err(|e| ConfigError::Other(format!("Failed to serialize YAML: {}", e)))?;
        fs::write(&self.path, content)?;

        *self.cache.write() = Some(config.clone());
        Ok(())
    }

    fn get_config(&self) -> ConfigResult<ConfigFile> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }
        self.reload()
    }

    /// Drop the cache and read the file again
    pub fn reload(&self) -> ConfigResult<ConfigFile> {
        let config = self.load()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Client settings, defaulted when absent
    pub fn get_settings(&self) -> ConfigResult<ClientSettings> {
        Ok(self.get_config()?.settings.unwrap_or_default())
    }

    pub fn set_settings(&self, settings: ClientSettings) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        config.settings = Some(settings);
        self.save(&config)
    }

    /// Copy the file to `servers.yaml.backup`; None when there is no file yet
    pub fn backup(&self) -> ConfigResult<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }

        let backup_path = self.path.with_extension("yaml.backup");
        fs::copy(&self.path, &backup_path)?;
        Ok(Some(backup_path))
    }

    /// Export config as JSON
    pub fn export_json(&self) -> ConfigResult<String> {
        let config = self.get_config()?;
        Ok(serde_json::to_string_pretty(&config)?)
    }

    /// Replace the server list with the entries of an `mcpServers` document
    ///
    /// Entries are validated before anything is written. Settings are kept.
    pub fn import_mcp_json(&self, json: &str) -> ConfigResult<usize> {
        let document: McpServersDocument = serde_json::from_str(json)?;
        let servers = document.into_servers();
        for server in &servers {
            server.to_target()?;
        }

        let count = servers.len();
        let mut config = self.get_config()?;
        config.servers = servers;
        self.save(&config)?;
        Ok(count)
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn get_servers(&self) -> Vec<ServerConfig> {
        self.get_config().map(|c| c.servers).unwrap_or_default()
    }

    async fn update_server(&self, id: &str, config: ServerConfig) -> ConfigResult<()> {
        let mut file_config = self.get_config()?;
        match file_config.servers.iter_mut().find(|s| s.id == id) {
            Some(existing) => *existing = config,
            None => return Err(ConfigError::ServerNotFound(id.to_string())),
        }
        self.save(&file_config)
    }

    async fn add_server(&self, config: ServerConfig) -> ConfigResult<()> {
        let mut file_config = self.get_config()?;
        if file_config.servers.iter().any(|s| s.id == config.id) {
            return Err(ConfigError::ServerExists(config.id));
        }
        file_config.servers.push(config);
        self.save(&file_config)
    }

    async fn remove_server(&self, id: &str) -> ConfigResult<()> {
        let mut file_config = self.get_config()?;
        let original_len = file_config.servers.len();
        file_config.servers.retain(|s| s.id != id);

        if file_config.servers.len() == original_len {
            Err(ConfigError::ServerNotFound(id.to_string()))
        } else {
            self.save(&file_config)
        }
    }
}
