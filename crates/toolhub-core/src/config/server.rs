//! Server entries as stored in configuration

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};
use crate::mcp::TransportTarget;

/// Default bound on a single disconnect
pub const DEFAULT_TEARDOWN_TIMEOUT_SECS: u64 = 5;

/// How a configured server is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Network stream at `url`
    #[serde(alias = "http", alias = "stream")]
    Sse,
    /// Child process started from `command` and `args`
    Stdio,
}

/// One configured tool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server id, used to prefix tool names
    pub id: String,

    #[serde(rename = "type")]
    pub kind: TransportKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl ServerConfig {
    pub fn sse(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TransportKind::Sse,
            url: Some(url.into()),
            command: None,
            args: Vec::new(),
        }
    }

    pub fn stdio(id: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind: TransportKind::Stdio,
            url: None,
            command: Some(command.into()),
            args,
        }
    }

    /// Transport target for this entry
    pub fn to_target(&self) -> ConfigResult<TransportTarget> {
        let missing = |field: &str| ConfigError::InvalidServer {
            id: self.id.clone(),
            reason: format!("missing '{}'", field),
        };

        match self.kind {
            TransportKind::Sse => {
                let url = self.url.as_deref().filter(|u| !u.trim().is_empty()).ok_or_else(|| missing("url"))?;
                Ok(TransportTarget::stream(url))
            }
            TransportKind::Stdio => {
                let command = self
                    .command
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| missing("command"))?;
                Ok(TransportTarget::process(command, self.args.iter().cloned()))
            }
        }
    }
}

/// Client behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Seconds to wait for one server's teardown
    #[serde(default = "default_teardown_timeout_secs")]
    pub teardown_timeout_secs: u64,
}

fn default_teardown_timeout_secs() -> u64 {
    DEFAULT_TEARDOWN_TIMEOUT_SECS
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            teardown_timeout_secs: DEFAULT_TEARDOWN_TIMEOUT_SECS,
        }
    }
}

impl ClientSettings {
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }
}

/// `{"mcpServers": {id: {...}}}` document used by editor integrations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServersDocument {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    #[serde(rename = "type")]
    pub kind: TransportKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl McpServersDocument {
    /// Server entries, ordered by id
    pub fn into_servers(self) -> Vec<ServerConfig> {
        self.mcp_servers
            .into_iter()
            .map(|(id, entry)| ServerConfig {
                id,
                kind: entry.kind,
                url: entry.url,
                command: entry.command,
                args: entry.args,
            })
            .collect()
    }
}
