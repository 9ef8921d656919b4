//! Tool registry shared by local and remote tools
//!
//! The ToolRegistry is the single lookup table a planning loop sees:
//! - Local tools registered by the host application
//! - Proxies for operations discovered on connected providers
//! - Dispatch of tool calls by registry name

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::proxy::RemoteToolProxy;
use crate::error::{ClientError, ClientResult};
use crate::logging::Logger;
use crate::types::{ToolCall, ToolDefinition, ToolOutput, ToolResult};

/// A tool implemented in-process by the host application
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, arguments: Value) -> ToolOutput;
}

/// One entry of the registry
#[derive(Clone)]
pub enum RegisteredTool {
    Local(Arc<dyn LocalTool>),
    Remote(Arc<RemoteToolProxy>),
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        match self {
            RegisteredTool::Local(tool) => tool.name(),
            RegisteredTool::Remote(proxy) => proxy.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RegisteredTool::Local(tool) => tool.description(),
            RegisteredTool::Remote(proxy) => proxy.description(),
        }
    }

    pub fn parameters(&self) -> Value {
        match self {
            RegisteredTool::Local(tool) => tool.parameters(),
            RegisteredTool::Remote(proxy) => proxy.parameters().clone(),
        }
    }

    /// Owning server for remote tools
    pub fn server_id(&self) -> Option<&str> {
        match self {
            RegisteredTool::Local(_) => None,
            RegisteredTool::Remote(proxy) => Some(proxy.server_id()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RegisteredTool::Remote(_))
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(self.parameters())
    }

    pub async fn execute(&self, arguments: Value) -> ToolOutput {
        match self {
            RegisteredTool::Local(tool) => tool.execute(arguments).await,
            RegisteredTool::Remote(proxy) => proxy.execute(arguments).await,
        }
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name())
            .field("server_id", &self.server_id())
            .finish()
    }
}

/// Tool registry keyed by registry name, in registration order
pub struct ToolRegistry {
    entries: RwLock<Vec<RegisteredTool>>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            logger,
        }
    }

    /// Register a local tool; a later registration under the same name wins
    pub fn register(&self, tool: Arc<dyn LocalTool>) {
        let mut entries = self.entries.write();
        Self::insert(&mut entries, RegisteredTool::Local(tool), self.logger.as_ref());
    }

    /// Replace every tool owned by `server_id` with `proxies`
    ///
    /// Runs under one write lock, so readers see either the old set or the
    /// new one.
    pub fn merge(&self, server_id: &str, proxies: Vec<Arc<RemoteToolProxy>>) {
        let mut entries = self.entries.write();
        entries.retain(|entry| entry.server_id() != Some(server_id));
        for proxy in proxies {
            Self::insert(&mut entries, RegisteredTool::Remote(proxy), self.logger.as_ref());
        }
    }

    /// Give the tools of `server_id` the names chosen by `rename`
    ///
    /// Entries keep their position. Nothing is added when the server has no
    /// entries left, so a concurrent removal is never undone. Returns the
    /// number of renamed tools.
    pub fn rename_server_tools(&self, server_id: &str, rename: impl Fn(&RemoteToolProxy) -> String) -> usize {
        let mut entries = self.entries.write();
        let current = std::mem::take(&mut *entries);
        let mut renamed = 0;

        for entry in current {
            let entry = match entry {
                RegisteredTool::Remote(proxy) if proxy.server_id() == server_id => {
                    let name = rename(&proxy);
                    if name == proxy.name() {
                        RegisteredTool::Remote(proxy)
                    } else {
                        renamed += 1;
                        RegisteredTool::Remote(Arc::new(proxy.renamed(name)))
                    }
                }
                other => other,
            };
            Self::insert(&mut entries, entry, self.logger.as_ref());
        }

        renamed
    }

    fn insert(entries: &mut Vec<RegisteredTool>, tool: RegisteredTool, logger: &dyn Logger) {
        match entries.iter_mut().find(|entry| entry.name() == tool.name()) {
            Some(existing) => {
                if existing.server_id() != tool.server_id() {
                    logger.warn(&format!(
                        "Tool '{}' from {} replaces the one from {}",
                        tool.name(),
                        owner_label(tool.server_id()),
                        owner_label(existing.server_id()),
                    ));
                }
                *existing = tool;
            }
            None => entries.push(tool),
        }
    }

    /// Drop every tool owned by `server_id`, returning how many went away
    pub fn remove_server(&self, server_id: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.server_id() != Some(server_id));
        before - entries.len()
    }

    /// Drop every remote tool, keeping local ones
    pub fn clear_remote(&self) {
        self.entries.write().retain(|entry| !entry.is_remote());
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn get(&self, name: &str) -> Option<RegisteredTool> {
        self.entries.read().iter().find(|entry| entry.name() == name).cloned()
    }

    /// Owning server of a remote tool
    pub fn owner(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|entry| entry.server_id().map(str::to_string))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|entry| entry.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|entry| entry.name().to_string()).collect()
    }

    /// Registry names of the tools owned by `server_id`
    pub fn tools_for_server(&self, server_id: &str) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.server_id() == Some(server_id))
            .map(|entry| entry.name().to_string())
            .collect()
    }

    /// Definitions of every registered tool
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.entries.read().iter().map(RegisteredTool::definition).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run a tool by registry name
    ///
    /// Only an unknown name is an `Err`; tool failures come back as
    /// [`ToolOutput::Error`].
    pub async fn execute(&self, name: &str, arguments: Value) -> ClientResult<ToolOutput> {
        let tool = self.get(name).ok_or_else(|| ClientError::UnknownTool(name.to_string()))?;
        Ok(tool.execute(arguments).await)
    }

    /// Execute a tool call from a planning loop
    pub async fn execute_tool_call(&self, tool_call: &ToolCall) -> ToolResult {
        self.logger.info(&format!("Calling tool: {}", tool_call.name));
        match self.execute(&tool_call.name, tool_call.input.clone()).await {
            Ok(output) => ToolResult::from_output(&tool_call.id, output),
            Err(e) => ToolResult::error(&tool_call.id, e.to_string()),
        }
    }

    /// Execute multiple tool calls in order
    pub async fn execute_tool_calls(&self, tool_calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            results.push(self.execute_tool_call(call).await);
        }
        results
    }
}

fn owner_label(server_id: Option<&str>) -> String {
    match server_id {
        Some(id) => format!("server '{}'", id),
        None => "the host".to_string(),
    }
}
