//! Python bindings for Toolhub via PyO3

use pyo3::exceptions::{PyConnectionError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use toolhub_core::config::{
    ConfigLevel as CoreConfigLevel,
    ConfigProvider as CoreConfigProvider,
    FileConfigProvider as CoreFileConfigProvider,
    ServerConfig as CoreServerConfig,
    TransportKind,
};
use toolhub_core::logging::{ConsoleLogger, LogLevel, Logger, NoOpLogger};
use toolhub_core::{
    ClientError, ClientOptions, MultiServerClient, RmcpConnector,
    ToolCall as CoreToolCall, ToolDefinition as CoreToolDefinition, ToolOutput as CoreToolOutput,
};

fn client_err(e: ClientError) -> PyErr {
    match e {
        ClientError::Connection { .. } => PyConnectionError::new_err(e.to_string()),
        ClientError::UnknownTool(_) => PyKeyError::new_err(e.to_string()),
        ClientError::InvalidTarget(_) | ClientError::Config(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn parse_arguments(arguments: Option<&str>) -> PyResult<serde_json::Value> {
    match arguments {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(json)
            .map_err(|e| PyValueError::new_err(format!("invalid JSON arguments: {}", e))),
        _ => Ok(serde_json::Value::Object(Default::default())),
    }
}

// ============================================================================
// Config Types
// ============================================================================

/// Config level enum
#[pyclass(eq, eq_int)]
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigLevel {
    User,
    Workspace,
}

#[pymethods]
impl ConfigLevel {
    fn __repr__(&self) -> String {
        match self {
            ConfigLevel::User => "ConfigLevel.User".to_string(),
            ConfigLevel::Workspace => "ConfigLevel.Workspace".to_string(),
        }
    }
}

impl From<CoreConfigLevel> for ConfigLevel {
    fn from(level: CoreConfigLevel) -> Self {
        match level {
            CoreConfigLevel::User => ConfigLevel::User,
            CoreConfigLevel::Workspace => ConfigLevel::Workspace,
        }
    }
}

impl From<ConfigLevel> for CoreConfigLevel {
    fn from(level: ConfigLevel) -> Self {
        match level {
            ConfigLevel::User => CoreConfigLevel::User,
            ConfigLevel::Workspace => CoreConfigLevel::Workspace,
        }
    }
}

/// Configured tool server
#[pyclass]
#[derive(Clone)]
pub struct ServerConfig {
    #[pyo3(get, set)]
    pub id: String,
    /// "sse" or "stdio"
    #[pyo3(get, set)]
    pub kind: String,
    #[pyo3(get, set)]
    pub url: Option<String>,
    #[pyo3(get, set)]
    pub command: Option<String>,
    #[pyo3(get, set)]
    pub args: Vec<String>,
}

#[pymethods]
impl ServerConfig {
    #[new]
    #[pyo3(signature = (id, kind, url=None, command=None, args=None))]
    pub fn new(
        id: String,
        kind: String,
        url: Option<String>,
        command: Option<String>,
        args: Option<Vec<String>>,
    ) -> Self {
        Self { id, kind, url, command, args: args.unwrap_or_default() }
    }

    fn __repr__(&self) -> String {
        format!("ServerConfig(id='{}', kind='{}')", self.id, self.kind)
    }
}

impl From<CoreServerConfig> for ServerConfig {
    fn from(config: CoreServerConfig) -> Self {
        let kind = match config.kind {
            TransportKind::Sse => "sse",
            TransportKind::Stdio => "stdio",
        };
        Self {
            id: config.id,
            kind: kind.to_string(),
            url: config.url,
            command: config.command,
            args: config.args,
        }
    }
}

impl TryFrom<ServerConfig> for CoreServerConfig {
    type Error = PyErr;

    fn try_from(config: ServerConfig) -> PyResult<Self> {
        let kind = match config.kind.to_lowercase().as_str() {
            "sse" | "http" | "stream" => TransportKind::Sse,
            "stdio" => TransportKind::Stdio,
            other => return Err(PyValueError::new_err(format!("unknown server type '{}'", other))),
        };
        Ok(CoreServerConfig {
            id: config.id,
            kind,
            url: config.url,
            command: config.command,
            args: config.args,
        })
    }
}

/// File-based server configuration (YAML)
#[pyclass]
pub struct FileConfigProvider {
    inner: Arc<CoreFileConfigProvider>,
}

impl FileConfigProvider {
    fn block_on<F: std::future::Future>(&self, future: F) -> PyResult<F::Output> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(rt.block_on(future))
    }
}

#[pymethods]
impl FileConfigProvider {
    #[new]
    #[pyo3(signature = (path=None, level=ConfigLevel::User, workspace_root=None))]
    pub fn new(path: Option<String>, level: ConfigLevel, workspace_root: Option<String>) -> Self {
        let provider = if let Some(p) = path {
            CoreFileConfigProvider::new(p, level.into())
        } else if level == ConfigLevel::Workspace {
            let root = workspace_root.unwrap_or_else(|| ".".to_string());
            CoreFileConfigProvider::workspace(root)
        } else {
            CoreFileConfigProvider::user()
        };
        Self { inner: Arc::new(provider) }
    }

    #[getter]
    pub fn path(&self) -> String {
        self.inner.path().to_string_lossy().to_string()
    }

    #[getter]
    pub fn level(&self) -> ConfigLevel {
        self.inner.level().into()
    }

    pub fn exists(&self) -> bool {
        self.inner.exists()
    }

    pub fn get_servers(&self) -> PyResult<Vec<ServerConfig>> {
        let servers = self.block_on(self.inner.get_servers())?;
        Ok(servers.into_iter().map(ServerConfig::from).collect())
    }

    pub fn add_server(&self, config: ServerConfig) -> PyResult<()> {
        let config = CoreServerConfig::try_from(config)?;
        self.block_on(self.inner.add_server(config))?
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn update_server(&self, id: String, config: ServerConfig) -> PyResult<()> {
        let config = CoreServerConfig::try_from(config)?;
        self.block_on(self.inner.update_server(&id, config))?
            .map_err(|e| PyKeyError::new_err(e.to_string()))
    }

    pub fn remove_server(&self, id: String) -> PyResult<()> {
        self.block_on(self.inner.remove_server(&id))?
            .map_err(|e| PyKeyError::new_err(e.to_string()))
    }

    pub fn reload(&self) -> PyResult<()> {
        self.inner.reload()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(())
    }

    pub fn backup(&self) -> PyResult<Option<String>> {
        let backup_path = self.inner.backup()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(backup_path.map(|p| p.to_string_lossy().to_string()))
    }

    pub fn export_json(&self) -> PyResult<String> {
        self.inner.export_json()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Replace the servers with those of an `{"mcpServers": {...}}` document
    pub fn import_mcp_json(&self, json: String) -> PyResult<usize> {
        self.inner.import_mcp_json(&json)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "FileConfigProvider(level={:?}, path='{}', exists={})",
            self.level(),
            self.path(),
            self.exists()
        )
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// Tool definition for a planning loop
#[pyclass]
#[derive(Clone)]
pub struct ToolDefinition {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub description: String,
    #[pyo3(get)]
    pub parameters: String,  // JSON Schema string
}

#[pymethods]
impl ToolDefinition {
    fn __repr__(&self) -> String {
        format!("ToolDefinition(name='{}', description='{}')", self.name, self.description)
    }
}

impl From<CoreToolDefinition> for ToolDefinition {
    fn from(tool: CoreToolDefinition) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            parameters: tool.parameters.to_string(),
        }
    }
}

/// Result of running a tool: exactly one of `output` and `error` is set
#[pyclass]
#[derive(Clone)]
pub struct ToolOutput {
    #[pyo3(get)]
    pub output: Option<String>,
    #[pyo3(get)]
    pub error: Option<String>,
}

#[pymethods]
impl ToolOutput {
    #[getter]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn __repr__(&self) -> String {
        match (&self.output, &self.error) {
            (_, Some(error)) => format!("ToolOutput(error='{}')", error),
            (Some(output), None) => format!("ToolOutput(output='{}')", output),
            (None, None) => "ToolOutput()".to_string(),
        }
    }
}

impl From<CoreToolOutput> for ToolOutput {
    fn from(output: CoreToolOutput) -> Self {
        match output {
            CoreToolOutput::Output(text) => Self { output: Some(text), error: None },
            CoreToolOutput::Error(message) => Self { output: None, error: Some(message) },
        }
    }
}

/// Tool result for a tool call
#[pyclass]
#[derive(Clone)]
pub struct ToolResult {
    #[pyo3(get)]
    pub call_id: String,
    #[pyo3(get)]
    pub content: String,
    #[pyo3(get)]
    pub is_error: bool,
}

#[pymethods]
impl ToolResult {
    fn __repr__(&self) -> String {
        format!("ToolResult(call_id='{}', is_error={})", self.call_id, self.is_error)
    }
}

/// Operation reported by a live server
#[pyclass]
#[derive(Clone)]
pub struct RemoteOperation {
    #[pyo3(get)]
    pub server_id: String,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub description: String,
    #[pyo3(get)]
    pub input_schema: String,  // JSON string
}

#[pymethods]
impl RemoteOperation {
    fn __repr__(&self) -> String {
        format!("RemoteOperation(server_id='{}', name='{}')", self.server_id, self.name)
    }
}

// ============================================================================
// ToolHub
// ============================================================================

/// Multi-server MCP client with its own Tokio runtime
#[pyclass]
pub struct ToolHub {
    runtime: tokio::runtime::Runtime,
    client: MultiServerClient,
}

impl ToolHub {
    fn build(options: ClientOptions, verbose: bool) -> PyResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;

        let logger: Arc<dyn Logger> = if verbose {
            Arc::new(ConsoleLogger::new().with_threshold(LogLevel::Debug))
        } else {
            NoOpLogger::shared()
        };
        let connector = Arc::new(RmcpConnector::new(Arc::clone(&logger)));
        let client = MultiServerClient::with_options(connector, options, logger);

        Ok(Self { runtime, client })
    }
}

#[pymethods]
impl ToolHub {
    #[new]
    #[pyo3(signature = (teardown_timeout_secs=5.0, verbose=false))]
    pub fn new(teardown_timeout_secs: f64, verbose: bool) -> PyResult<Self> {
        if !(teardown_timeout_secs.is_finite() && teardown_timeout_secs > 0.0) {
            return Err(PyValueError::new_err("teardown_timeout_secs must be a positive number"));
        }

        let options = ClientOptions {
            teardown_timeout: Duration::from_secs_f64(teardown_timeout_secs),
        };
        Self::build(options, verbose)
    }

    /// Client whose settings (teardown timeout) come from a config file
    #[staticmethod]
    #[pyo3(signature = (config, verbose=false))]
    pub fn from_config(config: &FileConfigProvider, verbose: bool) -> PyResult<Self> {
        let settings = config
            .inner
            .get_settings()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Self::build(ClientOptions::from(&settings), verbose)
    }

    /// Teardown bound in seconds
    #[getter]
    pub fn teardown_timeout_secs(&self) -> f64 {
        self.client.options().teardown_timeout.as_secs_f64()
    }

    /// Connect to a network-stream server; returns the registered tool names
    #[pyo3(signature = (url, server_id=None))]
    pub fn connect_sse(&self, py: Python<'_>, url: String, server_id: Option<String>) -> PyResult<Vec<String>> {
        py.allow_threads(|| {
            self.runtime
                .block_on(self.client.connect_stream(&url, server_id.as_deref()))
        })
        .map_err(client_err)
    }

    /// Start a server process and connect over stdio
    #[pyo3(signature = (command, args=None, server_id=None))]
    pub fn connect_stdio(
        &self,
        py: Python<'_>,
        command: String,
        args: Option<Vec<String>>,
        server_id: Option<String>,
    ) -> PyResult<Vec<String>> {
        let args = args.unwrap_or_default();
        py.allow_threads(|| {
            self.runtime
                .block_on(self.client.connect_process(&command, args, server_id.as_deref()))
        })
        .map_err(client_err)
    }

    /// Connect every server in a config file; returns `(server_id, error)` pairs
    pub fn connect_configured(&self, py: Python<'_>, config: &FileConfigProvider) -> Vec<(String, String)> {
        let provider = Arc::clone(&config.inner);
        py.allow_threads(|| {
            self.runtime
                .block_on(self.client.connect_configured(provider.as_ref()))
                .into_iter()
                .map(|(id, e)| (id, e.to_string()))
                .collect()
        })
    }

    /// Disconnect one server, or all of them
    #[pyo3(signature = (server_id=None))]
    pub fn disconnect(&self, py: Python<'_>, server_id: Option<String>) -> PyResult<()> {
        py.allow_threads(|| self.runtime.block_on(self.client.disconnect(server_id.as_deref())))
            .map_err(client_err)
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.client.list_tools().into_iter().map(ToolDefinition::from).collect()
    }

    /// Run a tool by registry name with JSON arguments
    #[pyo3(signature = (name, arguments=None))]
    pub fn execute(&self, py: Python<'_>, name: String, arguments: Option<String>) -> PyResult<ToolOutput> {
        let arguments = parse_arguments(arguments.as_deref())?;
        py.allow_threads(|| self.runtime.block_on(self.client.execute(&name, arguments)))
            .map(ToolOutput::from)
            .map_err(client_err)
    }

    /// Run a tool call envelope; unknown tools become error results
    pub fn execute_tool_call(&self, py: Python<'_>, id: String, name: String, input: String) -> PyResult<ToolResult> {
        let call = CoreToolCall::new(id, name, parse_arguments(Some(input.as_str()))?);
        let registry = self.client.registry();
        let result = py.allow_threads(|| self.runtime.block_on(registry.execute_tool_call(&call)));
        Ok(ToolResult {
            call_id: result.call_id,
            content: result.content,
            is_error: result.is_error,
        })
    }

    /// Query every live server for its operations (diagnostics)
    pub fn list_remote_operations(&self, py: Python<'_>) -> Vec<RemoteOperation> {
        py.allow_threads(|| self.runtime.block_on(self.client.list_remote_operations()))
            .into_iter()
            .map(|(server_id, op)| RemoteOperation {
                server_id,
                name: op.name,
                description: op.description,
                input_schema: op.input_schema.to_string(),
            })
            .collect()
    }

    pub fn connected_servers(&self) -> Vec<String> {
        self.client.connected_servers()
    }

    pub fn is_connected(&self, server_id: &str) -> bool {
        self.client.is_connected(server_id)
    }

    fn __repr__(&self) -> String {
        format!(
            "ToolHub(servers={:?}, tools={})",
            self.client.connected_servers(),
            self.client.registry().len()
        )
    }
}

impl Drop for ToolHub {
    fn drop(&mut self) {
        self.client.cancellation_token().cancel();
        let _ = self.runtime.block_on(self.client.disconnect(None));
    }
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
fn toolhub(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Config Types
    m.add_class::<ConfigLevel>()?;
    m.add_class::<ServerConfig>()?;
    m.add_class::<FileConfigProvider>()?;

    // Tool Types
    m.add_class::<ToolDefinition>()?;
    m.add_class::<ToolOutput>()?;
    m.add_class::<ToolResult>()?;
    m.add_class::<RemoteOperation>()?;

    // Client
    m.add_class::<ToolHub>()?;

    Ok(())
}
