//! Multi-server client
//!
//! Keeps one [`ServerConnection`] per server id, publishes each provider's
//! operations into a shared [`ToolRegistry`], and tears connections down
//! under a bounded timeout.
//!
//! ```rust,ignore
//! use toolhub_core::{ConsoleLogger, MultiServerClient};
//!
//! let client = MultiServerClient::with_rmcp(Arc::new(ConsoleLogger::new()));
//! client.connect_stream("http://localhost:8000/sse", Some("weather")).await?;
//! client.connect_process("uvx", ["mcp-server-time"], Some("time")).await?;
//!
//! let output = client.execute("weather_get_alerts", json!({ "state": "CA" })).await?;
//!
//! client.disconnect(None).await?;
//! ```

mod connection;

pub use connection::{ConnectionState, ServerConnection, TeardownOutcome};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use crate::config::{ClientSettings, ConfigProvider, DEFAULT_TEARDOWN_TIMEOUT_SECS};
use crate::error::{ClientError, ClientResult};
use crate::logging::Logger;
use crate::mcp::{Connector, McpResult, RemoteOperation, RmcpConnector, TeardownScope, ToolSession, TransportTarget};
use crate::tools::{registry_name, RemoteToolProxy, ToolRegistry};
use crate::types::{CancellationToken, ToolDefinition, ToolOutput};
use crate::{log_debug, log_error, log_info, log_warn};
use connection::release_scope;

/// Client behavior knobs
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bound on one server's teardown
    pub teardown_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            teardown_timeout: Duration::from_secs(DEFAULT_TEARDOWN_TIMEOUT_SECS),
        }
    }
}

impl From<&ClientSettings> for ClientOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            teardown_timeout: settings.teardown_timeout(),
        }
    }
}

type LifecycleGuard = OwnedMutexGuard<()>;

struct ClientInner {
    connector: Arc<dyn Connector>,
    /// Live connections in insertion order
    connections: RwLock<Vec<Arc<ServerConnection>>>,
    registry: Arc<ToolRegistry>,
    /// Serializes connect/disconnect per server id
    lifecycle_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Shared by per-id operations, exclusive for disconnect-all
    gate: Arc<tokio::sync::RwLock<()>>,
    options: ClientOptions,
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl ClientInner {
    async fn lock_server(&self, server_id: &str) -> LifecycleGuard {
        let lock = Arc::clone(self.lifecycle_locks.lock().entry(server_id.to_string()).or_default());
        lock.lock_owned().await
    }

    /// Release a server's lock, dropping its entry when nobody else wants it
    fn unlock_server(&self, server_id: &str, guard: LifecycleGuard) {
        let mut locks = self.lifecycle_locks.lock();
        // The map and `guard` hold the only references when nobody is waiting.
        let idle = locks.get(server_id).is_some_and(|lock| Arc::strong_count(lock) <= 2);
        if idle && self.find(server_id).is_none() {
            locks.remove(server_id);
        }
        drop(guard);
    }

    /// Tear down `server_id` if it is connected, holding its lock throughout
    async fn teardown_locked(&self, server_id: &str, held: Option<LifecycleGuard>) -> LifecycleGuard {
        let guard = match held {
            Some(guard) => guard,
            None => self.lock_server(server_id).await,
        };
        if let Some(connection) = self.find(server_id) {
            self.teardown(&connection).await;
        }
        guard
    }

    /// Tear down every connection and clear the remote tools
    async fn teardown_all(&self) {
        let ids: Vec<String> = self.connections.read().iter().map(|c| c.server_id().to_string()).collect();
        for id in ids {
            let guard = self.teardown_locked(&id, None).await;
            self.unlock_server(&id, guard);
        }

        let leftover = std::mem::take(&mut *self.connections.write());
        for connection in &leftover {
            log_warn!(self.logger, "Server '{}' was still listed after the sweep, tearing it down", connection.server_id());
            self.teardown(connection).await;
        }
        self.registry.clear_remote();
    }

    fn find(&self, server_id: &str) -> Option<Arc<ServerConnection>> {
        self.connections
            .read()
            .iter()
            .find(|c| c.server_id() == server_id)
            .cloned()
    }

    async fn open_session(
        &self,
        target: &TransportTarget,
        scope: &mut TeardownScope,
    ) -> McpResult<(Arc<dyn ToolSession>, Vec<RemoteOperation>)> {
        let session = self.connector.open(target, scope).await?;
        let operations = session.list_operations().await?;
        Ok((session, operations))
    }

    /// Add a Ready connection to the table and its tools to the registry
    ///
    /// The table lock is held throughout so concurrent connects agree on the
    /// connected count. Lock order is table, then registry.
    fn publish(&self, connection: &Arc<ServerConnection>, operations: &[RemoteOperation]) -> Vec<String> {
        let server_id = connection.server_id();
        let mut table = self.connections.write();
        table.push(Arc::clone(connection));
        let connected = table.len();

        // A server that was alone kept bare names; it needs its prefix now.
        for other in table.iter().filter(|c| !Arc::ptr_eq(c, connection)) {
            let renamed = self.registry.rename_server_tools(other.server_id(), |proxy| {
                registry_name(proxy.server_id(), proxy.original_name(), connected)
            });
            if renamed > 0 {
                log_info!(self.logger, "Prefixed {} tools of server '{}'", renamed, other.server_id());
            }
        }

        let proxies = operations
            .iter()
            .map(|op| {
                Arc::new(RemoteToolProxy::new(
                    registry_name(server_id, &op.name, connected),
                    op,
                    connection,
                    Arc::clone(&self.logger),
                ))
            })
            .collect();
        self.registry.merge(server_id, proxies);
        self.registry.tools_for_server(server_id)
    }

    /// Shut a connection down and drop its bookkeeping whatever the outcome
    async fn teardown(&self, connection: &Arc<ServerConnection>) {
        let server_id = connection.server_id();
        let outcome = connection
            .shutdown(self.options.teardown_timeout, &self.cancel, Arc::clone(&self.logger))
            .await;

        match outcome {
            Ok(TeardownOutcome::Clean) => {}
            Ok(TeardownOutcome::TimedOut) => {
                let timeout = ClientError::TeardownTimeout {
                    server_id: server_id.to_string(),
                    timeout: self.options.teardown_timeout,
                };
                log_warn!(self.logger, "Timeout while disconnecting from {}, forcing cleanup ({})", server_id, timeout);
            }
            Ok(TeardownOutcome::Cancelled) => {
                log_warn!(self.logger, "Cancelled while disconnecting from {}, continuing with cleanup", server_id);
            }
            Ok(TeardownOutcome::Failed(failures)) => {
                log_warn!(self.logger, "Errors while disconnecting from {}: {}", server_id, failures.join("; "));
            }
            Err(e) => log_warn!(self.logger, "{}", e),
        }

        self.forget(server_id);
        log_info!(self.logger, "Disconnected from server '{}'", server_id);
    }

    fn forget(&self, server_id: &str) {
        let removed = self.registry.remove_server(server_id);
        self.connections.write().retain(|c| c.server_id() != server_id);
        log_debug!(self.logger, "Removed {} tools of server '{}'", removed, server_id);
    }
}

/// Client for any number of tool providers
///
/// Cheap to clone; clones share connections and registry.
#[derive(Clone)]
pub struct MultiServerClient {
    inner: Arc<ClientInner>,
}

impl MultiServerClient {
    pub fn new(connector: Arc<dyn Connector>, logger: Arc<dyn Logger>) -> Self {
        Self::with_options(connector, ClientOptions::default(), logger)
    }

    /// Client backed by real MCP transports
    pub fn with_rmcp(logger: Arc<dyn Logger>) -> Self {
        Self::new(Arc::new(RmcpConnector::new(Arc::clone(&logger))), logger)
    }

    pub fn with_options(connector: Arc<dyn Connector>, options: ClientOptions, logger: Arc<dyn Logger>) -> Self {
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&logger)));
        Self::with_registry(connector, registry, options, logger)
    }

    /// Publish remote tools into an existing registry
    pub fn with_registry(
        connector: Arc<dyn Connector>,
        registry: Arc<ToolRegistry>,
        options: ClientOptions,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connector,
                connections: RwLock::new(Vec::new()),
                registry,
                lifecycle_locks: Mutex::new(HashMap::new()),
                gate: Arc::new(tokio::sync::RwLock::new(())),
                options,
                cancel: CancellationToken::new(),
                logger,
            }),
        }
    }

    /// Connect to a provider and register its tools
    ///
    /// `server_id` defaults to the URL or command. An existing connection
    /// with the same id is disconnected first. On failure nothing is
    /// registered and whatever was acquired is released. Returns the
    /// registry names of the new tools.
    pub async fn connect(&self, target: TransportTarget, server_id: Option<&str>) -> ClientResult<Vec<String>> {
        validate_target(&target)?;
        let server_id = match server_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => target.address().to_string(),
        };

        let _gate = self.inner.gate.read().await;
        let mut guard = self.inner.lock_server(&server_id).await;

        if self.inner.find(&server_id).is_some() {
            log_info!(self.inner.logger, "Server '{}' is already connected, replacing it", server_id);
            guard = self.detached_teardown(&server_id, Some(guard)).await?;
        }

        log_info!(self.inner.logger, "Connecting to server '{}' over {} ({})", server_id, target.kind(), target);
        let connection = Arc::new(ServerConnection::new(server_id.clone(), target.clone()));
        connection.transition(ConnectionState::Connecting)?;

        let mut scope = TeardownScope::new();
        let (session, operations) = match self.inner.open_session(&target, &mut scope).await {
            Ok(opened) => opened,
            Err(e) => {
                log_error!(self.inner.logger, "Failed to connect to server '{}': {}", server_id, e);
                let cleanup = release_scope(
                    scope,
                    self.inner.options.teardown_timeout,
                    &self.inner.cancel,
                    Arc::clone(&self.inner.logger),
                )
                .await;
                if cleanup != TeardownOutcome::Clean {
                    log_warn!(self.inner.logger, "Cleanup after failed connect to '{}': {:?}", server_id, cleanup);
                }
                connection.transition(ConnectionState::Disconnected)?;
                self.inner.unlock_server(&server_id, guard);
                return Err(ClientError::connection(server_id, e));
            }
        };
        connection.attach(session, scope)?;

        let tool_names = self.inner.publish(&connection, &operations);
        log_info!(self.inner.logger, "Connected to server '{}' with tools: {:?}", server_id, tool_names);
        Ok(tool_names)
    }

    /// Connect to a network-stream provider
    pub async fn connect_stream(&self, url: &str, server_id: Option<&str>) -> ClientResult<Vec<String>> {
        self.connect(TransportTarget::stream(url), server_id).await
    }

    /// Start a provider process and connect over its stdio
    pub async fn connect_process(
        &self,
        command: &str,
        args: impl IntoIterator<Item = impl Into<String>>,
        server_id: Option<&str>,
    ) -> ClientResult<Vec<String>> {
        self.connect(TransportTarget::process(command, args), server_id).await
    }

    /// Connect every configured server in order
    ///
    /// Failures are logged and returned; they never stop the remaining
    /// servers.
    pub async fn connect_configured(&self, provider: &dyn ConfigProvider) -> Vec<(String, ClientError)> {
        let mut failures = Vec::new();
        for server in provider.get_servers().await {
            let result = match server.to_target() {
                Ok(target) => self.connect(target, Some(server.id.as_str())).await.map(|_| ()),
                Err(e) => Err(ClientError::from(e)),
            };
            if let Err(e) = result {
                log_error!(self.inner.logger, "Skipping configured server '{}': {}", server.id, e);
                failures.push((server.id, e));
            }
        }
        failures
    }

    /// Disconnect one server, or every server when `server_id` is `None`
    ///
    /// Unknown ids are ignored. Teardown timeouts are logged, not returned.
    pub async fn disconnect(&self, server_id: Option<&str>) -> ClientResult<()> {
        match server_id {
            Some(id) => {
                let _gate = self.inner.gate.read().await;
                let guard = self.detached_teardown(id, None).await?;
                self.inner.unlock_server(id, guard);
                Ok(())
            }
            None => {
                // Connects wait for the gate, so none can publish mid-sweep.
                let inner = Arc::clone(&self.inner);
                let gate = Arc::clone(&self.inner.gate);
                let task = tokio::spawn(async move {
                    let _gate = gate.write_owned().await;
                    inner.teardown_all().await;
                });
                if let Err(e) = task.await {
                    log_error!(self.inner.logger, "Error disconnecting all servers: {}", e);
                    self.inner.connections.write().clear();
                    self.inner.registry.clear_remote();
                }
                Ok(())
            }
        }
    }

    /// Run the teardown of `server_id` on its own task
    ///
    /// The task owns the server's lock, so the bookkeeping is finished and
    /// the id stays locked even if the caller's future is dropped. The lock
    /// is handed back once the teardown is done.
    async fn detached_teardown(&self, server_id: &str, held: Option<LifecycleGuard>) -> ClientResult<LifecycleGuard> {
        let inner = Arc::clone(&self.inner);
        let id = server_id.to_string();
        let task = tokio::spawn(async move { inner.teardown_locked(&id, held).await });

        task.await.map_err(|e| {
            self.inner.forget(server_id);
            ClientError::Teardown {
                server_id: server_id.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Ask every live session for its operations, tagged by server id
    ///
    /// Reads the providers directly rather than the registry, so the result
    /// can disagree with it while a disconnect is in flight.
    pub async fn list_remote_operations(&self) -> Vec<(String, RemoteOperation)> {
        let sessions: Vec<(String, Arc<dyn ToolSession>)> = self
            .inner
            .connections
            .read()
            .iter()
            .filter_map(|c| c.session().map(|s| (c.server_id().to_string(), s)))
            .collect();

        let listings = join_all(sessions.into_iter().map(|(id, session)| async move {
            let result = session.list_operations().await;
            (id, result)
        }))
        .await;

        let mut operations = Vec::new();
        for (id, result) in listings {
            match result {
                Ok(ops) => operations.extend(ops.into_iter().map(|op| (id.clone(), op))),
                Err(e) => log_warn!(self.inner.logger, "Failed to list tools of server '{}': {}", id, e),
            }
        }
        operations
    }

    /// Connected server ids in connection order
    pub fn connected_servers(&self) -> Vec<String> {
        self.inner
            .connections
            .read()
            .iter()
            .map(|c| c.server_id().to_string())
            .collect()
    }

    pub fn is_connected(&self, server_id: &str) -> bool {
        self.inner.find(server_id).is_some_and(|c| c.is_ready())
    }

    pub fn connection_state(&self, server_id: &str) -> Option<ConnectionState> {
        self.inner.find(server_id).map(|c| c.state())
    }

    pub fn server_target(&self, server_id: &str) -> Option<TransportTarget> {
        self.inner.find(server_id).map(|c| c.target().clone())
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Run a registered tool by name
    pub async fn execute(&self, name: &str, arguments: Value) -> ClientResult<ToolOutput> {
        self.inner.registry.execute(name, arguments).await
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.inner.registry.list()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Shutdown signal; once cancelled, teardowns stop waiting
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }
}

impl std::fmt::Debug for MultiServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiServerClient")
            .field("servers", &self.connected_servers())
            .field("tools", &self.inner.registry.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

fn validate_target(target: &TransportTarget) -> ClientResult<()> {
    match target {
        TransportTarget::Stream { url } if url.trim().is_empty() => {
            Err(ClientError::InvalidTarget("empty url".to_string()))
        }
        TransportTarget::Process { command, .. } if command.trim().is_empty() => {
            Err(ClientError::InvalidTarget("empty command".to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLevel, FileConfigProvider, MemoryConfigProvider, ServerConfig};
    use crate::logging::{LogLevel, NoOpLogger, RecordingLogger};
    use crate::mcp::{MockConnector, MockResponse, MockServer};
    use crate::tools::{is_valid_tool_name, LocalTool};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;

    fn forecast_server() -> MockServer {
        MockServer::new()
            .with_operation("get_forecast")
            .with_operation("get_alerts")
    }

    fn target(address: &str) -> TransportTarget {
        TransportTarget::process(address, Vec::<String>::new())
    }

    fn client_with(connector: &Arc<MockConnector>) -> MultiServerClient {
        MultiServerClient::new(connector.clone(), NoOpLogger::shared())
    }

    fn assert_names_coherent(client: &MultiServerClient) {
        let names = client.registry().names();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "duplicate names in {names:?}");
        for name in &names {
            assert!(is_valid_tool_name(name), "{name:?} is not a valid registry name");
        }
    }

    #[tokio::test]
    async fn test_single_server_keeps_bare_names() {
        let connector = Arc::new(MockConnector::new().with_server("weather", forecast_server()));
        let client = client_with(&connector);

        let names = client.connect(target("weather"), Some("weather")).await.unwrap();

        assert_eq!(names, vec!["get_forecast", "get_alerts"]);
        assert!(client.is_connected("weather"));
        assert_eq!(client.connection_state("weather"), Some(ConnectionState::Ready));
        assert_eq!(client.execute("get_forecast", json!({})).await.unwrap(), ToolOutput::output("get_forecast ok"));
    }

    #[tokio::test]
    async fn test_two_servers_are_prefixed() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("alpha-srv", MockServer::new().with_operation("get_forecast"))
                .with_server("bravo-srv", MockServer::new().with_operation("get_forecast")),
        );
        let client = client_with(&connector);

        client.connect(target("alpha-srv"), Some("alpha")).await.unwrap();
        let names = client.connect(target("bravo-srv"), Some("bravo")).await.unwrap();

        assert_eq!(names, vec!["bravo_get_forecast"]);
        assert_eq!(client.registry().names(), vec!["alpha_get_forecast", "bravo_get_forecast"]);
        assert_names_coherent(&client);
        assert_eq!(
            client.execute("alpha_get_forecast", json!({})).await.unwrap(),
            ToolOutput::output("get_forecast ok")
        );
    }

    #[tokio::test]
    async fn test_default_server_id_is_address() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("http://localhost:8000/sse", forecast_server())
                .with_server("other", MockServer::new().with_operation("ping")),
        );
        let client = client_with(&connector);

        client.connect_stream("http://localhost:8000/sse", Some("  ")).await.unwrap();
        client.connect(target("other"), None).await.unwrap();

        assert_eq!(client.connected_servers(), vec!["http://localhost:8000/sse", "other"]);
        assert!(client.registry().contains("http_localhost_8000_sse_get_alerts"));
        assert!(client.registry().contains("other_ping"));
        assert_names_coherent(&client);
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let client = client_with(&Arc::new(MockConnector::new()));

        let err = client.connect_stream(" ", None).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidTarget(_)));

        let err = client.connect_process("", Vec::<String>::new(), Some("x")).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidTarget(_)));
        assert!(client.connected_servers().is_empty());
    }

    #[tokio::test]
    async fn test_no_duplicates_across_lifecycle() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server())
                .with_server("b", forecast_server())
                .with_server("c", MockServer::new().with_operation("get_forecast").with_operation("x.y")),
        );
        let client = client_with(&connector);

        client.connect(target("a"), Some("a")).await.unwrap();
        assert_names_coherent(&client);
        client.connect(target("b"), Some("b")).await.unwrap();
        assert_names_coherent(&client);
        client.disconnect(Some("a")).await.unwrap();
        assert_names_coherent(&client);
        client.connect(target("c"), Some("c")).await.unwrap();
        assert_names_coherent(&client);
        client.connect(target("b"), Some("b")).await.unwrap();
        assert_names_coherent(&client);

        assert_eq!(client.connected_servers(), vec!["c", "b"]);
        assert_eq!(client.registry().tools_for_server("c"), vec!["c_get_forecast", "c_x_y"]);
        assert_eq!(client.registry().len(), 4);
    }

    #[tokio::test]
    async fn test_disconnect_isolation() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server())
                .with_server("b", forecast_server()),
        );
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();
        client.connect(target("b"), Some("b")).await.unwrap();

        client.disconnect(Some("a")).await.unwrap();

        assert_eq!(client.connected_servers(), vec!["b"]);
        assert!(client.registry().tools_for_server("a").is_empty());
        assert_eq!(
            client.execute("b_get_alerts", json!({})).await.unwrap(),
            ToolOutput::output("get_alerts ok")
        );
        assert!(matches!(
            client.execute("a_get_alerts", json!({})).await,
            Err(ClientError::UnknownTool(_))
        ));
        assert_eq!(connector.stats().live(), 1);
    }

    #[tokio::test]
    async fn test_held_tool_reports_not_connected() {
        let connector = Arc::new(MockConnector::new().with_server("a", forecast_server()));
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();
        let tool = client.registry().get("get_forecast").unwrap();

        client.disconnect(Some("a")).await.unwrap();

        let output = tool.execute(json!({})).await;
        assert!(output.is_error());
        assert!(output.text().contains("not connected"));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_is_noop() {
        let client = client_with(&Arc::new(MockConnector::new()));
        client.disconnect(Some("ghost")).await.unwrap();
        assert!(client.connected_servers().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_all_twice() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server())
                .with_server("b", forecast_server()),
        );
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();
        client.connect(target("b"), Some("b")).await.unwrap();

        client.disconnect(None).await.unwrap();
        client.disconnect(None).await.unwrap();

        assert!(client.connected_servers().is_empty());
        assert!(client.registry().is_empty());
        assert_eq!(connector.stats().live(), 0);
    }

    struct Clock;

    #[async_trait]
    impl LocalTool for Clock {
        fn name(&self) -> &str {
            "clock"
        }

        fn description(&self) -> &str {
            "Fixed time"
        }

        async fn execute(&self, _arguments: Value) -> ToolOutput {
            ToolOutput::output("12:00")
        }
    }

    #[tokio::test]
    async fn test_disconnect_all_keeps_local_tools() {
        let connector = Arc::new(MockConnector::new().with_server("a", forecast_server()));
        let client = client_with(&connector);
        client.registry().register(Arc::new(Clock));
        client.connect(target("a"), Some("a")).await.unwrap();

        client.disconnect(None).await.unwrap();

        assert_eq!(client.registry().names(), vec!["clock"]);
    }

    #[tokio::test]
    async fn test_teardown_timeout_still_clears_bookkeeping() {
        let recorder = Arc::new(RecordingLogger::new());
        let connector = Arc::new(MockConnector::new().with_server(
            "slow",
            forecast_server().with_teardown_delay(Duration::from_secs(30)),
        ));
        let client = MultiServerClient::with_options(
            connector.clone(),
            ClientOptions {
                teardown_timeout: Duration::from_millis(50),
            },
            recorder.clone(),
        );
        client.connect(target("slow"), Some("slow")).await.unwrap();

        let started = std::time::Instant::now();
        client.disconnect(Some("slow")).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(client.connected_servers().is_empty());
        assert!(client.registry().is_empty());
        assert_eq!(client.connection_state("slow"), None);
        assert!(recorder.contains(LogLevel::Warn, "Timeout while disconnecting from slow, forcing cleanup"));
    }

    #[tokio::test]
    async fn test_cancellation_inside_teardown_is_swallowed() {
        let recorder = Arc::new(RecordingLogger::new());
        let connector = Arc::new(MockConnector::new().with_server("a", forecast_server().with_cancelled_teardown()));
        let client = MultiServerClient::new(connector.clone(), recorder.clone());
        client.connect(target("a"), Some("a")).await.unwrap();

        client.disconnect(Some("a")).await.unwrap();

        assert!(client.connected_servers().is_empty());
        assert!(recorder.contains(LogLevel::Warn, "continuing with cleanup"));
        // The transport below the cancelled session is still released.
        assert_eq!(connector.stats().released(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_token_cuts_teardown_short() {
        let connector = Arc::new(MockConnector::new().with_server(
            "slow",
            forecast_server().with_teardown_delay(Duration::from_secs(30)),
        ));
        let client = client_with(&connector);
        client.connect(target("slow"), Some("slow")).await.unwrap();

        client.cancellation_token().cancel();
        let started = std::time::Instant::now();
        client.disconnect(None).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(client.connected_servers().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let connector = Arc::new(MockConnector::new().with_server("a", forecast_server()));
        let client = client_with(&connector);

        client.connect(target("a"), Some("a")).await.unwrap();
        connector.set_server("a", MockServer::new().with_operation("get_forecast"));
        let names = client.connect(target("a"), Some("a")).await.unwrap();

        assert_eq!(names, vec!["get_forecast"]);
        assert_eq!(client.registry().names(), vec!["get_forecast"]);
        assert_eq!(client.connected_servers(), vec!["a"]);
        let stats = connector.stats();
        assert_eq!(stats.opened(), 2);
        assert_eq!(stats.live(), 1);
    }

    #[tokio::test]
    async fn test_failed_handshake_leaves_no_state() {
        let connector = Arc::new(MockConnector::new().with_server("bad", MockServer::new().failing_handshake("eof")));
        let client = client_with(&connector);

        let err = client.connect(target("bad"), Some("bad")).await.unwrap_err();

        assert!(matches!(err, ClientError::Connection { ref server_id, .. } if server_id == "bad"));
        assert!(client.connected_servers().is_empty());
        assert!(client.registry().is_empty());
        assert_eq!(client.connection_state("bad"), None);
        assert_eq!(connector.stats().released(), 1);
    }

    #[tokio::test]
    async fn test_failed_discovery_releases_session() {
        let connector = Arc::new(
            MockConnector::new().with_server("bad", forecast_server().failing_discovery("tools/list timed out")),
        );
        let client = client_with(&connector);

        let err = client.connect(target("bad"), None).await.unwrap_err();

        assert!(err.to_string().contains("tools/list timed out"));
        assert!(client.registry().is_empty());
        assert_eq!(connector.stats().live(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = client_with(&Arc::new(MockConnector::new()));
        let err = client.connect_stream("http://nowhere", Some("x")).await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_connect_configured_tolerates_failures() {
        let recorder = Arc::new(RecordingLogger::new());
        let connector = Arc::new(
            MockConnector::new()
                .with_server("weather-cmd", forecast_server())
                .with_server("http://time", MockServer::new().with_operation("now")),
        );
        let client = MultiServerClient::new(connector.clone(), recorder.clone());
        let config = MemoryConfigProvider::with_servers(vec![
            ServerConfig::stdio("weather", "weather-cmd", vec![]),
            ServerConfig::sse("broken", ""),
            ServerConfig::sse("missing", "http://missing"),
            ServerConfig::sse("time", "http://time"),
        ]);

        let failures = client.connect_configured(&config).await;

        let failed: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(failed, vec!["broken", "missing"]);
        assert!(matches!(failures[0].1, ClientError::Config(_)));
        assert_eq!(client.connected_servers(), vec!["weather", "time"]);
        assert!(recorder.contains(LogLevel::Error, "Skipping configured server 'missing'"));
    }

    #[tokio::test]
    async fn test_list_remote_operations_tagged() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", MockServer::new().with_operation("one"))
                .with_server("b", MockServer::new().with_response("two", MockResponse::Echo)),
        );
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();
        client.connect(target("b"), Some("b")).await.unwrap();

        let ops: Vec<(String, String)> = client
            .list_remote_operations()
            .await
            .into_iter()
            .map(|(id, op)| (id, op.name))
            .collect();

        assert_eq!(ops, vec![("a".to_string(), "one".to_string()), ("b".to_string(), "two".to_string())]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_connects_for_different_ids() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server())
                .with_server("b", forecast_server())
                .with_server("c", forecast_server()),
        );
        let client = client_with(&connector);

        let tasks: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|id| {
                let client = client.clone();
                tokio::spawn(async move { client.connect(target(id), Some(id)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(client.connected_servers().len(), 3);
        assert_names_coherent(&client);
        for id in ["a", "b", "c"] {
            assert_eq!(client.registry().tools_for_server(id).len(), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_reconnects_same_id() {
        let connector = Arc::new(MockConnector::new().with_server("a", forecast_server()));
        let client = client_with(&connector);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.connect(target("a"), Some("a")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(client.connected_servers(), vec!["a"]);
        assert_eq!(client.registry().len(), 2);
        assert_eq!(connector.stats().live(), 1);
    }

    fn assert_sessions_match_table(client: &MultiServerClient, connector: &MockConnector) {
        let connected = client.connected_servers();
        assert_eq!(connector.stats().live(), connected.len(), "live sessions vs {connected:?}");
        let owners: HashSet<String> = client
            .registry()
            .names()
            .iter()
            .filter_map(|name| client.registry().owner(name))
            .collect();
        assert_eq!(owners, connected.into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disconnect_all_racing_new_connect() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server().with_teardown_delay(Duration::from_millis(300)))
                .with_server("late", MockServer::new().with_operation("y").with_open_delay(Duration::from_millis(100))),
        );
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();

        let late = {
            let client = client.clone();
            tokio::spawn(async move { client.connect(target("late"), Some("late")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.disconnect(None).await.unwrap();

        assert!(late.await.unwrap().is_ok());
        assert_sessions_match_table(&client, &connector);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_connect_racing_disconnect_same_id() {
        let connector = Arc::new(MockConnector::new().with_server(
            "a",
            forecast_server().with_open_delay(Duration::from_millis(50)),
        ));
        let client = client_with(&connector);

        for _ in 0..3 {
            let connecting = {
                let client = client.clone();
                tokio::spawn(async move { client.connect(target("a"), Some("a")).await })
            };
            let disconnecting = {
                let client = client.clone();
                tokio::spawn(async move { client.disconnect(Some("a")).await })
            };
            connecting.await.unwrap().unwrap();
            disconnecting.await.unwrap().unwrap();

            assert_sessions_match_table(&client, &connector);
            assert_names_coherent(&client);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dropped_reconnect_keeps_server_locked() {
        let connector = Arc::new(MockConnector::new().with_server(
            "a",
            forecast_server().with_teardown_delay(Duration::from_millis(200)),
        ));
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), client.connect(target("a"), Some("a"))).await;
        assert!(abandoned.is_err());

        client.connect(target("a"), Some("a")).await.unwrap();

        assert_eq!(connector.stats().opened(), 2);
        assert_eq!(client.connected_servers(), vec!["a"]);
        assert_eq!(client.registry().len(), 2);
        assert_sessions_match_table(&client, &connector);
    }

    #[tokio::test]
    async fn test_lifecycle_locks_dropped_with_server() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", forecast_server())
                .with_server("b", forecast_server()),
        );
        let client = client_with(&connector);
        client.connect(target("a"), Some("a")).await.unwrap();
        client.connect(target("b"), Some("b")).await.unwrap();
        assert!(client.connect(target("missing"), Some("missing")).await.is_err());

        client.disconnect(Some("a")).await.unwrap();
        {
            let locks = client.inner.lifecycle_locks.lock();
            assert!(!locks.contains_key("a"));
            assert!(!locks.contains_key("missing"));
            assert!(locks.contains_key("b"));
        }

        client.disconnect(None).await.unwrap();
        assert!(client.inner.lifecycle_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_timeout_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("servers.yaml"), ConfigLevel::User);
        provider.set_settings(ClientSettings { teardown_timeout_secs: 1 }).unwrap();

        let recorder = Arc::new(RecordingLogger::new());
        let connector = Arc::new(MockConnector::new().with_server(
            "slow",
            forecast_server().with_teardown_delay(Duration::from_secs(30)),
        ));
        let options = ClientOptions::from(&provider.get_settings().unwrap());
        let client = MultiServerClient::with_options(connector.clone(), options, recorder.clone());
        assert_eq!(client.options().teardown_timeout, Duration::from_secs(1));

        client.connect(target("slow"), Some("slow")).await.unwrap();
        let started = std::time::Instant::now();
        client.disconnect(Some("slow")).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(recorder.contains(LogLevel::Warn, "Timeout while disconnecting from slow"));
    }

    #[tokio::test]
    async fn test_listed_tools_carry_remote_schema() {
        let schema = json!({
            "type": "object",
            "properties": { "state": { "type": "string" } },
            "required": ["state"]
        });
        let connector = Arc::new(
            MockConnector::new().with_server("weather", MockServer::new().with_typed_operation("get_alerts", schema.clone())),
        );
        let client = client_with(&connector);
        client.connect(target("weather"), Some("weather")).await.unwrap();

        let tools = client.list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_alerts");
        assert_eq!(tools[0].parameters, schema);
    }
}
