//! Mock connector for testing
//!
//! Provides deterministic in-process tool providers without spawning
//! processes or opening sockets. Servers are keyed by the target address
//! (URL or command).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::error::{McpError, McpResult};
use super::session::{CallOutcome, Connector, ContentFragment, RemoteOperation, ToolSession};
use super::teardown::TeardownScope;
use super::TransportTarget;

/// How a mock operation answers
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these fragments
    Outcome(CallOutcome),
    /// Reply with the arguments serialized as text
    Echo,
    /// Fail at the transport level
    Fail(String),
}

/// Behavior of one mock provider
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    operations: Vec<RemoteOperation>,
    responses: HashMap<String, MockResponse>,
    handshake_error: Option<String>,
    discovery_error: Option<String>,
    open_delay: Duration,
    teardown_delay: Duration,
    teardown_cancelled: bool,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose an operation with the default "{name} ok" answer
    pub fn with_operation(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.operations
            .push(RemoteOperation::new(name.clone(), format!("Mock operation {}", name)));
        self
    }

    /// Expose an operation taking arguments described by `schema`
    pub fn with_typed_operation(mut self, name: impl Into<String>, schema: Value) -> Self {
        let name = name.into();
        self.operations
            .push(RemoteOperation::new(name.clone(), format!("Mock operation {}", name)).with_schema(schema));
        self
    }

    /// Expose an operation with a fixed answer
    pub fn with_response(mut self, name: impl Into<String>, response: MockResponse) -> Self {
        let name = name.into();
        if !self.operations.iter().any(|op| op.name == name) {
            self.operations
                .push(RemoteOperation::new(name.clone(), format!("Mock operation {}", name)));
        }
        self.responses.insert(name, response);
        self
    }

    /// Fail the handshake after the transport was acquired
    pub fn failing_handshake(mut self, reason: impl Into<String>) -> Self {
        self.handshake_error = Some(reason.into());
        self
    }

    /// Fail the discovery round trip
    pub fn failing_discovery(mut self, reason: impl Into<String>) -> Self {
        self.discovery_error = Some(reason.into());
        self
    }

    /// Make opening the transport take `delay`
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Make the session release action sleep before finishing
    pub fn with_teardown_delay(mut self, delay: Duration) -> Self {
        self.teardown_delay = delay;
        self
    }

    /// Make the session release action report cancellation
    pub fn with_cancelled_teardown(mut self) -> Self {
        self.teardown_cancelled = true;
        self
    }
}

/// Counters shared by every session a [`MockConnector`] opens
#[derive(Debug, Default)]
pub struct MockStats {
    opened: AtomicUsize,
    live: AtomicUsize,
    released: AtomicUsize,
}

impl MockStats {
    /// Sessions that completed the handshake
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Release actions that ran to completion (sessions and transports)
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Connector serving [`MockServer`]s
#[derive(Default)]
pub struct MockConnector {
    servers: Mutex<HashMap<String, MockServer>>,
    stats: Arc<MockStats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `server` for targets whose address is `address`
    pub fn with_server(self, address: impl Into<String>, server: MockServer) -> Self {
        self.set_server(address, server);
        self
    }

    /// Replace the server behind `address` (affects later connects only)
    pub fn set_server(&self, address: impl Into<String>, server: MockServer) {
        self.servers.lock().insert(address.into(), server);
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        target: &TransportTarget,
        scope: &mut TeardownScope,
    ) -> McpResult<Arc<dyn ToolSession>> {
        let server = self
            .servers
            .lock()
            .get(target.address())
            .cloned()
            .ok_or_else(|| McpError::ConnectionFailed(format!("no mock server at {}", target.address())))?;

        if !server.open_delay.is_zero() {
            tokio::time::sleep(server.open_delay).await;
        }

        // The transport is acquired before the handshake can fail.
        let stats = Arc::clone(&self.stats);
        scope.push("mock transport", move || async move {
            stats.released.fetch_add(1, Ordering::SeqCst);
            Ok::<(), McpError>(())
        });

        if let Some(reason) = &server.handshake_error {
            return Err(McpError::InitializationFailed(reason.clone()));
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_add(1, Ordering::SeqCst);

        let session = Arc::new(MockSession {
            server: server.clone(),
            closed: AtomicBool::new(false),
        });

        let stats = Arc::clone(&self.stats);
        let closing = Arc::clone(&session);
        scope.push("mock session", move || async move {
            closing.closed.store(true, Ordering::SeqCst);
            if !closing.server.teardown_delay.is_zero() {
                tokio::time::sleep(closing.server.teardown_delay).await;
            }
            stats.live.fetch_sub(1, Ordering::SeqCst);
            if closing.server.teardown_cancelled {
                return Err(McpError::Cancelled("mock session cancelled during close".into()));
            }
            stats.released.fetch_add(1, Ordering::SeqCst);
            Ok::<(), McpError>(())
        });

        Ok(session as Arc<dyn ToolSession>)
    }
}

struct MockSession {
    server: MockServer,
    closed: AtomicBool,
}

#[async_trait]
impl ToolSession for MockSession {
    async fn list_operations(&self) -> McpResult<Vec<RemoteOperation>> {
        if let Some(reason) = &self.server.discovery_error {
            return Err(McpError::Protocol(reason.clone()));
        }
        Ok(self.server.operations.clone())
    }

    async fn call_operation(&self, name: &str, arguments: Value) -> McpResult<CallOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ToolCallFailed("session closed".into()));
        }
        if !self.server.operations.iter().any(|op| op.name == name) {
            return Err(McpError::ToolCallFailed(format!("unknown tool: {}", name)));
        }

        match self.server.responses.get(name) {
            Some(MockResponse::Outcome(outcome)) => Ok(outcome.clone()),
            Some(MockResponse::Echo) => Ok(CallOutcome {
                content: vec![ContentFragment::Text(arguments.to_string())],
                is_error: false,
            }),
            Some(MockResponse::Fail(reason)) => Err(McpError::ToolCallFailed(reason.clone())),
            None => Ok(CallOutcome::text(format!("{} ok", name))),
        }
    }
}
