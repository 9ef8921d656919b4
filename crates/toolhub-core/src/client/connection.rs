//! One provider connection and its lifecycle

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{ClientError, ClientResult};
use crate::logging::Logger;
use crate::mcp::{TeardownScope, ToolSession, TransportTarget};
use crate::types::CancellationToken;

/// Lifecycle state of a [`ServerConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    /// Allowed edges; nothing leads back from Disconnecting to Ready
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Ready)
                | (Connecting, Disconnected)
                | (Ready, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a teardown ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Every release action finished
    Clean,
    /// Finished, but some release actions failed
    Failed(Vec<String>),
    /// The deadline passed; release actions keep running in the background
    TimedOut,
    /// Cancellation was observed inside the scope
    Cancelled,
}

/// Close `scope` on its own task, waiting at most `timeout`
///
/// The task is detached on timeout or cancellation, so the caller is never
/// held past the deadline.
pub(crate) async fn release_scope(
    scope: TeardownScope,
    timeout: Duration,
    cancel: &CancellationToken,
    logger: Arc<dyn Logger>,
) -> TeardownOutcome {
    if scope.is_empty() {
        return TeardownOutcome::Clean;
    }

    let task = tokio::spawn(scope.close(logger));

    match cancel.run_until_cancelled(tokio::time::timeout(timeout, task)).await {
        None => TeardownOutcome::Cancelled,
        Some(Err(_)) => TeardownOutcome::TimedOut,
        Some(Ok(Ok(failures))) if failures.is_empty() => TeardownOutcome::Clean,
        Some(Ok(Ok(failures))) => TeardownOutcome::Failed(
            failures.into_iter().map(|(label, e)| format!("{}: {}", label, e)).collect(),
        ),
        Some(Ok(Err(e))) if e.is_cancelled() => TeardownOutcome::Cancelled,
        Some(Ok(Err(e))) => TeardownOutcome::Failed(vec![format!("teardown task panicked: {}", e)]),
    }
}

/// A transport session to one provider plus the resources backing it
///
/// The session handle is only handed out while the connection is Ready.
pub struct ServerConnection {
    server_id: String,
    target: TransportTarget,
    state: Mutex<ConnectionState>,
    session: RwLock<Option<Arc<dyn ToolSession>>>,
    scope: Mutex<Option<TeardownScope>>,
}

impl ServerConnection {
    pub(crate) fn new(server_id: impl Into<String>, target: TransportTarget) -> Self {
        Self {
            server_id: server_id.into(),
            target,
            state: Mutex::new(ConnectionState::Disconnected),
            session: RwLock::new(None),
            scope: Mutex::new(None),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn target(&self) -> &TransportTarget {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// The live session, or `None` unless Ready
    pub fn session(&self) -> Option<Arc<dyn ToolSession>> {
        if !self.is_ready() {
            return None;
        }
        self.session.read().clone()
    }

    pub(crate) fn transition(&self, next: ConnectionState) -> ClientResult<()> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(ClientError::InvalidState {
                server_id: self.server_id.clone(),
                from: *state,
                to: next,
            });
        }
        *state = next;
        Ok(())
    }

    /// Connecting -> Ready, taking ownership of the session and its scope
    pub(crate) fn attach(&self, session: Arc<dyn ToolSession>, scope: TeardownScope) -> ClientResult<()> {
        *self.session.write() = Some(session);
        *self.scope.lock() = Some(scope);
        self.transition(ConnectionState::Ready)
    }

    /// Ready -> Disconnecting -> Disconnected
    ///
    /// The session handle is dropped before the release actions run, so
    /// proxies report "not connected" for the whole teardown.
    pub(crate) async fn shutdown(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
        logger: Arc<dyn Logger>,
    ) -> ClientResult<TeardownOutcome> {
        self.transition(ConnectionState::Disconnecting)?;
        self.session.write().take();
        let scope = self.scope.lock().take();

        let outcome = match scope {
            Some(scope) => release_scope(scope, timeout, cancel, logger).await,
            None => TeardownOutcome::Clean,
        };

        self.transition(ConnectionState::Disconnected)?;
        Ok(outcome)
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("server_id", &self.server_id)
            .field("target", &self.target)
            .field("state", &self.state())
            .finish()
    }
}
