//! Ordered release actions for one connection

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::error::{McpError, McpResult};
use crate::logging::Logger;

type ReleaseAction = Box<dyn FnOnce() -> BoxFuture<'static, McpResult<()>> + Send>;

/// A stack of release actions, run in reverse acquisition order on close
///
/// Connectors push one action per acquired resource (spawned process,
/// transport, protocol session). Closing never stops early: a failing action
/// is logged and the remaining ones still run.
#[derive(Default)]
pub struct TeardownScope {
    actions: Vec<(String, ReleaseAction)>,
}

impl TeardownScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action for a resource just acquired
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = McpResult<()>> + Send + 'static,
    {
        self.actions
            .push((label.into(), Box::new(move || Box::pin(release()))));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Labels in acquisition order
    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Run every action, last acquired first
    ///
    /// Cancellations are logged and swallowed. Other failures are logged and
    /// returned with their label.
    pub async fn close(mut self, logger: Arc<dyn Logger>) -> Vec<(String, McpError)> {
        let mut failures = Vec::new();

        while let Some((label, release)) = self.actions.pop() {
            match release().await {
                Ok(()) => logger.debug(&format!("[TeardownScope] Released {}", label)),
                Err(e) if e.is_cancelled() => {
                    logger.warn(&format!(
                        "[TeardownScope] Cancelled while releasing {}, continuing with cleanup: {}",
                        label, e
                    ));
                }
                Err(e) => {
                    logger.warn(&format!(
                        "[TeardownScope] Unexpected error while releasing {}: {}",
                        label, e
                    ));
                    failures.push((label, e));
                }
            }
        }

        failures
    }
}

impl std::fmt::Debug for TeardownScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownScope")
            .field("actions", &self.labels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use parking_lot::Mutex;

    fn recorder(order: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> impl FnOnce() -> BoxFuture<'static, McpResult<()>> + Send + 'static {
        let order = Arc::clone(order);
        move || {
            Box::pin(async move {
                order.lock().push(label);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_close_runs_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut scope = TeardownScope::new();
        scope.push("process", recorder(&order, "process"));
        scope.push("transport", recorder(&order, "transport"));
        scope.push("session", recorder(&order, "session"));
        assert_eq!(scope.labels(), vec!["process", "transport", "session"]);

        let failures = scope.close(Arc::new(RecordingLogger::new())).await;

        assert!(failures.is_empty());
        assert_eq!(*order.lock(), vec!["session", "transport", "process"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining_actions() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(RecordingLogger::new());
        let mut scope = TeardownScope::new();
        scope.push("process", recorder(&order, "process"));
        scope.push("session", || async { Err::<(), _>(McpError::Protocol("pipe closed".into())) });

        let failures = scope.close(logger.clone()).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "session");
        assert_eq!(*order.lock(), vec!["process"]);
        assert!(logger.contains(LogLevel::Warn, "pipe closed"));
    }

    #[tokio::test]
    async fn test_cancellation_is_swallowed() {
        let logger = Arc::new(RecordingLogger::new());
        let mut scope = TeardownScope::new();
        scope.push("session", || async { Err::<(), _>(McpError::Cancelled("cancel scope".into())) });

        let failures = scope.close(logger.clone()).await;

        assert!(failures.is_empty());
        assert!(logger.contains(LogLevel::Warn, "continuing with cleanup"));
    }

    #[tokio::test]
    async fn test_empty_scope() {
        let scope = TeardownScope::new();
        assert!(scope.is_empty());
        assert!(scope.close(Arc::new(RecordingLogger::new())).await.is_empty());
    }
}
