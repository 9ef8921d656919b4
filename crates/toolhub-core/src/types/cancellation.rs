//! Shutdown signal shared between a client and its teardown tasks

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// One-way shutdown flag
///
/// Once cancelled, pending disconnects stop waiting for their release
/// actions and treat the connection as closed. Clones share state and the
/// flag never resets.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Raise the flag; returns false if it was already raised
    pub fn cancel(&self) -> bool {
        self.flag.send_if_modified(|cancelled| !std::mem::replace(cancelled, true))
    }

    /// Resolves once the flag is raised
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` unless the flag is raised first
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
