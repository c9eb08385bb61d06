//! Cancellation of an in-flight turn-chain.
//!
//! A `watch` channel carries the first cancellation reason. The handle is
//! held by whoever may stop the chain (the user, the connection watchdog);
//! the orchestrator checks its signal at every chunk boundary.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Why a chain was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `stop()` was called
    UserAborted,
    /// No response chunk arrived within the connection timeout
    ConnectionTimeout,
}

/// Sending side. Cloneable; the first reason wins.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

/// Receiving side, checked by the orchestrator.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel with `reason`. Returns false if already cancelled.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once cancelled. Never resolves if every handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) -> CancelReason {
        let reason = match self.rx.wait_for(Option::is_some).await {
            Ok(current) => *current,
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

/// Cancels with [`CancelReason::ConnectionTimeout`] unless disarmed in time.
/// Dropping the watchdog disarms it.
pub struct ConnectionWatchdog {
    task: JoinHandle<()>,
}

impl ConnectionWatchdog {
    pub fn arm(handle: CancelHandle, timeout: Duration) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if handle.cancel(CancelReason::ConnectionTimeout) {
                warn!(timeout_secs = timeout.as_secs(), "Connection timed out");
            }
        });
        Self { task }
    }

    pub fn disarm(&self) {
        self.task.abort();
    }
}

impl Drop for ConnectionWatchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}
