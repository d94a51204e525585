//! One-way cancellation scopes
//!
//! A [`CancellationHandle`] is the owning side: whoever holds it may cancel.
//! Runs only ever receive a [`CancellationScope`], which can observe the
//! signal but has no way to trigger or reset it.

use std::fmt;
use std::future::Future;

use tokio::sync::watch;

use crate::PipelineError;

/// Why a scope was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer inbound event replaced this run
    Superseded,
    /// Client sent an explicit interrupt
    Interrupted,
    /// Connection was torn down
    ConnectionClosed,
    /// Server is shutting down
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::Superseded => "superseded by a newer event",
            CancelReason::Interrupted => "interrupted by client",
            CancelReason::ConnectionClosed => "connection closed",
            CancelReason::Shutdown => "server shutting down",
        };
        f.write_str(s)
    }
}

/// Owning side of a scope. Not `Clone`: there is exactly one canceller.
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<Option<CancelReason>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    /// Create an active scope
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Observer for this scope
    pub fn scope(&self) -> CancellationScope {
        CancellationScope {
            rx: self.tx.subscribe(),
        }
    }

    /// Transition active -> cancelled.
    ///
    /// Returns `false` if the scope had already been cancelled; the first
    /// reason wins.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Read-only view of a cancellation scope
#[derive(Debug, Clone)]
pub struct CancellationScope {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancellationScope {
    /// A scope nobody can cancel
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    /// Checkpoint: `Err(Cancelled)` once the scope has been cancelled
    pub fn check(&self) -> Result<(), PipelineError> {
        match self.reason() {
            Some(reason) => Err(PipelineError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves when the scope is cancelled.
    ///
    /// Never resolves if the owning handle is dropped without cancelling.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                let last = *rx.borrow();
                if let Some(reason) = last {
                    return reason;
                }
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `fut` unless the scope is cancelled first, in which case `fut`
    /// is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, PipelineError> {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(PipelineError::Cancelled(reason)),
            out = fut => Ok(out),
        }
    }
}
