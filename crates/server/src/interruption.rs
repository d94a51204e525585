//! Per-connection interruption controller
//!
//! Holds the owning [`CancellationHandle`] of the connection's current run.
//! Runs are only ever given a [`CancellationScope`], so a superseded run has
//! no way to reach the slot; retiring a scope happens here and nowhere else.

use parking_lot::Mutex;
use voice_assistant_pipeline::{CancelReason, CancellationHandle, CancellationScope};

#[derive(Debug, Default)]
pub struct InterruptionController {
    current: Mutex<Option<CancellationHandle>>,
}

impl InterruptionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current run (if any) and open the scope for the next one.
    ///
    /// Both steps happen under the same lock, so two near-simultaneous events
    /// can never cancel each other's fresh scope.
    pub fn begin(&self) -> CancellationScope {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            if previous.cancel(CancelReason::Superseded) {
                tracing::debug!("Superseded in-flight run");
            }
        }

        let handle = CancellationHandle::new();
        let scope = handle.scope();
        *current = Some(handle);
        scope
    }

    /// Explicit client interrupt. Returns `true` if a live run was cancelled.
    pub fn interrupt(&self) -> bool {
        self.retire(CancelReason::Interrupted)
    }

    /// Teardown; `reason` is `ConnectionClosed` or `Shutdown`
    pub fn close(&self, reason: CancelReason) -> bool {
        self.retire(reason)
    }

    /// Whether the tracked scope is still active
    pub fn has_active_run(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    fn retire(&self, reason: CancelReason) -> bool {
        match self.current.lock().take() {
            Some(handle) => handle.cancel(reason),
            None => false,
        }
    }
}

impl Drop for InterruptionController {
    fn drop(&mut self) {
        if let Some(handle) = self.current.get_mut().take() {
            handle.cancel(CancelReason::ConnectionClosed);
        }
    }
}
