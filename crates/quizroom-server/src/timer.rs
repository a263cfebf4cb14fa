use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::SharedEngine;

/// One outstanding countdown per room, keyed by room code. Starting a new
/// timer for a code always supersedes the old one; cancelling is
/// idempotent. The expiry task re-resolves the room from the store rather
/// than closing over a room reference, so a room destroyed mid-countdown
/// makes the callback a no-op.
pub struct RoundTimers {
    handles: HashMap<String, JoinHandle<()>>,
}

impl Default for RoundTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTimers {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Arm the countdown for a room.
    pub fn start(&mut self, shared: SharedEngine, code: String, duration: Duration) {
        self.cancel(&code);
        let key = code.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut engine = shared.write().await;
            engine.handle_time_up(&code);
        });
        self.handles.insert(key, handle);
    }

    /// Abort and drop the timer for a room, if any.
    pub fn cancel(&mut self, code: &str) {
        if let Some(handle) = self.handles.remove(code) {
            handle.abort();
        }
    }

    /// Drop the handle of a timer that has already fired.
    pub fn clear_finished(&mut self, code: &str) {
        self.handles.remove(code);
    }

    /// True while a countdown is pending for the room.
    pub fn is_armed(&self, code: &str) -> bool {
        self.handles.get(code).is_some_and(|h| !h.is_finished())
    }
}
