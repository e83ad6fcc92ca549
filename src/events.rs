// SPDX-License-Identifier: MIT
//! Append-only event sink for the monitor loop.
//!
//! The loop publishes JSON notifications here; log aggregation or a future
//! control surface subscribes. The daemon itself only writes.

use serde_json::Value;
use tokio::sync::broadcast;

/// Event names emitted by the monitor loop.
pub const EVENT_DRIFT_DETECTED: &str = "drift.detected";
pub const EVENT_DRIFT_FIXED: &str = "drift.fixed";
pub const EVENT_FILE_MISSING: &str = "file.missing";
pub const EVENT_CYCLE_STABLE: &str = "cycle.stable";
pub const EVENT_CYCLE_SUMMARY: &str = "cycle.summary";

/// Broadcasts JSON notification strings to all subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send a notification to all subscribers.
    pub fn broadcast(&self, event: &str, params: Value) {
        let notification = serde_json::json!({
            "event": event,
            "params": params
        });
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
