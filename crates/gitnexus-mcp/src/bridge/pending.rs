//! Bounded table of in-flight bridge requests.
//!
//! Each entry maps a request id to the one-shot completion channel its
//! caller is awaiting. Removal and completion both take the entry out of the
//! map first, so a late response after a timeout finds nothing and is
//! dropped — no double resolution.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use gitnexus_core::{GatewayError, GatewayResult};

/// Most requests allowed in flight per bridge instance.
pub const MAX_PENDING: usize = 100;

type Completion = oneshot::Sender<GatewayResult<serde_json::Value>>;

/// Pending-request table.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, Completion>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new request.
    ///
    /// Fails fast with `OVERLOADED` when the table is at capacity; the
    /// overflow request never reaches the wire.
    pub fn insert(
        &self,
        id: String,
    ) -> GatewayResult<oneshot::Receiver<GatewayResult<serde_json::Value>>> {
        let mut entries = self.entries.lock();
        if entries.len() >= MAX_PENDING {
            return Err(GatewayError::Overloaded {
                pending: entries.len(),
            });
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(id, tx);
        Ok(rx)
    }

    /// Complete the entry for `id`, if it still exists.
    ///
    /// Returns false when no entry matches (already timed out or cancelled);
    /// the caller drops the response silently.
    pub fn complete(&self, id: &str, result: GatewayResult<serde_json::Value>) -> bool {
        let entry = self.entries.lock().remove(id);
        match entry {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Drop the entry for `id` without completing it (deadline expiry).
    pub fn cancel(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Fail every outstanding entry, e.g. when the hub connection drops.
    pub fn fail_all(&self, make_error: impl Fn() -> GatewayError) {
        let drained: Vec<Completion> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, tx)| tx).collect()
        };
        for tx in drained {
            let _ = tx.send(Err(make_error()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
