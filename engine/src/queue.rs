//! The offline queue: an ordered list of pending actions.
//!
//! The queue is strictly FIFO. Later actions may depend on earlier ones
//! (create, then update the same row), so only the head is ever applied and
//! an action leaves the queue only once its remote write is confirmed.
//!
//! The whole queue is persisted as one versioned JSON document after every
//! change; see [`QueueSnapshot`].

use crate::action::{ActionId, PendingAction};
use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Version of the persisted queue format.
pub const QUEUE_FORMAT_VERSION: u32 = 1;

/// In-memory FIFO of pending actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflineQueue {
    actions: VecDeque<PendingAction>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action at the tail.
    pub fn enqueue(&mut self, action: PendingAction) {
        self.actions.push_back(action);
    }

    /// The oldest action, if any.
    pub fn head(&self) -> Option<&PendingAction> {
        self.actions.front()
    }

    /// Remove the head if it is the action `id`.
    ///
    /// Returns the removed action. Acknowledging anything other than the
    /// current head is refused, which keeps removal strictly in order.
    pub fn acknowledge(&mut self, id: &str) -> Option<PendingAction> {
        if self.actions.front().is_some_and(|a| a.id == id) {
            self.actions.pop_front()
        } else {
            None
        }
    }

    /// Record a failed attempt on the action `id`.
    pub fn record_failure(&mut self, id: &str) {
        if let Some(action) = self.actions.iter_mut().find(|a| a.id == id) {
            action.attempts += 1;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.iter().any(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter()
    }

    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(|a| a.id.clone()).collect()
    }

    /// Export the queue for persistence.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            format_version: QUEUE_FORMAT_VERSION,
            actions: self.actions.iter().cloned().collect(),
        }
    }

    /// Rebuild a queue from a persisted snapshot.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            actions: snapshot.actions.into(),
        }
    }
}

/// Persisted form of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub format_version: u32,
    pub actions: Vec<PendingAction>,
}

impl QueueSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > QUEUE_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported queue format version: {} (max supported: {})",
                snapshot.format_version, QUEUE_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}
