//! The offline queue with write-through persistence.
//!
//! Every change is written to the durable slot while the queue lock is
//! held, so the persisted order always matches mutation order.

use crate::error::Result;
use crate::storage::QueueStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tabula_engine::{OfflineQueue, PendingAction, QueueSnapshot};
use tokio::sync::Mutex;

/// FIFO of pending actions mirrored to a [`QueueStorage`] slot.
pub struct PersistentQueue {
    queue: Mutex<OfflineQueue>,
    storage: Arc<dyn QueueStorage>,
    len: AtomicUsize,
}

impl PersistentQueue {
    /// Load the queue from `storage`. An empty slot is an empty queue.
    pub async fn open(storage: Arc<dyn QueueStorage>) -> Result<Self> {
        let queue = match storage.load().await? {
            Some(json) => OfflineQueue::from_snapshot(QueueSnapshot::from_json(&json)?),
            None => OfflineQueue::new(),
        };
        if !queue.is_empty() {
            tracing::info!(pending = queue.len(), "Restored offline queue");
        }
        Ok(Self {
            len: AtomicUsize::new(queue.len()),
            queue: Mutex::new(queue),
            storage,
        })
    }

    /// Append an action and persist.
    ///
    /// If persisting fails the action stays queued in memory and the error
    /// is returned.
    pub async fn enqueue(&self, action: PendingAction) -> Result<()> {
        let mut queue = self.queue.lock().await;
        tracing::debug!(action_id = %action.id, kind = %action.kind, entity = %action.entity, "Enqueued action");
        queue.enqueue(action);
        self.len.store(queue.len(), Ordering::SeqCst);
        self.persist(&queue).await
    }

    /// A copy of the oldest action.
    pub async fn head(&self) -> Option<PendingAction> {
        self.queue.lock().await.head().cloned()
    }

    /// Remove the head action `id` after its remote write was confirmed.
    pub async fn acknowledge(&self, id: &str) -> Result<Option<PendingAction>> {
        let mut queue = self.queue.lock().await;
        let removed = queue.acknowledge(id);
        if removed.is_some() {
            self.len.store(queue.len(), Ordering::SeqCst);
            self.persist(&queue).await?;
        }
        Ok(removed)
    }

    /// Count a failed attempt against action `id` and persist.
    pub async fn record_failure(&self, id: &str) -> Result<()> {
        let mut queue = self.queue.lock().await;
        queue.record_failure(id);
        self.persist(&queue).await
    }

    /// Number of queued actions. Does not wait for the queue lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of every queued action, oldest first.
    pub async fn actions(&self) -> Vec<PendingAction> {
        self.queue.lock().await.iter().cloned().collect()
    }

    async fn persist(&self, queue: &OfflineQueue) -> Result<()> {
        let json = queue.snapshot().to_json()?;
        self.storage.save(&json).await
    }
}
