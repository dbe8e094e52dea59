//! User-facing notices.
//!
//! Mutations never return something the caller must await, so their
//! outcome is also announced here. Refresh failures are deliberately absent.

use tabula_engine::{ActionId, EntityKind};
use tokio::sync::broadcast;

/// Capacity of the notice channel. Slow subscribers miss the oldest notices.
pub const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A mutation could not be applied and was not queued.
    MutationFailed {
        entity: EntityKind,
        key: String,
        message: String,
    },
    /// A mutation was queued and will be applied once the store is reachable.
    QueuedForSync {
        entity: EntityKind,
        key: String,
        action_id: ActionId,
    },
    /// The offline queue was emptied.
    QueueDrained { applied: usize },
}

pub type NoticeSender = broadcast::Sender<Notice>;

pub fn channel() -> NoticeSender {
    broadcast::channel(NOTICE_CAPACITY).0
}

/// Send a notice, ignoring the absence of subscribers.
pub(crate) fn announce(sender: &NoticeSender, notice: Notice) {
    tracing::debug!(notice = ?notice, "Notice");
    let _ = sender.send(notice);
}
