//! Drains the offline queue once the store is reachable again.
//!
//! Runs on a fixed tick. Each tick applies queued actions head first and
//! stops at the first failure, so a later action never overtakes an earlier
//! one. A failed head stays at the head and is retried next tick.

use crate::applier::ActionApplier;
use crate::connectivity::Connectivity;
use crate::notice::{self, Notice, NoticeSender};
use crate::queue::PersistentQueue;
use crate::runtime::SyncContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Actions applied and removed from the queue.
    pub applied: usize,
    /// Whether the head action failed this tick.
    pub stalled: bool,
    /// Whether the tick ran out of time.
    pub timed_out: bool,
    /// Actions still queued afterwards.
    pub remaining: usize,
}

pub struct OfflineQueueProcessor {
    applier: Arc<ActionApplier>,
    queue: Arc<PersistentQueue>,
    connectivity: Arc<Connectivity>,
    notices: NoticeSender,
    tick_interval: Duration,
}

impl OfflineQueueProcessor {
    pub fn new(ctx: &SyncContext, tick_interval: Duration) -> Self {
        Self {
            applier: ctx.applier.clone(),
            queue: ctx.queue.clone(),
            connectivity: ctx.connectivity.clone(),
            notices: ctx.notices.clone(),
            tick_interval,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run one drain pass.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if self.queue.is_empty() {
            return report;
        }

        if !self.connectivity.is_online() {
            match self.applier.repository().store().sheet_metadata().await {
                Ok(_) => {
                    self.connectivity.set_online(true);
                }
                Err(e) => {
                    tracing::debug!(error = %e, pending = self.queue.len(), "Store still unreachable");
                    report.remaining = self.queue.len();
                    return report;
                }
            }
        }

        // A tick never outlives its interval.
        let drained = tokio::time::timeout(self.tick_interval, self.drain(&mut report)).await;
        if drained.is_err() {
            report.timed_out = true;
            tracing::warn!(interval = ?self.tick_interval, "Queue drain timed out");
            if let Some(head) = self.queue.head().await {
                if let Err(e) = self.queue.record_failure(&head.id).await {
                    tracing::error!(error = %e, "Failed to persist offline queue");
                }
            }
        }

        report.remaining = self.queue.len();
        if report.applied > 0 {
            tracing::info!(
                applied = report.applied,
                remaining = report.remaining,
                "Applied queued actions"
            );
            if report.remaining == 0 {
                notice::announce(
                    &self.notices,
                    Notice::QueueDrained {
                        applied: report.applied,
                    },
                );
            }
        }
        report
    }

    async fn drain(&self, report: &mut TickReport) {
        while let Some(action) = self.queue.head().await {
            match self.applier.apply(&action).await {
                Ok(_) => {
                    if let Err(e) = self.queue.acknowledge(&action.id).await {
                        // Already removed in memory; the slot catches up on
                        // the next successful write.
                        tracing::error!(error = %e, "Failed to persist offline queue");
                    }
                    report.applied += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        action_id = %action.id,
                        attempts = action.attempts + 1,
                        error = %e,
                        "Queued action failed; will retry"
                    );
                    if e.is_transport() {
                        self.connectivity.set_online(false);
                    }
                    if let Err(e) = self.queue.record_failure(&action.id).await {
                        tracing::error!(error = %e, "Failed to persist offline queue");
                    }
                    report.stalled = true;
                    break;
                }
            }
        }
    }

    /// Tick until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticks = tokio::time::interval(self.tick_interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Offline queue processor stopped");
    }
}
