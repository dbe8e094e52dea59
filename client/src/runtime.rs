//! Wiring: builds the shared pieces once and runs the background tasks.

use crate::applier::ActionApplier;
use crate::cache::SyncCache;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::notice::{self, NoticeSender};
use crate::processor::OfflineQueueProcessor;
use crate::queue::PersistentQueue;
use crate::repository::{TableAuditSink, TableRepository};
use crate::storage::{QueueStorage, SqliteQueueStorage};
use crate::store::{HttpRangeStore, RangeStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handles shared by the cache, its write lane and the queue processor.
#[derive(Clone)]
pub struct SyncContext {
    pub repo: Arc<TableRepository>,
    pub applier: Arc<ActionApplier>,
    pub queue: Arc<PersistentQueue>,
    pub connectivity: Arc<Connectivity>,
    pub notices: NoticeSender,
}

impl SyncContext {
    /// Open the offline queue from `storage` and build a repository over
    /// `store` that audits as `actor`.
    pub async fn new(
        store: Arc<dyn RangeStore>,
        storage: Arc<dyn QueueStorage>,
        actor: impl Into<String>,
    ) -> Result<Self> {
        let audit = Arc::new(TableAuditSink::new(store.clone()));
        let repo = Arc::new(TableRepository::new(store, audit, actor));
        let queue = Arc::new(PersistentQueue::open(storage).await?);
        Ok(Self {
            applier: Arc::new(ActionApplier::new(repo.clone())),
            repo,
            queue,
            connectivity: Arc::new(Connectivity::default()),
            notices: notice::channel(),
        })
    }
}

/// Timing and identity knobs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub actor: String,
    pub refresh_interval: Duration,
    pub refresh_timeout: Duration,
    pub tick_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            actor: "system".to_string(),
            refresh_interval: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(20),
            tick_interval: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            actor: config.actor.clone(),
            refresh_interval: config.refresh_interval,
            refresh_timeout: config.refresh_timeout,
            tick_interval: config.queue_tick_interval,
        }
    }
}

/// A cache and its queue processor, sharing one context.
pub struct SyncClient {
    pub cache: SyncCache,
    pub processor: OfflineQueueProcessor,
    ctx: SyncContext,
    settings: SyncSettings,
}

impl SyncClient {
    /// Must be called from within a Tokio runtime.
    pub async fn open(
        store: Arc<dyn RangeStore>,
        storage: Arc<dyn QueueStorage>,
        settings: SyncSettings,
    ) -> Result<Self> {
        let ctx = SyncContext::new(store, storage, settings.actor.clone()).await?;
        Ok(Self {
            cache: SyncCache::new(ctx.clone(), settings.refresh_timeout),
            processor: OfflineQueueProcessor::new(&ctx, settings.tick_interval),
            ctx,
            settings,
        })
    }

    /// HTTP store and SQLite queue slot, as configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(HttpRangeStore::from_config(config)?);
        let storage = Arc::new(SqliteQueueStorage::connect(&config.queue_database_url).await?);
        Self::open(store, storage, SyncSettings::from(config)).await
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn repository(&self) -> &Arc<TableRepository> {
        &self.ctx.repo
    }

    /// Start the periodic refresh and the queue processor.
    pub fn start(self) -> SyncRuntime {
        let (shutdown, rx) = watch::channel(false);

        let processor = tokio::spawn(self.processor.run(rx.clone()));
        let refresher = tokio::spawn(refresh_loop(
            self.cache.clone(),
            self.settings.refresh_interval,
            rx,
        ));
        tracing::info!(
            refresh_interval = ?self.settings.refresh_interval,
            tick_interval = ?self.settings.tick_interval,
            "Sync runtime started"
        );

        SyncRuntime {
            cache: self.cache,
            shutdown,
            tasks: vec![processor, refresher],
        }
    }
}

async fn refresh_loop(cache: SyncCache, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load covers it.
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                cache.periodic_refresh().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Refresh loop stopped");
}

/// Running background tasks.
pub struct SyncRuntime {
    cache: SyncCache,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncRuntime {
    pub fn cache(&self) -> &SyncCache {
        &self.cache
    }

    /// Stop both loops and wait for them. Queued actions stay persisted.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
        tracing::info!("Sync runtime stopped");
    }
}
