//! Durable key/value slot holding the serialized offline queue.
//!
//! The slot is read once when the queue is opened and rewritten on every
//! enqueue and dequeue.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Name of the slot the offline queue is stored under.
pub const QUEUE_SLOT: &str = "offline_queue";

/// A single durable value.
///
/// Used as `Arc<dyn QueueStorage>`.
#[async_trait]
pub trait QueueStorage: Send + Sync {
    /// The stored value, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the stored value.
    async fn save(&self, value: &str) -> Result<()>;
}

/// Slot stored in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteQueueStorage {
    pool: SqlitePool,
    slot: String,
}

impl SqliteQueueStorage {
    /// Open (creating if needed) the database at `database_url` and run
    /// migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Use an existing pool. Migrations are run before returning.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        tracing::info!("Running queue storage migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            slot: QUEUE_SLOT.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl QueueStorage for SqliteQueueStorage {
    async fn load(&self) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_slots WHERE slot = ?1")
                .bind(&self.slot)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn save(&self, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_slots (slot, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(slot) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.slot)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Slot kept in memory. Survives as long as the value itself, which lets
/// tests share one instance across simulated restarts.
#[derive(Debug, Default)]
pub struct MemoryQueueStorage {
    value: Mutex<Option<String>>,
}

impl MemoryQueueStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored value.
    pub fn raw(&self) -> Option<String> {
        self.value.lock().clone()
    }
}

#[async_trait]
impl QueueStorage for MemoryQueueStorage {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    async fn save(&self, value: &str) -> Result<()> {
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }
}
