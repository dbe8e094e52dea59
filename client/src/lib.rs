//! Tabula Client - spreadsheet-backed inventory data with offline support.
//!
//! Talks to a remote tabular store (one table per entity kind, first row
//! is the header) and keeps a local, always-readable copy of its contents.
//!
//! # Layers
//!
//! - [`store`]: the raw range API ([`RangeStore`]), over HTTP or in memory
//! - [`resolver`]: table title to numeric sheet id, cached
//! - [`repository`]: typed table access by logical row, with auditing
//! - [`cache`]: the client-facing [`SyncCache`] with optimistic mutations
//! - [`processor`]: drains the durable offline queue when the store is back
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula_client::{MemoryQueueStorage, MemoryRangeStore, SyncClient, SyncSettings};
//! use tabula_engine::Product;
//!
//! # async fn demo() -> tabula_client::Result<()> {
//! let store = Arc::new(MemoryRangeStore::new());
//! let client = SyncClient::open(
//!     store,
//!     Arc::new(MemoryQueueStorage::new()),
//!     SyncSettings::default(),
//! )
//! .await?;
//!
//! client.cache.initial_load().await;
//! client.cache.add_product(Product::new("P-1", "Widget"));
//! let runtime = client.start();
//! // ...
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod applier;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod notice;
pub mod processor;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod runtime;
pub mod storage;
pub mod store;

pub use applier::{ActionApplier, Applied};
pub use cache::{LoadState, MutationHandle, MutationOutcome, RefreshReport, SyncCache};
pub use config::{Config, ConfigError};
pub use connectivity::Connectivity;
pub use error::{Error, Result};
pub use notice::{Notice, NoticeSender};
pub use processor::{OfflineQueueProcessor, TickReport};
pub use queue::PersistentQueue;
pub use repository::{AuditSink, NullAuditSink, TableAuditSink, TableRead, TableRepository};
pub use resolver::SheetIdentityResolver;
pub use runtime::{SyncClient, SyncContext, SyncRuntime, SyncSettings};
pub use storage::{MemoryQueueStorage, QueueStorage, SqliteQueueStorage};
pub use store::{
    CallCounts, HttpRangeStore, MemoryRangeStore, RangeStore, RangeUpdate, SheetProperties,
};
