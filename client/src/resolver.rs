//! Table name to sheet id resolution.
//!
//! Row deletion addresses a table by its numeric id, not its name. Ids never
//! change while a table exists, so successful lookups are kept for the life
//! of the process. Misses are not remembered: a table created later must
//! resolve without a restart.

use crate::error::{Error, Result};
use crate::store::RangeStore;
use dashmap::DashMap;
use std::sync::Arc;
use tabula_engine::SheetId;

/// Cached resolver from table name to sheet id.
pub struct SheetIdentityResolver {
    store: Arc<dyn RangeStore>,
    ids: DashMap<String, SheetId>,
}

impl SheetIdentityResolver {
    pub fn new(store: Arc<dyn RangeStore>) -> Self {
        Self {
            store,
            ids: DashMap::new(),
        }
    }

    /// Resolve `table` to its sheet id.
    ///
    /// A cache miss costs one metadata fetch, which populates every table it
    /// returns. Concurrent misses may both fetch; they insert equal values.
    pub async fn resolve(&self, table: &str) -> Result<SheetId> {
        if let Some(id) = self.ids.get(table) {
            return Ok(*id);
        }

        let sheets = self.store.sheet_metadata().await?;
        tracing::debug!(table = %table, sheets = sheets.len(), "Fetched sheet metadata");

        let mut found = None;
        for sheet in sheets {
            if sheet.title == table {
                found = Some(sheet.sheet_id);
            }
            self.ids.insert(sheet.title, sheet.sheet_id);
        }

        found.ok_or_else(|| Error::NotFound(format!("table '{}' does not exist", table)))
    }

    /// Forget a cached id, e.g. after the table was recreated.
    pub fn invalidate(&self, table: &str) {
        self.ids.remove(table);
    }

    pub fn cached(&self, table: &str) -> Option<SheetId> {
        self.ids.get(table).map(|id| *id)
    }
}
