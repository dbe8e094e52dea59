//! Range-addressed access to the remote tabular store.
//!
//! The store only understands rectangular cell ranges. Every call is a
//! single attempt: failures are reported as-is and retry policy lives in the
//! cache and the queue processor.

mod http;
mod memory;

pub use http::HttpRangeStore;
pub use memory::{CallCounts, MemoryRangeStore};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tabula_engine::{RangeExpr, RawRow, SheetId};

/// One entry of a batch overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: RangeExpr,
    pub rows: Vec<RawRow>,
}

impl RangeUpdate {
    pub fn new(range: RangeExpr, rows: Vec<RawRow>) -> Self {
        Self { range, rows }
    }
}

/// Name and internal id of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: SheetId,
    pub title: String,
}

/// Thin client over the remote range API.
///
/// Used as `Arc<dyn RangeStore>`.
#[async_trait]
pub trait RangeStore: Send + Sync {
    /// Read every populated row of `range`.
    ///
    /// A valid range with no data yields an empty vector. A missing table or
    /// unparseable range is [`Error::NotFound`](crate::Error::NotFound).
    async fn read_range(&self, range: &RangeExpr) -> Result<Vec<RawRow>>;

    /// Append rows after the last populated row of the range's table.
    ///
    /// The rows' positions are not reported; re-read to find them.
    async fn append_rows(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()>;

    /// Replace exactly the addressed cells. Cells outside `range` are
    /// never touched.
    async fn overwrite_range(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()>;

    /// Overwrite several ranges in one call.
    ///
    /// There is no atomicity across calls, so each entry must be safe to
    /// apply again on its own.
    async fn batch_overwrite(&self, updates: &[RangeUpdate]) -> Result<()>;

    /// Delete the row at a 0-based positional index. Every row below it
    /// shifts up by one.
    async fn delete_row(&self, sheet_id: SheetId, positional_index: u32) -> Result<()>;

    /// Names and ids of every table.
    async fn sheet_metadata(&self) -> Result<Vec<SheetProperties>>;
}
