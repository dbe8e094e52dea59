//! In-process range store.
//!
//! Keeps each table as a grid of rows (header included) and applies the same
//! A1 semantics as the remote API. Connectivity loss and latency can be
//! injected, and every call is counted.

use super::{RangeStore, RangeUpdate, SheetProperties};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tabula_engine::{CellRef, CellValue, RangeExpr, RawRow, SheetId};

#[derive(Debug)]
struct Sheet {
    id: SheetId,
    title: String,
    grid: Vec<RawRow>,
}

/// Number of calls made to each store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub reads: usize,
    pub appends: usize,
    pub overwrites: usize,
    pub batches: usize,
    pub deletes: usize,
    pub metadata: usize,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicUsize,
    appends: AtomicUsize,
    overwrites: AtomicUsize,
    batches: AtomicUsize,
    deletes: AtomicUsize,
    metadata: AtomicUsize,
}

/// Range store backed by memory.
#[derive(Debug, Default)]
pub struct MemoryRangeStore {
    sheets: Mutex<Vec<Sheet>>,
    next_id: AtomicUsize,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
    counters: Counters,
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table whose first row is `header`. Returns its sheet id.
    pub fn add_table(&self, title: &str, header: &[&str]) -> SheetId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as SheetId;
        let header = header.iter().map(|h| CellValue::text(*h)).collect();
        self.sheets.lock().push(Sheet {
            id,
            title: title.to_string(),
            grid: vec![header],
        });
        id
    }

    /// Builder form of [`add_table`](Self::add_table) that also seeds data rows.
    pub fn with_table(self, title: &str, header: &[&str], rows: Vec<RawRow>) -> Self {
        self.add_table(title, header);
        self.set_data_rows(title, rows);
        self
    }

    /// Replace every data row of a table, keeping its header.
    pub fn set_data_rows(&self, title: &str, rows: Vec<RawRow>) {
        let mut sheets = self.sheets.lock();
        if let Some(sheet) = sheets.iter_mut().find(|s| s.title == title) {
            sheet.grid.truncate(1);
            sheet.grid.extend(rows);
        }
    }

    /// Every data row of a table as stored, header excluded.
    pub fn data_rows(&self, title: &str) -> Option<Vec<RawRow>> {
        let sheets = self.sheets.lock();
        let sheet = sheets.iter().find(|s| s.title == title)?;
        Some(sheet.grid.iter().skip(1).map(|r| trim_row(r.clone())).collect())
    }

    pub fn drop_table(&self, title: &str) {
        self.sheets.lock().retain(|s| s.title != title);
    }

    /// Make every call fail with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            reads: c.reads.load(Ordering::SeqCst),
            appends: c.appends.load(Ordering::SeqCst),
            overwrites: c.overwrites.load(Ordering::SeqCst),
            batches: c.batches.load(Ordering::SeqCst),
            deletes: c.deletes.load(Ordering::SeqCst),
            metadata: c.metadata.load(Ordering::SeqCst),
        }
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport("store unreachable".to_string()));
        }
        Ok(())
    }

    fn with_sheet<T>(&self, title: &str, f: impl FnOnce(&mut Sheet) -> T) -> Result<T> {
        let mut sheets = self.sheets.lock();
        let sheet = sheets
            .iter_mut()
            .find(|s| s.title == title)
            .ok_or_else(|| Error::NotFound(format!("Unable to parse range: {}", title)))?;
        Ok(f(sheet))
    }
}

fn trim_row(mut row: RawRow) -> RawRow {
    while row.last().is_some_and(CellValue::is_empty) {
        row.pop();
    }
    row
}

fn write_cells(grid: &mut Vec<RawRow>, range: &RangeExpr, first_row: usize, rows: &[RawRow]) {
    let bounds = range.bounds();
    for (i, row) in rows.iter().enumerate() {
        let r = first_row + i;
        if !bounds.contains_row(r) {
            break;
        }
        if grid.len() <= r {
            grid.resize_with(r + 1, Vec::new);
        }
        for (j, cell) in row.iter().enumerate() {
            let c = bounds.first_col + j;
            if !bounds.contains_col(c) {
                break;
            }
            let target = &mut grid[r];
            if target.len() <= c {
                target.resize(c + 1, CellValue::Empty);
            }
            target[c] = cell.clone();
        }
    }
}

#[async_trait]
impl RangeStore for MemoryRangeStore {
    async fn read_range(&self, range: &RangeExpr) -> Result<Vec<RawRow>> {
        self.enter(&self.counters.reads).await?;
        let bounds = range.bounds();
        self.with_sheet(&range.table, |sheet| {
            let mut rows: Vec<RawRow> = sheet
                .grid
                .iter()
                .enumerate()
                .filter(|(r, _)| bounds.contains_row(*r))
                .map(|(_, row)| {
                    let cells = row
                        .iter()
                        .enumerate()
                        .filter(|(c, _)| bounds.contains_col(*c))
                        .map(|(_, cell)| cell.clone())
                        .collect();
                    trim_row(cells)
                })
                .collect();
            while rows.last().is_some_and(Vec::is_empty) {
                rows.pop();
            }
            rows
        })
    }

    async fn append_rows(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()> {
        self.enter(&self.counters.appends).await?;
        let bounds = range.bounds();
        self.with_sheet(&range.table, |sheet| {
            let after_last = sheet
                .grid
                .iter()
                .rposition(|row| row.iter().any(|c| !c.is_empty()))
                .map_or(0, |last| last + 1);
            let start = after_last.max(bounds.first_row);
            // Only the column span of the target matters once the start row is known.
            let open = RangeExpr {
                table: range.table.clone(),
                start: range.start.map(|s| CellRef { row: None, ..s }),
                end: range.end.map(|e| CellRef { row: None, ..e }),
            };
            write_cells(&mut sheet.grid, &open, start, rows);
        })
    }

    async fn overwrite_range(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()> {
        self.enter(&self.counters.overwrites).await?;
        let first_row = range.bounds().first_row;
        self.with_sheet(&range.table, |sheet| {
            write_cells(&mut sheet.grid, range, first_row, rows)
        })
    }

    async fn batch_overwrite(&self, updates: &[RangeUpdate]) -> Result<()> {
        self.enter(&self.counters.batches).await?;
        let mut sheets = self.sheets.lock();
        // Validate every target before writing anything.
        for update in updates {
            if !sheets.iter().any(|s| s.title == update.range.table) {
                return Err(Error::NotFound(format!(
                    "Unable to parse range: {}",
                    update.range
                )));
            }
        }
        for update in updates {
            if let Some(sheet) = sheets.iter_mut().find(|s| s.title == update.range.table) {
                let first_row = update.range.bounds().first_row;
                write_cells(&mut sheet.grid, &update.range, first_row, &update.rows);
            }
        }
        Ok(())
    }

    async fn delete_row(&self, sheet_id: SheetId, positional_index: u32) -> Result<()> {
        self.enter(&self.counters.deletes).await?;
        let mut sheets = self.sheets.lock();
        let sheet = sheets
            .iter_mut()
            .find(|s| s.id == sheet_id)
            .ok_or_else(|| Error::NotFound(format!("No grid with id: {}", sheet_id)))?;
        let index = positional_index as usize;
        if index < sheet.grid.len() {
            sheet.grid.remove(index);
        }
        Ok(())
    }

    async fn sheet_metadata(&self) -> Result<Vec<SheetProperties>> {
        self.enter(&self.counters.metadata).await?;
        Ok(self
            .sheets
            .lock()
            .iter()
            .map(|s| SheetProperties {
                sheet_id: s.id,
                title: s.title.clone(),
            })
            .collect())
    }
}
