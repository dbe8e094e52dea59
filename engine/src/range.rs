//! A1-style range addressing.
//!
//! Every call against the tabular store targets `"<table>!<start>:<end>"`.
//! An omitted end row (`Products!A2:F`) means "to the end of data".
//!
//! Rows inside a table's data region are addressed with [`LogicalRow`], a
//! 1-based position that excludes the header. A logical row is only valid
//! until the next append or delete on the same table: deleting row 1 shifts
//! every later row up by one.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of header rows above each table's data region.
pub const HEADER_ROWS: u32 = 1;

/// Convert a 0-based column index to its letters (`0 -> A`, `26 -> AA`).
pub fn column_letters(index: u32) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a 0-based index (`A -> 0`, `AA -> 26`).
pub fn column_index(letters: &str) -> Result<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return Err(Error::InvalidColumn(letters.to_string()));
    }
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidColumn(letters.to_string()));
        }
        n = n * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Ok(n - 1)
}

/// Position of a row within a table's data region, 1-based, header excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalRow(u32);

impl LogicalRow {
    pub fn new(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidRow(n));
        }
        Ok(Self(n))
    }

    /// Logical row for the `offset`-th data row of a read (0-based).
    pub fn from_offset(offset: usize) -> Self {
        Self(offset as u32 + 1)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// 1-based row number in A1 notation.
    pub fn sheet_row(self) -> u32 {
        self.0 + HEADER_ROWS
    }

    /// 0-based row index used by delete-by-position.
    pub fn positional_index(self) -> u32 {
        self.0 + HEADER_ROWS - 1
    }
}

impl fmt::Display for LogicalRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One corner of a range. Either coordinate may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellRef {
    /// 0-based column index
    pub column: Option<u32>,
    /// 1-based sheet row
    pub row: Option<u32>,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self {
            column: Some(column),
            row: Some(row),
        }
    }

    pub fn column(column: u32) -> Self {
        Self {
            column: Some(column),
            row: None,
        }
    }

    fn parse(s: &str, original: &str) -> Result<Self> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);

        let column = if letters.is_empty() {
            None
        } else {
            Some(column_index(letters).map_err(|_| Error::InvalidRange(original.to_string()))?)
        };
        let row = if digits.is_empty() {
            None
        } else {
            let row: u32 = digits
                .parse()
                .map_err(|_| Error::InvalidRange(original.to_string()))?;
            if row == 0 {
                return Err(Error::InvalidRange(original.to_string()));
            }
            Some(row)
        };

        if column.is_none() && row.is_none() {
            return Err(Error::InvalidRange(original.to_string()));
        }
        Ok(Self { column, row })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(column) = self.column {
            write!(f, "{}", column_letters(column))?;
        }
        if let Some(row) = self.row {
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Resolved 0-based bounds of a range. `None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first_row: usize,
    pub last_row: Option<usize>,
    pub first_col: usize,
    pub last_col: Option<usize>,
}

impl Bounds {
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.first_row && self.last_row.map_or(true, |last| row <= last)
    }

    pub fn contains_col(&self, col: usize) -> bool {
        col >= self.first_col && self.last_col.map_or(true, |last| col <= last)
    }
}

/// A rectangular region of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeExpr {
    pub table: String,
    /// `None` addresses the whole table.
    pub start: Option<CellRef>,
    pub end: Option<CellRef>,
}

impl RangeExpr {
    /// The whole table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            start: None,
            end: None,
        }
    }

    /// Full-height column span, e.g. `AuditLog!A:E`. Used as an append target.
    pub fn columns(table: impl Into<String>, width: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::column(0)),
            end: Some(CellRef::column(width.saturating_sub(1))),
        }
    }

    /// Every data row of a table `width` columns wide: `Products!A2:H`.
    pub fn data_region(table: impl Into<String>, width: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::new(0, HEADER_ROWS + 1)),
            end: Some(CellRef::column(width.saturating_sub(1))),
        }
    }

    /// One column of the data region: `Products!C2:C`.
    pub fn data_column(table: impl Into<String>, column: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::new(column, HEADER_ROWS + 1)),
            end: Some(CellRef::column(column)),
        }
    }

    /// A single cell of the data region.
    pub fn cell(table: impl Into<String>, row: LogicalRow, column: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::new(column, row.sheet_row())),
            end: None,
        }
    }

    /// One full data row: `Products!A5:H5`.
    pub fn row(table: impl Into<String>, row: LogicalRow, width: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::new(0, row.sheet_row())),
            end: Some(CellRef::new(width.saturating_sub(1), row.sheet_row())),
        }
    }

    /// The header row: `Products!A1:H1`.
    pub fn header(table: impl Into<String>, width: u32) -> Self {
        Self {
            table: table.into(),
            start: Some(CellRef::new(0, 1)),
            end: Some(CellRef::new(width.saturating_sub(1), HEADER_ROWS)),
        }
    }

    /// Parse `Table!A2:F`, `'Stock Levels'!B3`, or a bare table name.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (table, cells) = split_table(s)?;

        let Some(cells) = cells else {
            return Ok(Self::table(table));
        };

        let (start, end) = match cells.split_once(':') {
            Some((a, b)) => (CellRef::parse(a, s)?, Some(CellRef::parse(b, s)?)),
            None => (CellRef::parse(cells, s)?, None),
        };

        Ok(Self {
            table,
            start: Some(start),
            end,
        })
    }

    /// Resolve the range to 0-based bounds.
    pub fn bounds(&self) -> Bounds {
        let Some(start) = self.start else {
            return Bounds {
                first_row: 0,
                last_row: None,
                first_col: 0,
                last_col: None,
            };
        };

        let first_row = start.row.map_or(0, |r| r as usize - 1);
        let first_col = start.column.map_or(0, |c| c as usize);

        let (last_row, last_col) = match self.end {
            Some(end) => (
                end.row.map(|r| r as usize - 1),
                end.column.map(|c| c as usize),
            ),
            // A single reference: one cell, or a whole row/column.
            None => (
                start.row.map(|r| r as usize - 1),
                start.column.map(|c| c as usize),
            ),
        };

        Bounds {
            first_row,
            last_row,
            first_col,
            last_col,
        }
    }
}

fn split_table(s: &str) -> Result<(String, Option<&str>)> {
    if let Some(rest) = s.strip_prefix('\'') {
        // Quoted name; '' escapes a literal quote.
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    name.push('\'');
                    chars.next();
                    continue;
                }
                let tail = &rest[i + 1..];
                return match tail.strip_prefix('!') {
                    Some(cells) if !cells.is_empty() => Ok((name, Some(cells))),
                    None if tail.is_empty() => Ok((name, None)),
                    _ => Err(Error::InvalidRange(s.to_string())),
                };
            }
            name.push(c);
        }
        return Err(Error::InvalidRange(s.to_string()));
    }

    match s.split_once('!') {
        Some((table, cells)) if !table.is_empty() && !cells.is_empty() => {
            Ok((table.to_string(), Some(cells)))
        }
        None if !s.is_empty() => Ok((s.to_string(), None)),
        _ => Err(Error::InvalidRange(s.to_string())),
    }
}

fn needs_quotes(table: &str) -> bool {
    !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for RangeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if needs_quotes(&self.table) {
            write!(f, "'{}'", self.table.replace('\'', "''"))?;
        } else {
            write!(f, "{}", self.table)?;
        }
        if let Some(start) = self.start {
            write!(f, "!{}", start)?;
            if let Some(end) = self.end {
                write!(f, ":{}", end)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for RangeExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
