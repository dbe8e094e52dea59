//! Row codecs: raw rows to typed records and back.
//!
//! Parsing is tolerant and total. A row whose key is empty, or whose
//! non-empty cells cannot be coerced to the column's type, parses to `None`
//! and is dropped by the caller; it never aborts a table read.
//!
//! Serialization is strict and total. Absent optional fields become empty
//! cells, so a serialized row always has exactly the table's width.

use crate::cell::{cell_at, CellValue, RawRow};
use crate::coerce;
use chrono::{DateTime, Utc};

/// Conversion between a raw row and a typed record.
pub trait RowCodec: Sized {
    /// Parse a data row. `row_index` is the 0-based position within the read.
    fn parse(row: &[CellValue], row_index: usize) -> Option<Self>;

    /// Serialize to a row of the table's full width.
    fn serialize(&self) -> RawRow;
}

/// Column-wise accessor used by codec implementations.
///
/// `required_*` methods return `None` when the cell is empty or malformed.
/// `optional_*` methods return `Some(None)` for an empty cell and `None` for
/// a malformed one, so `?` rejects the row in both cases that matter.
pub struct RowReader<'a> {
    row: &'a [CellValue],
}

impl<'a> RowReader<'a> {
    pub fn new(row: &'a [CellValue]) -> Self {
        Self { row }
    }

    fn cell(&self, column: usize) -> &'a CellValue {
        cell_at(self.row, column)
    }

    fn optional<T>(
        &self,
        column: usize,
        coerce: impl Fn(&CellValue) -> Option<T>,
    ) -> Option<Option<T>> {
        let cell = self.cell(column);
        if cell.is_empty() {
            return Some(None);
        }
        coerce(cell).map(Some)
    }

    pub fn required_text(&self, column: usize) -> Option<String> {
        coerce::text(self.cell(column))
    }

    pub fn optional_text(&self, column: usize) -> Option<Option<String>> {
        self.optional(column, coerce::text)
    }

    pub fn required_number(&self, column: usize) -> Option<f64> {
        coerce::number(self.cell(column))
    }

    pub fn optional_number(&self, column: usize) -> Option<Option<f64>> {
        self.optional(column, coerce::number)
    }

    pub fn required_integer(&self, column: usize) -> Option<i64> {
        coerce::integer(self.cell(column))
    }

    pub fn optional_integer(&self, column: usize) -> Option<Option<i64>> {
        self.optional(column, coerce::integer)
    }

    pub fn optional_bool(&self, column: usize) -> Option<Option<bool>> {
        self.optional(column, coerce::boolean)
    }

    pub fn required_date(&self, column: usize) -> Option<DateTime<Utc>> {
        coerce::date(self.cell(column))
    }

    pub fn optional_date(&self, column: usize) -> Option<Option<DateTime<Utc>>> {
        self.optional(column, coerce::date)
    }
}

/// Builder for serialized rows.
#[derive(Debug, Default)]
pub struct RowWriter {
    cells: RawRow,
}

impl RowWriter {
    pub fn with_width(width: usize) -> Self {
        Self {
            cells: Vec::with_capacity(width),
        }
    }

    pub fn text(mut self, value: &str) -> Self {
        self.cells.push(CellValue::text(value));
        self
    }

    pub fn opt_text(mut self, value: Option<&str>) -> Self {
        self.cells.push(coerce::text_cell(value));
        self
    }

    pub fn number(mut self, value: f64) -> Self {
        self.cells.push(CellValue::number(value));
        self
    }

    pub fn opt_number(mut self, value: Option<f64>) -> Self {
        self.cells.push(value.map_or(CellValue::Empty, CellValue::number));
        self
    }

    pub fn integer(mut self, value: i64) -> Self {
        self.cells.push(CellValue::Number(value as f64));
        self
    }

    pub fn opt_integer(mut self, value: Option<i64>) -> Self {
        self.cells
            .push(value.map_or(CellValue::Empty, |v| CellValue::Number(v as f64)));
        self
    }

    pub fn boolean(mut self, value: bool) -> Self {
        self.cells.push(CellValue::Bool(value));
        self
    }

    pub fn date(mut self, value: &DateTime<Utc>) -> Self {
        self.cells.push(coerce::date_cell(value));
        self
    }

    pub fn opt_date(mut self, value: Option<&DateTime<Utc>>) -> Self {
        self.cells
            .push(value.map_or(CellValue::Empty, coerce::date_cell));
        self
    }

    pub fn finish(self) -> RawRow {
        self.cells
    }
}

/// Parse every row, dropping the ones that do not parse. Order is preserved.
pub fn parse_rows<T: RowCodec>(rows: &[RawRow]) -> Vec<T> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| T::parse(row, i))
        .collect()
}
