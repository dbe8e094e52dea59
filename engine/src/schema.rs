//! Table layouts.
//!
//! A table schema fixes what each column position means. The store has no
//! notion of columns beyond their letters, so the schema is the only place the
//! mapping from position to field lives.

use crate::{cell::CellValue, range::RangeExpr, TableName};
use serde::{Deserialize, Serialize};

/// Field types a column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Integer,
    Bool,
    Date,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Text => write!(f, "Text"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Integer => write!(f, "Integer"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Date => write!(f, "Date"),
        }
    }
}

/// Definition of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Header text
    pub name: String,
    /// Expected cell type. Row codecs decide their own coercions.
    pub field_type: FieldType,
    /// Whether the column is expected to be filled in. Descriptive only;
    /// parsing does not consult it.
    pub required: bool,
}

impl ColumnDef {
    /// Create a new required column definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional column definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }
}

/// Layout of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Sheet/tab name
    pub name: TableName,
    pub columns: Vec<ColumnDef>,
    /// Column holding the unique key
    pub key_column: u32,
}

impl TableSchema {
    /// Create a table schema keyed on its first column.
    pub fn new(name: impl Into<TableName>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            key_column: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.columns.len() as u32
    }

    /// Index of the column with the given header text.
    pub fn column_index(&self, name: &str) -> Option<u32> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| i as u32)
    }

    /// The range holding every data row.
    pub fn data_region(&self) -> RangeExpr {
        RangeExpr::data_region(self.name.clone(), self.width())
    }

    /// Header row as written when a table is first created.
    pub fn header_row(&self) -> Vec<CellValue> {
        self.columns
            .iter()
            .map(|c| CellValue::text(c.name.clone()))
            .collect()
    }

    /// Compare a header row read from the store against this layout.
    ///
    /// Returns a description of every mismatched position; empty if the
    /// header matches.
    pub fn header_mismatches(&self, header: &[CellValue]) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, column)| {
                let found = crate::cell::cell_at(header, i).display_text();
                (found.trim() != column.name).then(|| {
                    format!(
                        "column {}: expected '{}', found '{}'",
                        crate::range::column_letters(i as u32),
                        column.name,
                        found.trim()
                    )
                })
            })
            .collect()
    }
}
