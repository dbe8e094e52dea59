//! Cell values as they travel to and from the remote tabular store.
//!
//! The store hands back loosely typed JSON scalars. A cell is either empty,
//! text, a number, or a boolean; anything richer is flattened to text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single untyped cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value. Serialized as `""`, which clears the cell on write.
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

/// An ordered row of cells. Column N always means the same field for a table.
pub type RawRow = Vec<CellValue>;

impl CellValue {
    /// Build a text cell, collapsing blank strings to [`CellValue::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// Build a numeric cell, rejecting values the store cannot represent.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            CellValue::Number(value)
        } else {
            CellValue::Empty
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed text content, if this is a non-blank text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// The cell rendered the way the store displays it.
    ///
    /// Whole numbers render without a fractional part so that a key stored as
    /// `1042` matches the text `"1042"`.
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
        }
    }
}

/// Read cell `index` of `row`, treating missing trailing cells as empty.
pub fn cell_at(row: &[CellValue], index: usize) -> &CellValue {
    const EMPTY: &CellValue = &CellValue::Empty;
    row.get(index).unwrap_or(EMPTY)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::number),
            serde_json::Value::String(s) => CellValue::text(s),
            other => CellValue::text(other.to_string()),
        }
    }
}

impl From<&CellValue> for serde_json::Value {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Empty => serde_json::Value::String(String::new()),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map_or_else(|| serde_json::Value::String(String::new()), Into::into),
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(CellValue::from)
    }
}
