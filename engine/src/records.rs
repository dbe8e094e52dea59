//! Typed records and their table layouts.
//!
//! Column order below is the order in the store and must not be changed
//! without migrating the tables.

use crate::codec::{RowCodec, RowReader, RowWriter};
use crate::entity::{Entity, EntityKind};
use crate::schema::{ColumnDef, FieldType, TableSchema};
use crate::snapshot::Dataset;
use crate::{cell::CellValue, RawRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PRODUCTS_TABLE: &str = "Products";
pub const SUPPLIERS_TABLE: &str = "Suppliers";
pub const INVENTORY_TABLE: &str = "Inventory";
pub const AUDIT_TABLE: &str = "AuditLog";

pub fn product_schema() -> TableSchema {
    TableSchema::new(
        PRODUCTS_TABLE,
        vec![
            ColumnDef::required("ID", FieldType::Text),
            ColumnDef::required("Name", FieldType::Text),
            ColumnDef::optional("SKU", FieldType::Text),
            ColumnDef::optional("Category", FieldType::Text),
            ColumnDef::optional("Unit Price", FieldType::Number),
            ColumnDef::optional("Reorder Level", FieldType::Integer),
            ColumnDef::optional("Supplier ID", FieldType::Text),
            ColumnDef::optional("Active", FieldType::Bool),
            ColumnDef::optional("Updated At", FieldType::Date),
        ],
    )
}

pub fn supplier_schema() -> TableSchema {
    TableSchema::new(
        SUPPLIERS_TABLE,
        vec![
            ColumnDef::required("ID", FieldType::Text),
            ColumnDef::required("Name", FieldType::Text),
            ColumnDef::optional("Contact", FieldType::Text),
            ColumnDef::optional("Email", FieldType::Text),
            ColumnDef::optional("Phone", FieldType::Text),
            ColumnDef::optional("Lead Time Days", FieldType::Integer),
            ColumnDef::optional("Notes", FieldType::Text),
        ],
    )
}

pub fn inventory_schema() -> TableSchema {
    TableSchema::new(
        INVENTORY_TABLE,
        vec![
            ColumnDef::required("ID", FieldType::Text),
            ColumnDef::required("Product ID", FieldType::Text),
            ColumnDef::optional("Location", FieldType::Text),
            ColumnDef::required("Quantity", FieldType::Integer),
            ColumnDef::optional("Last Counted", FieldType::Date),
            ColumnDef::optional("Notes", FieldType::Text),
        ],
    )
}

pub fn audit_schema() -> TableSchema {
    TableSchema::new(
        AUDIT_TABLE,
        vec![
            ColumnDef::required("Timestamp", FieldType::Date),
            ColumnDef::required("Actor", FieldType::Text),
            ColumnDef::required("Action", FieldType::Text),
            ColumnDef::optional("Target ID", FieldType::Text),
            ColumnDef::optional("Details", FieldType::Text),
        ],
    )
}

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<f64>,
    pub reorder_level: Option<i64>,
    pub supplier_id: Option<String>,
    /// Empty cells read as active
    pub active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            category: None,
            unit_price: None,
            reorder_level: None,
            supplier_id: None,
            active: true,
            updated_at: None,
        }
    }
}

impl RowCodec for Product {
    fn parse(row: &[CellValue], _row_index: usize) -> Option<Self> {
        let r = RowReader::new(row);
        Some(Self {
            id: r.required_text(0)?,
            name: r.required_text(1)?,
            sku: r.optional_text(2)?,
            category: r.optional_text(3)?,
            unit_price: r.optional_number(4)?,
            reorder_level: r.optional_integer(5)?,
            supplier_id: r.optional_text(6)?,
            active: r.optional_bool(7)?.unwrap_or(true),
            updated_at: r.optional_date(8)?,
        })
    }

    fn serialize(&self) -> RawRow {
        RowWriter::with_width(9)
            .text(&self.id)
            .text(&self.name)
            .opt_text(self.sku.as_deref())
            .opt_text(self.category.as_deref())
            .opt_number(self.unit_price)
            .opt_integer(self.reorder_level)
            .opt_text(self.supplier_id.as_deref())
            .boolean(self.active)
            .opt_date(self.updated_at.as_ref())
            .finish()
    }
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Products;

    fn key(&self) -> &str {
        &self.id
    }

    fn collection(dataset: &Dataset) -> &Vec<Self> {
        &dataset.products
    }

    fn collection_mut(dataset: &mut Dataset) -> &mut Vec<Self> {
        &mut dataset.products
    }
}

/// A vendor products are ordered from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lead_time_days: Option<i64>,
    pub notes: Option<String>,
}

impl Supplier {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            contact: None,
            email: None,
            phone: None,
            lead_time_days: None,
            notes: None,
        }
    }
}

impl RowCodec for Supplier {
    fn parse(row: &[CellValue], _row_index: usize) -> Option<Self> {
        let r = RowReader::new(row);
        Some(Self {
            id: r.required_text(0)?,
            name: r.required_text(1)?,
            contact: r.optional_text(2)?,
            email: r.optional_text(3)?,
            phone: r.optional_text(4)?,
            lead_time_days: r.optional_integer(5)?,
            notes: r.optional_text(6)?,
        })
    }

    fn serialize(&self) -> RawRow {
        RowWriter::with_width(7)
            .text(&self.id)
            .text(&self.name)
            .opt_text(self.contact.as_deref())
            .opt_text(self.email.as_deref())
            .opt_text(self.phone.as_deref())
            .opt_integer(self.lead_time_days)
            .opt_text(self.notes.as_deref())
            .finish()
    }
}

impl Entity for Supplier {
    const KIND: EntityKind = EntityKind::Suppliers;

    fn key(&self) -> &str {
        &self.id
    }

    fn collection(dataset: &Dataset) -> &Vec<Self> {
        &dataset.suppliers
    }

    fn collection_mut(dataset: &mut Dataset) -> &mut Vec<Self> {
        &mut dataset.suppliers
    }
}

/// Stock of one product at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub product_id: String,
    pub location: Option<String>,
    pub quantity: i64,
    pub last_counted: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl InventoryItem {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            location: None,
            quantity,
            last_counted: None,
            notes: None,
        }
    }
}

impl RowCodec for InventoryItem {
    fn parse(row: &[CellValue], _row_index: usize) -> Option<Self> {
        let r = RowReader::new(row);
        Some(Self {
            id: r.required_text(0)?,
            product_id: r.required_text(1)?,
            location: r.optional_text(2)?,
            quantity: r.required_integer(3)?,
            last_counted: r.optional_date(4)?,
            notes: r.optional_text(5)?,
        })
    }

    fn serialize(&self) -> RawRow {
        RowWriter::with_width(6)
            .text(&self.id)
            .text(&self.product_id)
            .opt_text(self.location.as_deref())
            .integer(self.quantity)
            .opt_date(self.last_counted.as_ref())
            .opt_text(self.notes.as_deref())
            .finish()
    }
}

impl Entity for InventoryItem {
    const KIND: EntityKind = EntityKind::Inventory;

    fn key(&self) -> &str {
        &self.id
    }

    fn collection(dataset: &Dataset) -> &Vec<Self> {
        &dataset.inventory
    }

    fn collection_mut(dataset: &mut Dataset) -> &mut Vec<Self> {
        &mut dataset.inventory
    }
}

/// One line of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub target_id: Option<String>,
    pub details: Option<String>,
    /// Position in the log as read; not stored.
    #[serde(skip)]
    pub sequence: Option<usize>,
}

impl AuditEvent {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        target_id: Option<String>,
        details: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            actor: actor.into(),
            action: action.into(),
            target_id,
            details,
            sequence: None,
        }
    }
}

impl RowCodec for AuditEvent {
    fn parse(row: &[CellValue], row_index: usize) -> Option<Self> {
        let r = RowReader::new(row);
        Some(Self {
            timestamp: r.required_date(0)?,
            actor: r.required_text(1)?,
            action: r.required_text(2)?,
            target_id: r.optional_text(3)?,
            details: r.optional_text(4)?,
            sequence: Some(row_index),
        })
    }

    fn serialize(&self) -> RawRow {
        RowWriter::with_width(5)
            .date(&self.timestamp)
            .text(&self.actor)
            .text(&self.action)
            .opt_text(self.target_id.as_deref())
            .opt_text(self.details.as_deref())
            .finish()
    }
}
