//! # Tabula Engine
//!
//! Pure logic for treating a remote spreadsheet as a small database.
//!
//! The remote store only understands rectangular cell ranges. It has no row
//! identifiers, no transactions, and rows shift whenever one above them is
//! deleted. This crate holds everything about that model that does not
//! touch the network:
//!
//! - [`cell`]: untyped cells as the store returns them
//! - [`range`]: A1 range expressions and [`LogicalRow`] positions
//! - [`schema`]: fixed table layouts
//! - [`coerce`] and [`codec`]: tolerant parsing and strict serialization
//! - [`records`]: the typed records (`Product`, `Supplier`, `InventoryItem`,
//!   `AuditEvent`)
//! - [`action`] and [`queue`]: pending mutation intents and the FIFO queue
//!   that holds them until they are confirmed
//! - [`snapshot`]: the cached dataset and content fingerprints
//!
//! ## Design Principles
//!
//! - **No IO**: nothing here knows about HTTP, files, or timers
//! - **Total parsing**: a malformed row parses to `None`, never a panic
//! - **Re-appliable intents**: every queued action is safe to apply twice
//!
//! ## Quick Start
//!
//! ```rust
//! use tabula_engine::{CellValue, Product, RangeExpr, RowCodec};
//!
//! let row = vec![CellValue::text("P-1"), CellValue::text("Widget"), CellValue::Empty,
//!                CellValue::Empty, CellValue::text("$4.50")];
//! let product = Product::parse(&row, 0).unwrap();
//! assert_eq!(product.unit_price, Some(4.5));
//!
//! let range = RangeExpr::data_region("Products", 9);
//! assert_eq!(range.to_string(), "Products!A2:I");
//! ```

pub mod action;
pub mod cell;
pub mod codec;
pub mod coerce;
pub mod entity;
pub mod error;
pub mod queue;
pub mod range;
pub mod records;
pub mod schema;
pub mod snapshot;

// Re-export main types at crate root
pub use action::{ActionId, ActionKind, PendingAction};
pub use cell::{CellValue, RawRow};
pub use codec::{parse_rows, RowCodec};
pub use entity::{Entity, EntityKind};
pub use error::Error;
pub use queue::{OfflineQueue, QueueSnapshot, QUEUE_FORMAT_VERSION};
pub use range::{column_letters, CellRef, LogicalRow, RangeExpr, HEADER_ROWS};
pub use records::{
    audit_schema, AuditEvent, InventoryItem, Product, Supplier, AUDIT_TABLE, INVENTORY_TABLE,
    PRODUCTS_TABLE, SUPPLIERS_TABLE,
};
pub use schema::{ColumnDef, FieldType, TableSchema};
pub use snapshot::{CacheSnapshot, Dataset, Fingerprint};

/// Type aliases for clarity
pub type TableName = String;
pub type SheetId = i64;
