//! Entity-shaped operations over the range store.
//!
//! Logical row numbers handed out here describe a row's position at the
//! moment of the read that produced them. Any append or delete on the same
//! table invalidates every row number below the change, so callers resolve
//! a row immediately before acting on it and never hold one across another
//! mutation. When several rows must go in one pass,
//! [`delete_logical_rows`](TableRepository::delete_logical_rows) removes
//! them bottom-up.
//!
//! Every successful mutation emits one audit event. Audit failures are
//! logged and never fail the mutation.

use crate::error::{Error, Result};
use crate::resolver::SheetIdentityResolver;
use crate::store::RangeStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tabula_engine::{
    audit_schema, cell::cell_at, coerce, parse_rows, AuditEvent, CellValue, Entity, Fingerprint,
    LogicalRow, RangeExpr, RawRow, RowCodec, TableSchema, AUDIT_TABLE,
};

/// Raw contents of a table's data region.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRead {
    pub rows: Vec<RawRow>,
    pub fingerprint: Fingerprint,
}

impl TableRead {
    pub fn new(rows: Vec<RawRow>) -> Self {
        let fingerprint = Fingerprint::of(&rows);
        Self { rows, fingerprint }
    }

    /// Parse every row, dropping the ones that do not parse.
    pub fn parse<C: RowCodec>(&self, table: &str) -> Vec<C> {
        let records: Vec<C> = parse_rows(&self.rows);
        let skipped = self.rows.len() - records.len();
        if skipped > 0 {
            tracing::debug!(table = %table, skipped, "Skipped unparseable rows");
        }
        records
    }
}

/// Destination of audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Appends audit events to the audit table of the same store.
pub struct TableAuditSink {
    store: Arc<dyn RangeStore>,
    range: RangeExpr,
}

impl TableAuditSink {
    pub fn new(store: Arc<dyn RangeStore>) -> Self {
        Self {
            store,
            range: RangeExpr::columns(AUDIT_TABLE, audit_schema().width()),
        }
    }
}

#[async_trait]
impl AuditSink for TableAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.store.append_rows(&self.range, &[RowCodec::serialize(&event)]).await
    }
}

/// Discards audit events.
#[derive(Debug, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Table operations composed from the range store, the sheet id resolver
/// and the row codecs. Adds no retries; store failures propagate unchanged.
pub struct TableRepository {
    store: Arc<dyn RangeStore>,
    resolver: SheetIdentityResolver,
    audit: Arc<dyn AuditSink>,
    actor: String,
}

impl TableRepository {
    pub fn new(store: Arc<dyn RangeStore>, audit: Arc<dyn AuditSink>, actor: impl Into<String>) -> Self {
        Self {
            resolver: SheetIdentityResolver::new(store.clone()),
            store,
            audit,
            actor: actor.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RangeStore> {
        &self.store
    }

    pub fn resolver(&self) -> &SheetIdentityResolver {
        &self.resolver
    }

    /// Read a table's data region without parsing it.
    pub async fn read_table(&self, schema: &TableSchema) -> Result<TableRead> {
        let rows = self.store.read_range(&schema.data_region()).await?;
        Ok(TableRead::new(rows))
    }

    /// Every record of a table, in table order. Rows that do not parse are
    /// dropped.
    pub async fn list_all<C: RowCodec>(&self, schema: &TableSchema) -> Result<Vec<C>> {
        Ok(self.read_table(schema).await?.parse(&schema.name))
    }

    /// Every record of an entity kind.
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        self.list_all(&E::KIND.schema()).await
    }

    /// Position of the first row whose `column` equals `value`.
    ///
    /// Reads only that column. Comparison is exact after trimming and
    /// case-sensitive. Cost is linear in table size, so this is for single
    /// lookups, never for a loop over many keys.
    pub async fn find_row_by_unique_value(
        &self,
        table: &str,
        column: u32,
        value: &str,
    ) -> Result<Option<LogicalRow>> {
        let needle = value.trim();
        let cells = self
            .store
            .read_range(&RangeExpr::data_column(table, column))
            .await?;
        Ok(cells
            .iter()
            .position(|row| cell_at(row, 0).display_text().trim() == needle)
            .map(LogicalRow::from_offset))
    }

    /// Append one row after the table's last populated row.
    pub async fn append_one(&self, schema: &TableSchema, row: RawRow) -> Result<()> {
        let target = key_of(schema, &row);
        let range = RangeExpr::columns(schema.name.clone(), schema.width());
        self.store.append_rows(&range, &[row]).await?;
        tracing::debug!(table = %schema.name, target = ?target, "Appended row");
        self.audit("append", target, Some(schema.name.clone())).await;
        Ok(())
    }

    /// Overwrite one cell.
    pub async fn update_cell(
        &self,
        table: &str,
        row: LogicalRow,
        column: u32,
        value: CellValue,
    ) -> Result<()> {
        let range = RangeExpr::cell(table, row, column);
        let details = format!("{} = {}", range, value.display_text());
        self.store.overwrite_range(&range, &[vec![value]]).await?;
        tracing::debug!(range = %range, "Updated cell");
        self.audit("update_cell", Some(range.to_string()), Some(details))
            .await;
        Ok(())
    }

    /// Overwrite a whole row.
    pub async fn update_row(&self, schema: &TableSchema, row: LogicalRow, cells: RawRow) -> Result<()> {
        let target = key_of(schema, &cells);
        let range = RangeExpr::row(schema.name.clone(), row, schema.width());
        self.store.overwrite_range(&range, &[cells]).await?;
        tracing::debug!(range = %range, "Updated row");
        self.audit("update", target, Some(range.to_string())).await;
        Ok(())
    }

    /// Delete one row.
    ///
    /// `row` must come from a read made after the last mutation of this
    /// table; every row below it shifts up once this returns. `target` is
    /// the key of the entity being removed and becomes the audit target;
    /// without one the row position is recorded instead.
    ///
    /// A NotFound from the store may mean the table was recreated under a
    /// new id, so the cached id is dropped and the delete retried once.
    pub async fn delete_logical_row(
        &self,
        table: &str,
        row: LogicalRow,
        target: Option<&str>,
    ) -> Result<()> {
        let sheet_id = self.resolver.resolve(table).await?;
        let sheet_id = match self.store.delete_row(sheet_id, row.positional_index()).await {
            Ok(()) => sheet_id,
            Err(Error::NotFound(message)) => {
                tracing::debug!(
                    table = %table,
                    sheet_id,
                    %message,
                    "Sheet id went stale, resolving again"
                );
                self.resolver.invalidate(table);
                let fresh = self.resolver.resolve(table).await?;
                self.store.delete_row(fresh, row.positional_index()).await?;
                fresh
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(table = %table, row = %row, sheet_id, "Deleted row");
        let target = target.map_or_else(|| format!("{}#{}", table, row), str::to_string);
        self.audit("delete", Some(target), Some(format!("{}!{}", table, row.sheet_row())))
            .await;
        Ok(())
    }

    /// Delete several rows resolved by a single read.
    ///
    /// Rows are removed bottom-up so that no deletion shifts a row still
    /// waiting to be deleted. Duplicates are ignored.
    pub async fn delete_logical_rows(&self, table: &str, mut rows: Vec<LogicalRow>) -> Result<()> {
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        for row in rows {
            self.delete_logical_row(table, row, None).await?;
        }
        Ok(())
    }

    /// Compare a table's header row against its schema.
    ///
    /// Returns one message per mismatched column.
    pub async fn verify_header(&self, schema: &TableSchema) -> Result<Vec<String>> {
        let header = self
            .store
            .read_range(&RangeExpr::header(schema.name.clone(), schema.width()))
            .await?;
        let first = header.into_iter().next().unwrap_or_default();
        Ok(schema.header_mismatches(&first))
    }

    async fn audit(&self, action: &str, target_id: Option<String>, details: Option<String>) {
        let event = AuditEvent::new(self.actor.clone(), action, target_id, details, Utc::now());
        if let Err(e) = self.audit.record(event).await {
            tracing::warn!(action = %action, error = %e, "Failed to record audit event");
        }
    }
}

fn key_of(schema: &TableSchema, row: &[CellValue]) -> Option<String> {
    coerce::text(cell_at(row, schema.key_column as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRangeStore;
    use tabula_engine::{ColumnDef, FieldType, Product, PRODUCTS_TABLE};

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| CellValue::text(*c)).collect()
    }

    fn items_schema() -> TableSchema {
        TableSchema::new(
            "Items",
            vec![
                ColumnDef::required("Key", FieldType::Text),
                ColumnDef::optional("Qty", FieldType::Integer),
            ],
        )
    }

    fn setup(rows: Vec<RawRow>) -> (Arc<MemoryRangeStore>, TableRepository) {
        let store = Arc::new(MemoryRangeStore::new().with_table("Items", &["Key", "Qty"], rows));
        store.add_table(AUDIT_TABLE, &["Timestamp", "Actor", "Action", "Target ID", "Details"]);
        let audit = Arc::new(TableAuditSink::new(store.clone()));
        let repo = TableRepository::new(store.clone(), audit, "tester");
        (store, repo)
    }

    fn audit_actions(store: &MemoryRangeStore) -> Vec<String> {
        store
            .data_rows(AUDIT_TABLE)
            .unwrap()
            .iter()
            .map(|r| cell_at(r, 2).display_text())
            .collect()
    }

    #[tokio::test]
    async fn find_then_delete_then_find_again() {
        let (store, repo) = setup(vec![row(&["A1", "5"]), row(&["B1", "3"])]);

        let found = repo.find_row_by_unique_value("Items", 0, "B1").await.unwrap();
        assert_eq!(found, Some(LogicalRow::new(2).unwrap()));

        repo.delete_logical_row("Items", found.unwrap(), Some("B1"))
            .await
            .unwrap();
        assert_eq!(store.data_rows("Items").unwrap(), vec![row(&["A1", "5"])]);

        let again = repo.find_row_by_unique_value("Items", 0, "B1").await.unwrap();
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn row_numbers_shift_after_delete() {
        let (_store, repo) = setup(vec![row(&["A"]), row(&["B"]), row(&["C"])]);

        let c_before = repo.find_row_by_unique_value("Items", 0, "C").await.unwrap();
        assert_eq!(c_before, Some(LogicalRow::new(3).unwrap()));

        repo.delete_logical_row("Items", LogicalRow::new(1).unwrap(), None)
            .await
            .unwrap();

        let c_after = repo.find_row_by_unique_value("Items", 0, "C").await.unwrap();
        assert_eq!(c_after, Some(LogicalRow::new(2).unwrap()));
    }

    #[tokio::test]
    async fn match_is_trimmed_and_case_sensitive() {
        let (_store, repo) = setup(vec![row(&["  abc "]), row(&["ABC"])]);
        let found = repo.find_row_by_unique_value("Items", 0, "ABC").await.unwrap();
        assert_eq!(found, Some(LogicalRow::new(2).unwrap()));
        let found = repo.find_row_by_unique_value("Items", 0, "abc").await.unwrap();
        assert_eq!(found, Some(LogicalRow::new(1).unwrap()));
    }

    #[tokio::test]
    async fn bulk_delete_goes_bottom_up() {
        let rows = vec![row(&["A"]), row(&["B"]), row(&["C"]), row(&["D"])];
        let (store, repo) = setup(rows);
        let rows = vec![1, 3, 3]
            .into_iter()
            .map(|n| LogicalRow::new(n).unwrap())
            .collect();

        repo.delete_logical_rows("Items", rows).await.unwrap();
        assert_eq!(store.data_rows("Items").unwrap(), vec![row(&["B"]), row(&["D"])]);
        assert_eq!(store.calls().deletes, 2);
    }

    #[tokio::test]
    async fn mutations_are_audited() {
        let (store, repo) = setup(vec![row(&["A1", "5"])]);
        let schema = items_schema();

        repo.append_one(&schema, row(&["B1", "3"])).await.unwrap();
        repo.update_cell("Items", LogicalRow::new(1).unwrap(), 1, CellValue::Number(6.0))
            .await
            .unwrap();
        repo.update_row(&schema, LogicalRow::new(2).unwrap(), row(&["B1", "4"]))
            .await
            .unwrap();
        repo.delete_logical_row("Items", LogicalRow::new(1).unwrap(), Some("A1"))
            .await
            .unwrap();

        assert_eq!(store.data_rows("Items").unwrap(), vec![row(&["B1", "4"])]);
        assert_eq!(
            audit_actions(&store),
            vec!["append", "update_cell", "update", "delete"]
        );
        let events: Vec<AuditEvent> = parse_rows(&store.data_rows(AUDIT_TABLE).unwrap());
        assert!(events.iter().all(|e| e.actor == "tester"));
        assert_eq!(events[0].target_id.as_deref(), Some("B1"));
        assert_eq!(events[3].target_id.as_deref(), Some("A1"));
        assert_eq!(events[3].details.as_deref(), Some("Items!2"));
    }

    #[tokio::test]
    async fn delete_without_key_records_position() {
        let (store, repo) = setup(vec![row(&["A1"]), row(&["B1"])]);
        repo.delete_logical_rows("Items", vec![LogicalRow::new(2).unwrap()])
            .await
            .unwrap();

        let events: Vec<AuditEvent> = parse_rows(&store.data_rows(AUDIT_TABLE).unwrap());
        assert_eq!(events[0].target_id.as_deref(), Some("Items#2"));
    }

    #[tokio::test]
    async fn delete_survives_recreated_table() {
        let (store, repo) = setup(vec![row(&["A1"]), row(&["B1"])]);
        let stale = repo.resolver().resolve("Items").await.unwrap();

        // Same title, new id.
        store.drop_table("Items");
        store.add_table("Items", &["Key", "Qty"]);
        store.set_data_rows("Items", vec![row(&["C1"]), row(&["D1"])]);
        let fresh = store.sheet_metadata().await.unwrap();
        let fresh = fresh.iter().find(|s| s.title == "Items").unwrap().sheet_id;
        assert_ne!(stale, fresh);

        let found = repo.find_row_by_unique_value("Items", 0, "D1").await.unwrap().unwrap();
        repo.delete_logical_row("Items", found, Some("D1")).await.unwrap();

        assert_eq!(store.data_rows("Items").unwrap(), vec![row(&["C1"])]);
        assert_eq!(repo.resolver().cached("Items"), Some(fresh));
    }

    #[tokio::test]
    async fn delete_of_vanished_table_still_fails() {
        let (store, repo) = setup(vec![row(&["A1"])]);
        repo.resolver().resolve("Items").await.unwrap();
        store.drop_table("Items");

        let err = repo
            .delete_logical_row("Items", LogicalRow::new(1).unwrap(), Some("A1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(repo.resolver().cached("Items"), None);
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_mutation() {
        let (store, repo) = setup(vec![]);
        store.drop_table(AUDIT_TABLE);

        repo.append_one(&items_schema(), row(&["A1", "1"])).await.unwrap();
        assert_eq!(store.data_rows("Items").unwrap(), vec![row(&["A1", "1"])]);
    }

    #[tokio::test]
    async fn failures_propagate_unchanged() {
        let (store, repo) = setup(vec![]);
        assert!(matches!(
            repo.delete_logical_row("Missing", LogicalRow::new(1).unwrap(), None).await,
            Err(Error::NotFound(_))
        ));

        store.set_offline(true);
        let err = repo.list_all::<Product>(&items_schema()).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn list_drops_bad_rows_and_keeps_order() {
        let store = Arc::new(MemoryRangeStore::new().with_table(
            PRODUCTS_TABLE,
            &["ID", "Name"],
            vec![
                row(&["P-2", "Gadget"]),
                row(&["", "Orphan"]),
                row(&["P-1", "Widget", "", "", "not a price"]),
                row(&["P-3", "Gizmo"]),
            ],
        ));
        let repo = TableRepository::new(store, Arc::new(NullAuditSink), "tester");

        let products: Vec<Product> = repo.list().await.unwrap();
        let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P-2", "P-3"]);
    }

    #[tokio::test]
    async fn header_verification() {
        let store = Arc::new(MemoryRangeStore::new().with_table("Items", &["Key", "Amount"], vec![]));
        let repo = TableRepository::new(store, Arc::new(NullAuditSink), "tester");
        let mismatches = repo.verify_header(&items_schema()).await.unwrap();
        assert_eq!(mismatches, vec!["column B: expected 'Qty', found 'Amount'"]);
    }
}
