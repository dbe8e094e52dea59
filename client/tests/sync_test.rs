//! Integration tests for the sync cache and the offline queue.
//!
//! Everything runs against the in-memory range store; the durability tests
//! also use a SQLite file.

use std::sync::Arc;
use std::time::Duration;
use tabula_client::{
    LoadState, MemoryQueueStorage, MemoryRangeStore, MutationOutcome, Notice, QueueStorage,
    SqliteQueueStorage, SyncClient, SyncSettings, TableRepository, NullAuditSink,
};
use tabula_engine::{
    parse_rows, CellValue, InventoryItem, Product, RawRow, Supplier, INVENTORY_TABLE,
    PRODUCTS_TABLE, SUPPLIERS_TABLE,
};

fn row(cells: &[&str]) -> RawRow {
    cells.iter().map(|c| CellValue::text(*c)).collect()
}

fn seeded_store() -> Arc<MemoryRangeStore> {
    Arc::new(
        MemoryRangeStore::new()
            .with_table(
                PRODUCTS_TABLE,
                &["ID", "Name", "SKU", "Category", "Unit Price"],
                vec![
                    row(&["P-1", "Widget", "W-01", "Parts", "$4.50"]),
                    row(&["P-2", "Gadget", "G-01", "Parts", "12"]),
                ],
            )
            .with_table(SUPPLIERS_TABLE, &["ID", "Name"], vec![row(&["S-1", "Acme"])])
            .with_table(
                INVENTORY_TABLE,
                &["ID", "Product ID", "Location", "Quantity"],
                vec![row(&["I-1", "P-1", "Shelf A", "5"])],
            ),
    )
}

fn settings() -> SyncSettings {
    SyncSettings {
        actor: "tester".to_string(),
        refresh_timeout: Duration::from_secs(5),
        tick_interval: Duration::from_secs(5),
        ..SyncSettings::default()
    }
}

async fn open(store: Arc<MemoryRangeStore>, storage: Arc<dyn QueueStorage>) -> SyncClient {
    SyncClient::open(store, storage, settings()).await.unwrap()
}

fn stored_products(store: &MemoryRangeStore) -> Vec<Product> {
    parse_rows(&store.data_rows(PRODUCTS_TABLE).unwrap())
}

#[cfg(test)]
mod refresh_tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_load_reads_every_kind() {
        let store = seeded_store();
        let client = open(store, Arc::new(MemoryQueueStorage::new())).await;

        let report = client.cache.initial_load().await;
        assert!(report.is_success());
        assert_eq!(client.cache.load_state(), LoadState::Ready);

        let products = client.cache.products();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].unit_price, Some(4.5));
        assert_eq!(client.cache.suppliers(), vec![Supplier::new("S-1", "Acme")]);
        assert_eq!(client.cache.inventory()[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        store.set_latency(Some(Duration::from_millis(50)));

        let cache = client.cache.clone();
        let (first, second) = tokio::join!(client.cache.refresh_data(), cache.refresh_data());

        // One read per kind, not two.
        assert_eq!(store.calls().reads, 3);
        assert_eq!(first, second);
        assert!(!client.cache.is_syncing());
    }

    #[tokio::test]
    async fn test_syncing_flag_tracks_in_flight_refresh() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        store.set_latency(Some(Duration::from_millis(100)));

        let cache = client.cache.clone();
        let refresh = tokio::spawn(async move { cache.refresh_data().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.cache.is_syncing());

        refresh.await.unwrap();
        assert!(!client.cache.is_syncing());
    }

    #[tokio::test]
    async fn test_optimistic_change_reverts_on_refresh() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        client.cache.initial_load().await;

        // The write never reaches the store.
        store.set_offline(true);
        let mut renamed = client.cache.get::<Product>("P-1").unwrap();
        renamed.name = "Widget Deluxe".to_string();
        let handle = client.cache.update_product(renamed);
        assert_eq!(client.cache.get::<Product>("P-1").unwrap().name, "Widget Deluxe");
        assert_eq!(handle.outcome().await, MutationOutcome::QueuedForRetry);

        // The refresh sees the server value and wins.
        store.set_offline(false);
        let report = client.cache.periodic_refresh().await;
        assert!(report.is_success());
        assert_eq!(client.cache.get::<Product>("P-1").unwrap().name, "Widget");

        // Once drained, the next refresh brings the change back.
        client.processor.tick().await;
        client.cache.periodic_refresh().await;
        assert_eq!(client.cache.get::<Product>("P-1").unwrap().name, "Widget Deluxe");
    }

    #[tokio::test]
    async fn test_refresh_commits_all_kinds_together() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        client.cache.initial_load().await;
        let before = client.cache.last_synced_at().unwrap();

        store.set_data_rows(SUPPLIERS_TABLE, vec![row(&["S-2", "Globex"])]);
        store.set_data_rows(INVENTORY_TABLE, vec![]);
        client.cache.refresh_data().await;

        let snapshot = client.cache.snapshot();
        assert_eq!(snapshot.dataset.suppliers[0].id, "S-2");
        assert!(snapshot.dataset.inventory.is_empty());
        assert_eq!(snapshot.dataset.products.len(), 2);
        assert!(snapshot.last_synced_at.unwrap() >= before);
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update_drains_in_order() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        client.cache.initial_load().await;
        let mut notices = client.cache.subscribe();

        store.set_offline(true);
        let created = client.cache.add_product(Product::new("P-3", "Sprocket"));
        let mut priced = Product::new("P-3", "Sprocket");
        priced.unit_price = Some(2.25);
        let updated = client.cache.update_product(priced.clone());
        assert_eq!(created.outcome().await, MutationOutcome::QueuedForRetry);
        assert_eq!(updated.outcome().await, MutationOutcome::QueuedForRetry);
        assert_eq!(client.cache.pending_count(), 2);

        store.set_offline(false);
        let report = client.processor.tick().await;
        assert_eq!(report.applied, 2);
        assert_eq!(client.cache.pending_count(), 0);
        assert!(client.cache.is_online());

        // An update applied before its create would have been overwritten
        // by the create's unpriced record.
        let stored = stored_products(&store);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2], priced);

        let mut seen = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            seen.push(notice);
        }
        assert!(seen.contains(&Notice::QueueDrained { applied: 2 }));
        assert_eq!(
            seen.iter()
                .filter(|n| matches!(n, Notice::QueuedForSync { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_writes_after_reconnect_wait_for_queue() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;
        client.cache.initial_load().await;

        store.set_offline(true);
        client.cache.remove_product("P-2").outcome().await;

        // Reachable again, but the belief has not been restored by a reachability check.
        store.set_offline(false);
        let handle = client.cache.add_product(Product::new("P-2", "Gadget Mk2"));
        assert_eq!(handle.outcome().await, MutationOutcome::QueuedForRetry);

        client.processor.tick().await;
        let stored = stored_products(&store);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].name, "Gadget Mk2");
    }

    #[tokio::test]
    async fn test_queue_survives_restart_in_memory_slot() {
        let store = seeded_store();
        let storage = Arc::new(MemoryQueueStorage::new());

        {
            let client = open(store.clone(), storage.clone()).await;
            store.set_offline(true);
            let handle = client
                .cache
                .add_inventory_item(InventoryItem::new("I-2", "P-2", 7));
            assert_eq!(handle.outcome().await, MutationOutcome::QueuedForRetry);
        }

        store.set_offline(false);
        let client = open(store.clone(), storage).await;
        assert_eq!(client.cache.pending_count(), 1);

        let report = client.processor.tick().await;
        assert_eq!(report.applied, 1);
        let inventory: Vec<InventoryItem> =
            parse_rows(&store.data_rows(INVENTORY_TABLE).unwrap());
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[1].quantity, 7);
    }

    #[tokio::test]
    async fn test_queue_survives_restart_in_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("queue.db").display());
        let store = seeded_store();

        {
            let storage = SqliteQueueStorage::connect(&url).await.unwrap();
            let client = open(store.clone(), Arc::new(storage.clone())).await;
            store.set_offline(true);
            client.cache.remove_supplier("S-1").outcome().await;
            assert_eq!(client.cache.pending_count(), 1);
            storage.pool().close().await;
        }

        store.set_offline(false);
        let storage = SqliteQueueStorage::connect(&url).await.unwrap();
        let client = open(store.clone(), Arc::new(storage)).await;
        assert_eq!(client.cache.pending_count(), 1);

        client.processor.tick().await;
        assert_eq!(client.cache.pending_count(), 0);
        assert!(store.data_rows(SUPPLIERS_TABLE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_head_is_retried_next_tick() {
        let store = seeded_store();
        let client = open(store.clone(), Arc::new(MemoryQueueStorage::new())).await;

        store.set_offline(true);
        client
            .cache
            .add_product(Product::new("P-9", "Late"))
            .outcome()
            .await;

        // Reachability check succeeds, then the store drops again before the write.
        store.set_offline(false);
        client.context().connectivity.set_online(true);
        store.set_offline(true);
        let report = client.processor.tick().await;
        assert!(report.stalled);
        assert_eq!(client.context().queue.head().await.unwrap().attempts, 1);

        store.set_offline(false);
        let report = client.processor.tick().await;
        assert_eq!(report.applied, 1);
        assert!(stored_products(&store).iter().any(|p| p.id == "P-9"));
    }
}

#[cfg(test)]
mod repository_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_reresolves_row_numbers() {
        let store = Arc::new(MemoryRangeStore::new().with_table(
            "Stock",
            &["Code", "Qty"],
            vec![row(&["A1", "5"]), row(&["B1", "3"])],
        ));
        let repo = TableRepository::new(store.clone(), Arc::new(NullAuditSink), "tester");

        let found = repo.find_row_by_unique_value("Stock", 0, "B1").await.unwrap();
        assert_eq!(found.map(|r| r.get()), Some(2));

        repo.delete_logical_row("Stock", found.unwrap(), Some("B1"))
            .await
            .unwrap();
        assert_eq!(store.data_rows("Stock").unwrap(), vec![row(&["A1", "5"])]);
        assert_eq!(repo.find_row_by_unique_value("Stock", 0, "B1").await.unwrap(), None);
    }
}
