//! The client-facing sync cache.
//!
//! Holds the last-known-good dataset and hands out copies of it. Reads never
//! wait on the network. Mutations change the local copy at once and are
//! written to the store in the background, in call order, through a single
//! write lane; a write that cannot reach the store is queued durably
//! instead.
//!
//! A periodic full refresh is the only reconciliation: whatever the store
//! says wins, including over a local change it has not seen yet.

use crate::applier::ActionApplier;
use crate::connectivity::Connectivity;
use crate::error::Error;
use crate::notice::{self, Notice, NoticeSender};
use crate::queue::PersistentQueue;
use crate::repository::{TableRead, TableRepository};
use crate::runtime::SyncContext;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabula_engine::{
    CacheSnapshot, Entity, EntityKind, InventoryItem, PendingAction, Product, Supplier,
};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Whether the first load has happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
}

/// Final outcome of an optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Written to the store.
    Applied,
    /// The store was unreachable; the mutation is in the offline queue.
    QueuedForRetry,
    /// The store refused the mutation. It was not queued.
    Failed(String),
}

/// Handle to a mutation's background write. Dropping it is fine.
#[derive(Debug)]
pub struct MutationHandle {
    action_id: String,
    outcome: oneshot::Receiver<MutationOutcome>,
}

impl MutationHandle {
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Wait for the background write to finish.
    pub async fn outcome(self) -> MutationOutcome {
        self.outcome
            .await
            .unwrap_or_else(|_| MutationOutcome::Failed("write lane closed".to_string()))
    }

    fn resolved(action_id: String, outcome: MutationOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self {
            action_id,
            outcome: rx,
        }
    }
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Kinds whose data was replaced with the store's.
    pub committed: Vec<EntityKind>,
    /// Kinds whose rows had not changed since the last commit.
    pub unchanged: Vec<EntityKind>,
    /// Kinds that could not be fetched and kept their previous data.
    pub failed: Vec<EntityKind>,
    pub timed_out: bool,
}

impl RefreshReport {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.failed.is_empty()
    }
}

type InFlight = Shared<BoxFuture<'static, RefreshReport>>;

struct Write {
    action: PendingAction,
    done: oneshot::Sender<MutationOutcome>,
}

struct Inner {
    repo: Arc<TableRepository>,
    queue: Arc<PersistentQueue>,
    connectivity: Arc<Connectivity>,
    notices: NoticeSender,
    snapshot: RwLock<CacheSnapshot>,
    state: Mutex<LoadState>,
    syncing: AtomicBool,
    in_flight: Mutex<Option<InFlight>>,
    writes: mpsc::UnboundedSender<Write>,
    refresh_timeout: Duration,
}

/// Cheaply clonable handle to one cache instance.
#[derive(Clone)]
pub struct SyncCache {
    inner: Arc<Inner>,
}

impl SyncCache {
    /// Create an empty cache and start its write lane.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(ctx: SyncContext, refresh_timeout: Duration) -> Self {
        let (writes, rx) = mpsc::unbounded_channel();
        let lane = WriteLane {
            applier: ctx.applier.clone(),
            queue: ctx.queue.clone(),
            connectivity: ctx.connectivity.clone(),
            notices: ctx.notices.clone(),
        };
        tokio::spawn(lane.run(rx));

        Self {
            inner: Arc::new(Inner {
                repo: ctx.repo,
                queue: ctx.queue,
                connectivity: ctx.connectivity,
                notices: ctx.notices,
                snapshot: RwLock::new(CacheSnapshot::new()),
                state: Mutex::new(LoadState::Empty),
                syncing: AtomicBool::new(false),
                in_flight: Mutex::new(None),
                writes,
                refresh_timeout,
            }),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// First load of every kind. Ends in [`LoadState::Ready`] even if some
    /// kinds failed; those stay empty until a later refresh succeeds.
    pub async fn initial_load(&self) -> RefreshReport {
        {
            let mut state = self.inner.state.lock();
            if *state == LoadState::Empty {
                *state = LoadState::Loading;
            }
        }
        let report = self.refresh_data().await;
        *self.inner.state.lock() = LoadState::Ready;
        report
    }

    /// Timer-driven refresh. Failures are logged, never announced.
    pub async fn periodic_refresh(&self) -> RefreshReport {
        self.refresh_data().await
    }

    /// Re-read every kind from the store.
    ///
    /// At most one refresh runs at a time: a call made while one is in
    /// flight waits for it and returns its report. The refresh runs on its
    /// own task, so dropping this future does not cancel it.
    pub async fn refresh_data(&self) -> RefreshReport {
        let in_flight = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::debug!("Refresh already in flight; joining it");
                    in_flight.clone()
                }
                None => {
                    self.inner.syncing.store(true, Ordering::SeqCst);
                    let cache = self.clone();
                    let task = tokio::spawn(async move { cache.run_refresh().await });
                    let shared = async move {
                        task.await.unwrap_or_else(|e| {
                            tracing::error!(error = %e, "Refresh task failed");
                            RefreshReport {
                                failed: EntityKind::ALL.to_vec(),
                                ..RefreshReport::default()
                            }
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        in_flight.await
    }

    async fn run_refresh(&self) -> RefreshReport {
        let timeout = self.inner.refresh_timeout;
        let report = match tokio::time::timeout(timeout, self.fetch_all()).await {
            Ok(reads) => self.commit(reads),
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Refresh timed out; keeping last-known-good data");
                RefreshReport {
                    timed_out: true,
                    ..RefreshReport::default()
                }
            }
        };

        *self.inner.in_flight.lock() = None;
        self.inner.syncing.store(false, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock();
            if *state == LoadState::Loading {
                *state = LoadState::Ready;
            }
        }
        report
    }

    async fn fetch_all(&self) -> [(EntityKind, Result<TableRead, Error>); 3] {
        let repo = &self.inner.repo;
        let [product_schema, supplier_schema, inventory_schema] =
            EntityKind::ALL.map(EntityKind::schema);
        let (products, suppliers, inventory) = tokio::join!(
            repo.read_table(&product_schema),
            repo.read_table(&supplier_schema),
            repo.read_table(&inventory_schema),
        );
        [
            (EntityKind::Products, products),
            (EntityKind::Suppliers, suppliers),
            (EntityKind::Inventory, inventory),
        ]
    }

    /// Parse the tables that changed, then swap all of them in under one
    /// write lock, so readers never see some kinds refreshed and others not.
    /// Parsing happens outside the lock.
    fn commit(&self, reads: [(EntityKind, Result<TableRead, Error>); 3]) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut changed = Vec::new();
        {
            let snapshot = self.inner.snapshot.read();
            for (kind, read) in reads {
                match read {
                    Err(e) => {
                        tracing::warn!(entity = %kind, error = %e, "Refresh failed; keeping previous data");
                        report.failed.push(kind);
                    }
                    Ok(read) if snapshot.is_unchanged(kind, &read.fingerprint) => {
                        report.unchanged.push(kind);
                    }
                    Ok(read) => changed.push((kind, read)),
                }
            }
        }

        let staged: Vec<_> = changed
            .into_iter()
            .map(|(kind, read)| {
                let parsed = Parsed::of(kind, &read);
                (kind, read.fingerprint, parsed)
            })
            .collect();

        {
            let mut snapshot = self.inner.snapshot.write();
            for (kind, fingerprint, parsed) in staged {
                parsed.swap_into(&mut snapshot);
                snapshot.fingerprints.insert(kind, fingerprint);
                report.committed.push(kind);
            }
            if !report.committed.is_empty() || !report.unchanged.is_empty() {
                snapshot.mark_synced(Utc::now());
            }
        }

        tracing::debug!(
            committed = ?report.committed,
            unchanged = ?report.unchanged,
            failed = ?report.failed,
            "Refresh committed"
        );
        report
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn products(&self) -> Vec<Product> {
        self.inner.snapshot.read().dataset.products.clone()
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.inner.snapshot.read().dataset.suppliers.clone()
    }

    pub fn inventory(&self) -> Vec<InventoryItem> {
        self.inner.snapshot.read().dataset.inventory.clone()
    }

    /// One record by key.
    pub fn get<E: Entity>(&self, key: &str) -> Option<E> {
        self.inner.snapshot.read().dataset.get::<E>(key).cloned()
    }

    /// A copy of the whole cache state.
    pub fn snapshot(&self) -> CacheSnapshot {
        self.inner.snapshot.read().clone()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.read().last_synced_at
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub fn load_state(&self) -> LoadState {
        *self.inner.state.lock()
    }

    /// Number of mutations waiting in the offline queue.
    pub fn pending_count(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_product(&self, product: Product) -> MutationHandle {
        self.add(product)
    }

    pub fn update_product(&self, product: Product) -> MutationHandle {
        self.update(product)
    }

    pub fn remove_product(&self, id: &str) -> MutationHandle {
        self.remove::<Product>(id)
    }

    pub fn add_supplier(&self, supplier: Supplier) -> MutationHandle {
        self.add(supplier)
    }

    pub fn update_supplier(&self, supplier: Supplier) -> MutationHandle {
        self.update(supplier)
    }

    pub fn remove_supplier(&self, id: &str) -> MutationHandle {
        self.remove::<Supplier>(id)
    }

    pub fn add_inventory_item(&self, item: InventoryItem) -> MutationHandle {
        self.add(item)
    }

    pub fn update_inventory_item(&self, item: InventoryItem) -> MutationHandle {
        self.update(item)
    }

    pub fn remove_inventory_item(&self, id: &str) -> MutationHandle {
        self.remove::<InventoryItem>(id)
    }

    /// Insert a record locally and create it remotely.
    pub fn add<E: Entity>(&self, record: E) -> MutationHandle {
        let action = PendingAction::create(&record, Utc::now());
        self.mutate(E::KIND, record.key().to_string(), action, |snapshot| {
            snapshot.dataset.upsert(record)
        })
    }

    /// Replace a record locally and remotely.
    pub fn update<E: Entity>(&self, record: E) -> MutationHandle {
        let action = PendingAction::update(&record, Utc::now());
        self.mutate(E::KIND, record.key().to_string(), action, |snapshot| {
            snapshot.dataset.upsert(record)
        })
    }

    /// Remove a record locally and remotely.
    pub fn remove<E: Entity>(&self, key: &str) -> MutationHandle {
        let action = Ok(PendingAction::delete(E::KIND, key, Utc::now()));
        self.mutate(E::KIND, key.to_string(), action, |snapshot| {
            snapshot.dataset.remove::<E>(key);
        })
    }

    /// Apply `update` to the local snapshot at once, then hand the action
    /// to the write lane.
    fn mutate(
        &self,
        kind: EntityKind,
        key: String,
        action: tabula_engine::error::Result<PendingAction>,
        update: impl FnOnce(&mut CacheSnapshot),
    ) -> MutationHandle {
        let action = match kind.check_key(&key).and(action) {
            Ok(action) => action,
            Err(e) => {
                let message = e.to_string();
                notice::announce(
                    &self.inner.notices,
                    Notice::MutationFailed {
                        entity: kind,
                        key,
                        message: message.clone(),
                    },
                );
                return MutationHandle::resolved(String::new(), MutationOutcome::Failed(message));
            }
        };

        {
            let mut snapshot = self.inner.snapshot.write();
            update(&mut snapshot);
            // The next refresh must re-apply the store's version of this kind.
            snapshot.invalidate(kind);
        }

        let action_id = action.id.clone();
        let (done, outcome) = oneshot::channel();
        if let Err(mpsc::error::SendError(write)) = self.inner.writes.send(Write { action, done }) {
            let _ = write
                .done
                .send(MutationOutcome::Failed("write lane closed".to_string()));
        }
        MutationHandle { action_id, outcome }
    }
}

/// One table's records, parsed and waiting to be swapped in.
enum Parsed {
    Products(Vec<Product>),
    Suppliers(Vec<Supplier>),
    Inventory(Vec<InventoryItem>),
}

impl Parsed {
    fn of(kind: EntityKind, read: &TableRead) -> Self {
        let table = kind.schema().name;
        match kind {
            EntityKind::Products => Parsed::Products(read.parse(&table)),
            EntityKind::Suppliers => Parsed::Suppliers(read.parse(&table)),
            EntityKind::Inventory => Parsed::Inventory(read.parse(&table)),
        }
    }

    fn swap_into(self, snapshot: &mut CacheSnapshot) {
        match self {
            Parsed::Products(records) => snapshot.dataset.replace(records),
            Parsed::Suppliers(records) => snapshot.dataset.replace(records),
            Parsed::Inventory(records) => snapshot.dataset.replace(records),
        }
    }
}

/// Applies mutations to the store one at a time, in call order.
struct WriteLane {
    applier: Arc<ActionApplier>,
    queue: Arc<PersistentQueue>,
    connectivity: Arc<Connectivity>,
    notices: NoticeSender,
}

impl WriteLane {
    async fn run(self, mut writes: mpsc::UnboundedReceiver<Write>) {
        while let Some(Write { action, done }) = writes.recv().await {
            let outcome = self.write(action).await;
            let _ = done.send(outcome);
        }
        tracing::debug!("Write lane closed");
    }

    async fn write(&self, action: PendingAction) -> MutationOutcome {
        // Anything already queued must reach the store first.
        if !self.connectivity.is_online() || !self.queue.is_empty() {
            return self.enqueue(action).await;
        }

        match self.applier.apply(&action).await {
            Ok(_) => MutationOutcome::Applied,
            Err(e) if e.is_transport() => {
                tracing::warn!(action_id = %action.id, error = %e, "Write failed; queueing for retry");
                self.connectivity.set_online(false);
                self.enqueue(action).await
            }
            Err(e) => {
                tracing::warn!(action_id = %action.id, error = %e, "Write rejected");
                let message = e.to_string();
                notice::announce(
                    &self.notices,
                    Notice::MutationFailed {
                        entity: action.entity,
                        key: action.key,
                        message: message.clone(),
                    },
                );
                MutationOutcome::Failed(message)
            }
        }
    }

    async fn enqueue(&self, action: PendingAction) -> MutationOutcome {
        let notice = Notice::QueuedForSync {
            entity: action.entity,
            key: action.key.clone(),
            action_id: action.id.clone(),
        };
        if let Err(e) = self.queue.enqueue(action).await {
            tracing::error!(error = %e, "Failed to persist offline queue; action kept in memory");
        }
        notice::announce(&self.notices, notice);
        MutationOutcome::QueuedForRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SyncContext;
    use crate::storage::MemoryQueueStorage;
    use crate::store::MemoryRangeStore;
    use tabula_engine::{CellValue, RawRow, PRODUCTS_TABLE, SUPPLIERS_TABLE, INVENTORY_TABLE};

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| CellValue::text(*c)).collect()
    }

    async fn setup(store: Arc<MemoryRangeStore>) -> SyncCache {
        let ctx = SyncContext::new(store, Arc::new(MemoryQueueStorage::new()), "tester")
            .await
            .unwrap();
        SyncCache::new(ctx, Duration::from_secs(5))
    }

    fn seeded() -> Arc<MemoryRangeStore> {
        Arc::new(
            MemoryRangeStore::new()
                .with_table(PRODUCTS_TABLE, &["ID", "Name"], vec![row(&["P-1", "Widget"])])
                .with_table(SUPPLIERS_TABLE, &["ID", "Name"], vec![row(&["S-1", "Acme"])])
                .with_table(INVENTORY_TABLE, &["ID", "Product ID"], vec![]),
        )
    }

    #[tokio::test]
    async fn initial_load_reaches_ready() {
        let cache = setup(seeded()).await;
        assert_eq!(cache.load_state(), LoadState::Empty);
        assert_eq!(cache.last_synced_at(), None);

        let report = cache.initial_load().await;
        assert!(report.is_success());
        assert_eq!(cache.load_state(), LoadState::Ready);
        assert_eq!(cache.products().len(), 1);
        assert_eq!(cache.suppliers()[0].name, "Acme");
        assert!(cache.last_synced_at().is_some());
        assert!(!cache.is_syncing());
    }

    #[tokio::test]
    async fn partial_failure_still_ready() {
        let store = seeded();
        store.drop_table(INVENTORY_TABLE);
        let cache = setup(store).await;

        let report = cache.initial_load().await;
        assert_eq!(report.failed, vec![EntityKind::Inventory]);
        assert_eq!(cache.load_state(), LoadState::Ready);
        assert_eq!(cache.products().len(), 1);
        assert!(cache.inventory().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_known_good() {
        let store = seeded();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;
        let synced = cache.last_synced_at();

        store.set_offline(true);
        let report = cache.refresh_data().await;
        assert_eq!(report.failed.len(), 3);
        assert_eq!(cache.products().len(), 1);
        assert_eq!(cache.last_synced_at(), synced);
        assert_eq!(cache.load_state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn unchanged_tables_are_not_reparsed() {
        let store = seeded();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;

        let report = cache.refresh_data().await;
        assert_eq!(report.unchanged.len(), 3);
        assert!(report.committed.is_empty());

        store.set_data_rows(PRODUCTS_TABLE, vec![row(&["P-2", "Gadget"])]);
        let report = cache.refresh_data().await;
        assert_eq!(report.committed, vec![EntityKind::Products]);
        assert_eq!(cache.products()[0].id, "P-2");
    }

    #[tokio::test]
    async fn refresh_sorts_kinds_into_one_commit() {
        let store = seeded();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;
        store.set_data_rows(SUPPLIERS_TABLE, vec![row(&["S-2", "Globex"]), row(&["", "Nameless"])]);
        store.drop_table(INVENTORY_TABLE);

        let report = cache.refresh_data().await;
        assert_eq!(report.committed, vec![EntityKind::Suppliers]);
        assert_eq!(report.unchanged, vec![EntityKind::Products]);
        assert_eq!(report.failed, vec![EntityKind::Inventory]);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.dataset.suppliers, vec![Supplier::new("S-2", "Globex")]);
        assert_eq!(snapshot.dataset.products.len(), 1);

        let mut renamed = Product::new("P-1", "Widget v2");
        renamed.unit_price = Some(1.0);
        cache.update_product(renamed.clone());
        assert_eq!(cache.get::<Product>("P-1"), Some(renamed));
    }

    #[tokio::test]
    async fn blank_key_is_refused_locally() {
        let store = seeded();
        store.set_data_rows(
            PRODUCTS_TABLE,
            vec![
                row(&["P-1", "Widget"]),
                row(&["", "note: reorder next week"]),
                row(&["P-2", "Gadget"]),
            ],
        );
        let before = store.data_rows(PRODUCTS_TABLE).unwrap();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;
        let mut notices = cache.subscribe();

        for handle in [
            cache.remove_product(""),
            cache.remove_product("   "),
            cache.update_product(Product::new(" ", "Overwrite")),
        ] {
            assert!(matches!(handle.outcome().await, MutationOutcome::Failed(_)));
            assert!(matches!(
                notices.recv().await.unwrap(),
                Notice::MutationFailed { entity: EntityKind::Products, .. }
            ));
        }

        assert_eq!(cache.products().len(), 2);
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(store.data_rows(PRODUCTS_TABLE).unwrap(), before);
        assert_eq!(store.calls().deletes, 0);
        assert_eq!(store.calls().overwrites, 0);
    }

    #[tokio::test]
    async fn refresh_timeout_clears_syncing() {
        let store = seeded();
        store.set_latency(Some(Duration::from_millis(200)));
        let ctx = SyncContext::new(store, Arc::new(MemoryQueueStorage::new()), "tester")
            .await
            .unwrap();
        let cache = SyncCache::new(ctx, Duration::from_millis(50));

        let report = cache.initial_load().await;
        assert!(report.timed_out);
        assert!(!cache.is_syncing());
        assert_eq!(cache.load_state(), LoadState::Ready);
        assert!(cache.products().is_empty());
    }

    #[tokio::test]
    async fn mutation_applies_locally_then_remotely() {
        let store = seeded();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;

        let handle = cache.add_product(Product::new("P-2", "Gadget"));
        assert_eq!(cache.products().len(), 2);
        assert_eq!(handle.outcome().await, MutationOutcome::Applied);
        assert_eq!(store.data_rows(PRODUCTS_TABLE).unwrap().len(), 2);

        let mut renamed = Product::new("P-2", "Gadget v2");
        renamed.unit_price = Some(9.5);
        let handle = cache.update_product(renamed.clone());
        assert_eq!(cache.get::<Product>("P-2"), Some(renamed));
        assert_eq!(handle.outcome().await, MutationOutcome::Applied);

        let handle = cache.remove_product("P-1");
        assert!(cache.get::<Product>("P-1").is_none());
        assert_eq!(handle.outcome().await, MutationOutcome::Applied);
        assert_eq!(store.data_rows(PRODUCTS_TABLE).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_mutation_is_queued_and_announced() {
        let store = seeded();
        let cache = setup(store.clone()).await;
        cache.initial_load().await;
        let mut notices = cache.subscribe();

        store.set_offline(true);
        let handle = cache.add_supplier(Supplier::new("S-2", "Globex"));
        assert_eq!(handle.outcome().await, MutationOutcome::QueuedForRetry);
        assert_eq!(cache.pending_count(), 1);
        assert!(!cache.is_online());

        match notices.recv().await.unwrap() {
            Notice::QueuedForSync { entity, key, .. } => {
                assert_eq!(entity, EntityKind::Suppliers);
                assert_eq!(key, "S-2");
            }
            other => panic!("unexpected notice: {:?}", other),
        }

        // Later writes queue behind it even once the store is back.
        store.set_offline(false);
        let handle = cache.remove_supplier("S-2");
        assert_eq!(handle.outcome().await, MutationOutcome::QueuedForRetry);
        assert_eq!(cache.pending_count(), 2);
    }

    #[tokio::test]
    async fn rejected_mutation_fails_without_queueing() {
        let store = seeded();
        store.drop_table(INVENTORY_TABLE);
        let cache = setup(store).await;
        let mut notices = cache.subscribe();

        let handle = cache.add_inventory_item(InventoryItem::new("I-1", "P-1", 3));
        assert!(matches!(handle.outcome().await, MutationOutcome::Failed(_)));
        assert_eq!(cache.pending_count(), 0);
        assert!(matches!(
            notices.recv().await.unwrap(),
            Notice::MutationFailed { entity: EntityKind::Inventory, .. }
        ));
    }
}
