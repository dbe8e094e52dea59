//! The cached dataset and its content fingerprints.
//!
//! A [`CacheSnapshot`] is the last-known-good copy of every tracked table.
//! Readers receive clones; only the owning cache mutates it.
//!
//! Fingerprints let a refresh skip re-parsing a table whose raw rows have
//! not changed since they were last committed.

use crate::entity::{Entity, EntityKind};
use crate::records::{InventoryItem, Product, Supplier};
use crate::RawRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Typed contents of every tracked table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub products: Vec<Product>,
    pub suppliers: Vec<Supplier>,
    pub inventory: Vec<InventoryItem>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of one kind, in table order.
    pub fn all<E: Entity>(&self) -> &[E] {
        E::collection(self)
    }

    /// Look up a record by its unique key.
    pub fn get<E: Entity>(&self, key: &str) -> Option<&E> {
        E::collection(self).iter().find(|r| r.key() == key)
    }

    /// Replace the record with the same key, or append it.
    pub fn upsert<E: Entity>(&mut self, record: E) {
        let records = E::collection_mut(self);
        match records.iter_mut().find(|r| r.key() == record.key()) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Remove every record with the given key. Returns true if any matched.
    pub fn remove<E: Entity>(&mut self, key: &str) -> bool {
        let records = E::collection_mut(self);
        let before = records.len();
        records.retain(|r| r.key() != key);
        records.len() != before
    }

    /// Replace a whole collection.
    pub fn replace<E: Entity>(&mut self, records: Vec<E>) {
        *E::collection_mut(self) = records;
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Products => self.products.len(),
            EntityKind::Suppliers => self.suppliers.len(),
            EntityKind::Inventory => self.inventory.len(),
        }
    }
}

/// Content hash of a table's raw rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the rows exactly as read from the store.
    pub fn of(rows: &[RawRow]) -> Self {
        let mut hasher = Sha256::new();
        for row in rows {
            for cell in row {
                let value = serde_json::Value::from(cell);
                hasher.update(value.to_string().as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Last-known-good state of the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub dataset: Dataset,
    /// Only moves forward.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Fingerprint of the rows each collection was last parsed from.
    /// Cleared for a kind whenever it is changed locally.
    pub fingerprints: BTreeMap<EntityKind, Fingerprint>,
}

impl CacheSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `last_synced_at`, never moving it backwards.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(match self.last_synced_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }

    /// True if `fingerprint` matches what `kind` was last parsed from.
    pub fn is_unchanged(&self, kind: EntityKind, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.get(&kind) == Some(fingerprint)
    }

    /// Forget the fingerprint of a locally modified kind.
    pub fn invalidate(&mut self, kind: EntityKind) {
        self.fingerprints.remove(&kind);
    }
}
