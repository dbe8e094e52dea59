//! Applies pending actions to the remote store.
//!
//! Actions are delivered at least once, so every kind is written to be safe
//! when applied again:
//!
//! - create and update both upsert: overwrite the row holding the key, or
//!   append if there is none
//! - delete removes the row holding the key; an absent key is success
//!
//! A blank key is never looked up: it would match the first row whose key
//! cell is empty.
//!
//! Each action resolves its row number immediately before writing and never
//! reuses it.

use crate::error::Result;
use crate::repository::TableRepository;
use std::sync::Arc;
use tabula_engine::{
    ActionKind, Entity, EntityKind, InventoryItem, PendingAction, Product, RowCodec, Supplier,
};

/// What applying an action did remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Appended,
    Overwritten,
    Deleted,
    /// Nothing to delete; the key was already gone.
    AlreadyAbsent,
}

pub struct ActionApplier {
    repo: Arc<TableRepository>,
}

impl ActionApplier {
    pub fn new(repo: Arc<TableRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<TableRepository> {
        &self.repo
    }

    pub async fn apply(&self, action: &PendingAction) -> Result<Applied> {
        let applied = match action.entity {
            EntityKind::Products => self.apply_typed::<Product>(action).await,
            EntityKind::Suppliers => self.apply_typed::<Supplier>(action).await,
            EntityKind::Inventory => self.apply_typed::<InventoryItem>(action).await,
        }?;
        tracing::debug!(
            action_id = %action.id,
            entity = %action.entity,
            kind = %action.kind,
            key = %action.key,
            result = ?applied,
            "Applied action"
        );
        Ok(applied)
    }

    async fn apply_typed<E: Entity>(&self, action: &PendingAction) -> Result<Applied> {
        match action.kind {
            ActionKind::Create | ActionKind::Update => {
                let record: E = action.record()?;
                self.upsert(&record).await
            }
            ActionKind::Delete => self.delete::<E>(&action.key).await,
        }
    }

    /// Write `record` to the row holding its key, or append it.
    pub async fn upsert<E: Entity>(&self, record: &E) -> Result<Applied> {
        E::KIND.check_key(record.key())?;
        let schema = E::KIND.schema();
        let row = self
            .repo
            .find_row_by_unique_value(&schema.name, schema.key_column, record.key())
            .await?;
        match row {
            Some(row) => {
                self.repo.update_row(&schema, row, RowCodec::serialize(record)).await?;
                Ok(Applied::Overwritten)
            }
            None => {
                self.repo.append_one(&schema, RowCodec::serialize(record)).await?;
                Ok(Applied::Appended)
            }
        }
    }

    /// Delete the row holding `key`, if any.
    pub async fn delete<E: Entity>(&self, key: &str) -> Result<Applied> {
        E::KIND.check_key(key)?;
        let schema = E::KIND.schema();
        let row = self
            .repo
            .find_row_by_unique_value(&schema.name, schema.key_column, key)
            .await?;
        match row {
            Some(row) => {
                self.repo
                    .delete_logical_row(&schema.name, row, Some(key))
                    .await?;
                Ok(Applied::Deleted)
            }
            None => Ok(Applied::AlreadyAbsent),
        }
    }
}
