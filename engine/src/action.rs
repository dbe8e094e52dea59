//! Pending actions: mutation intents waiting for remote confirmation.
//!
//! An action records *what the user asked for*, not the result of applying
//! it. Actions are applied at least once, so every kind must be safe to
//! re-apply (create and update upsert by key, delete of a missing key is a
//! no-op).

use crate::entity::{Entity, EntityKind};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a pending action.
pub type ActionId = String;

/// What a pending action does to its target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

/// A mutation intent queued for remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: ActionId,
    pub entity: EntityKind,
    pub kind: ActionKind,
    /// Unique key of the target row
    pub key: String,
    /// Full record for create/update, `null` for delete
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed remote attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl PendingAction {
    fn new(
        entity: EntityKind,
        kind: ActionKind,
        key: impl Into<String>,
        payload: serde_json::Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity,
            kind,
            key: key.into(),
            payload,
            enqueued_at,
            attempts: 0,
        }
    }

    /// Intent to create `record`.
    pub fn create<E: Entity>(record: &E, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self::new(
            E::KIND,
            ActionKind::Create,
            record.key(),
            record.to_payload()?,
            now,
        ))
    }

    /// Intent to replace the row keyed by `record.key()` with `record`.
    pub fn update<E: Entity>(record: &E, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self::new(
            E::KIND,
            ActionKind::Update,
            record.key(),
            record.to_payload()?,
            now,
        ))
    }

    /// Intent to delete the row keyed by `key`.
    pub fn delete(entity: EntityKind, key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(
            entity,
            ActionKind::Delete,
            key,
            serde_json::Value::Null,
            now,
        )
    }

    /// Decode the payload as the record it carries.
    pub fn record<E: Entity>(&self) -> Result<E> {
        E::from_payload(&self.payload)
    }
}
