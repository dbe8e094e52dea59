//! Entity kinds tracked by the sync cache.

use crate::{codec::RowCodec, error::Result, schema::TableSchema, snapshot::Dataset, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Every collection the cache keeps in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Products,
    Suppliers,
    Inventory,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Products,
        EntityKind::Suppliers,
        EntityKind::Inventory,
    ];

    /// Table layout backing this kind.
    pub fn schema(self) -> TableSchema {
        match self {
            EntityKind::Products => crate::records::product_schema(),
            EntityKind::Suppliers => crate::records::supplier_schema(),
            EntityKind::Inventory => crate::records::inventory_schema(),
        }
    }

    /// Reject a key that is blank after trimming. A row whose key cell is
    /// empty has no identity and must never be matched by one.
    pub fn check_key(self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::EmptyKey(self.to_string()));
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Products => "products",
            EntityKind::Suppliers => "suppliers",
            EntityKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "products" => Ok(EntityKind::Products),
            "suppliers" => Ok(EntityKind::Suppliers),
            "inventory" => Ok(EntityKind::Inventory),
            other => Err(Error::UnknownEntity(other.to_string())),
        }
    }
}

/// A record type stored in one table and identified by a unique key column.
pub trait Entity:
    RowCodec + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Value of the unique key column.
    fn key(&self) -> &str;

    /// This kind's collection within a dataset.
    fn collection(dataset: &Dataset) -> &Vec<Self>;

    fn collection_mut(dataset: &mut Dataset) -> &mut Vec<Self>;

    /// Encode as a queue payload.
    fn to_payload(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidPayload {
            entity: Self::KIND.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a queue payload.
    fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        Self::deserialize(payload).map_err(|e| Error::InvalidPayload {
            entity: Self::KIND.to_string(),
            reason: e.to_string(),
        })
    }
}
