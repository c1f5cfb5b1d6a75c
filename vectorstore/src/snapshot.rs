//! On-disk formats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorStoreError};
use crate::store::VectorDocument;

/// A named set of documents, keyed by document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection name.
    pub name: String,

    /// Documents keyed by id.
    #[serde(default)]
    pub documents: BTreeMap<String, VectorDocument>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: BTreeMap::new(),
        }
    }
}

/// Export format holding several collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,

    /// Exported collections.
    pub collections: Vec<Collection>,
}

impl Snapshot {
    /// Version written by this binary.
    pub const CURRENT_VERSION: u32 = 1;

    /// Wrap collections in a snapshot of the current version.
    pub fn new(collections: Vec<Collection>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            collections,
        }
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse bytes, rejecting unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| VectorStoreError::InvalidSnapshot(e.to_string()))?;

        if snapshot.version == 0 || snapshot.version > Self::CURRENT_VERSION {
            return Err(VectorStoreError::InvalidSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        Ok(snapshot)
    }
}
