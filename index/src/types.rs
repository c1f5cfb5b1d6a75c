//! Records kept in the index store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named collection of files, mirrored by a vector collection of the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique identifier, also the name of the vector collection.
    pub id: String,

    /// Free-form metadata, e.g. the embedding configuration used.
    pub metadata: Option<serde_json::Value>,

    /// When the dataset was created.
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    /// Create a dataset record stamped with the current time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A file ingested into a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique identifier.
    pub id: String,

    /// Owning dataset.
    pub dataset_id: String,

    /// Absolute path of the source file at ingestion time.
    pub absolute_path: String,

    /// Content checksum, when known.
    pub checksum: Option<String>,

    /// Ids of the vector documents this file was split into, in order.
    pub documents: Vec<String>,
}

impl FileRecord {
    /// Create a record with a fresh id and no documents.
    pub fn new(dataset_id: impl Into<String>, absolute_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            absolute_path: absolute_path.into(),
            checksum: None,
            documents: Vec::new(),
        }
    }

    /// Set the checksum.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Set the document ids.
    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = documents;
        self
    }
}
