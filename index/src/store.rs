//! The index store capability consumed by the datastore.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Dataset, FileRecord};

/// Operations every index backend provides.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Apply all pending schema migrations.
    async fn auto_migrate(&self) -> Result<()>;

    /// Look a dataset up by id.
    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>>;

    /// Insert a new dataset. Fails with `DatasetExists` when the id is taken.
    async fn create_dataset(&self, dataset: Dataset) -> Result<()>;

    /// All datasets, ordered by id.
    async fn list_datasets(&self) -> Result<Vec<Dataset>>;

    /// Delete a dataset together with its files and documents.
    async fn delete_dataset(&self, id: &str) -> Result<()>;

    /// Record a file, replacing an earlier record with the same id or path.
    async fn add_file(&self, file: FileRecord) -> Result<()>;

    /// Files of a dataset, ordered by path.
    async fn list_files(&self, dataset_id: &str) -> Result<Vec<FileRecord>>;

    /// Write the given datasets (all when empty) into a snapshot file inside
    /// `dir` and return its path.
    async fn export_datasets_to_file(
        &self,
        dir: &Path,
        dataset_ids: &[String],
    ) -> Result<PathBuf>;

    /// Merge every dataset of the snapshot at `path` into this store.
    async fn import_datasets_from_file(&self, path: &Path) -> Result<()>;
}
