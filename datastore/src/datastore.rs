//! The datastore facade over the index and vector stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use knowledge_embeddings::{
    EmbeddingProvider, HashEmbeddingProvider, log_embedding_func, redact_sensitive,
};
use knowledge_index::{Dataset, FileRecord, IndexError, IndexStore};
use knowledge_vectorstore::{SearchHit, VectorDocument, VectorStore, VectorStoreError};

use crate::DEFAULT_DATASET;
use crate::archive::{
    EXPORT_PREFIX, IMPORT_PREFIX, resolve_destination, scratch_dir, unpack_archive, zip_dir,
};
use crate::backends::{open_index, open_vector_store};
use crate::config::DatastoreConfig;
use crate::dsn::{
    DataDirProvider, Dsn, INDEX_SCHEME, PlatformDataDir, VECTOR_SCHEME, resolve_dsns,
};
use crate::error::{DatastoreError, Result};

/// Metadata key of the file a vector document was ingested from.
pub const SOURCE_METADATA_KEY: &str = "source";

/// Metadata key of the index file record a vector document belongs to.
pub const FILE_ID_METADATA_KEY: &str = "file_id";

/// An index store and a vector store managed as one datastore.
///
/// Every dataset exists on both sides: a record in the index store and a
/// collection of the same name in the vector store.
pub struct Datastore {
    /// Datasets, files and document ids.
    index: Arc<dyn IndexStore>,

    /// Embedded documents, one collection per dataset.
    vector_store: Arc<dyn VectorStore>,

    /// Source of the embedding function bound to the vector store.
    embedding_provider: Arc<dyn EmbeddingProvider>,

    /// Configuration reported by the provider at open time.
    embedding_config: serde_json::Value,

    /// Parent of export/import scratch directories.
    scratch_root: Option<PathBuf>,

    /// Whether the stores were opened from an archive.
    is_archive: bool,

    /// Unpacked archive backing the stores, if any. Declared last so the
    /// stores are closed before it is removed.
    archive_dir: Option<TempDir>,
}

impl Datastore {
    /// Create a new datastore builder.
    pub fn builder() -> DatastoreBuilder {
        DatastoreBuilder::new()
    }

    /// Open a datastore on the given DSNs; empty DSNs use the platform defaults.
    pub async fn new(
        index_dsn: &str,
        auto_migrate: bool,
        vector_dsn: &str,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::builder()
            .with_index_dsn(index_dsn)
            .with_auto_migrate(auto_migrate)
            .with_vector_dsn(vector_dsn)
            .with_embedding_provider(embedding_provider)
            .build()
            .await
    }

    /// Open a read-mostly datastore backed by the contents of an archive.
    ///
    /// Changes are kept in a scratch directory that is removed when the
    /// datastore is dropped.
    pub async fn open_archive(
        archive: impl AsRef<Path>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::builder()
            .with_embedding_provider(embedding_provider)
            .build_from_archive(archive)
            .await
    }

    /// The index store.
    pub fn index(&self) -> &Arc<dyn IndexStore> {
        &self.index
    }

    /// The vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// The embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// The provider configuration, unredacted.
    pub fn embedding_config(&self) -> &serde_json::Value {
        &self.embedding_config
    }

    /// Whether this datastore was opened from an archive.
    pub fn is_archive(&self) -> bool {
        self.is_archive
    }

    /// Directory holding the unpacked archive snapshots, if opened from one.
    pub fn archive_dir(&self) -> Option<&Path> {
        self.archive_dir.as_ref().map(TempDir::path)
    }

    /// Look a dataset up by id.
    pub async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        Ok(self.index.get_dataset(id).await?)
    }

    /// All datasets, ordered by id.
    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        Ok(self.index.list_datasets().await?)
    }

    /// Create a dataset in both stores.
    ///
    /// The index record is removed again if the vector collection cannot be
    /// created.
    pub async fn create_dataset(&self, dataset: Dataset) -> Result<()> {
        let id = dataset.id.clone();
        if self.index.get_dataset(&id).await?.is_some() {
            return Err(DatastoreError::DatasetExists(id));
        }

        self.index.create_dataset(dataset).await.map_err(|e| match e {
            IndexError::DatasetExists(id) => DatastoreError::DatasetExists(id),
            other => other.into(),
        })?;

        if let Err(e) = self.vector_store.create_collection(&id).await {
            if let Err(rollback) = self.index.delete_dataset(&id).await {
                warn!(dataset = %id, error = %rollback, "Failed to roll back dataset");
            }
            return Err(e.into());
        }

        info!(dataset = %id, "Created dataset");
        Ok(())
    }

    /// Delete a dataset from both stores.
    pub async fn delete_dataset(&self, id: &str) -> Result<()> {
        if self.index.get_dataset(id).await?.is_none() {
            return Err(DatastoreError::DatasetNotFound(id.to_string()));
        }

        match self.vector_store.remove_collection(id).await {
            Ok(()) => {}
            Err(VectorStoreError::CollectionNotFound(_)) => {
                warn!(dataset = id, "Dataset had no vector collection");
            }
            Err(e) => return Err(e.into()),
        }
        self.index.delete_dataset(id).await?;

        info!(dataset = id, "Deleted dataset");
        Ok(())
    }

    /// Files ingested into a dataset, ordered by path.
    pub async fn list_files(&self, dataset_id: &str) -> Result<Vec<FileRecord>> {
        self.require_dataset(dataset_id).await?;
        Ok(self.index.list_files(dataset_id).await?)
    }

    /// Embed the chunks of a file into a dataset and record the file.
    ///
    /// Ingesting a path again replaces the documents of the earlier ingestion.
    pub async fn ingest(
        &self,
        dataset_id: &str,
        absolute_path: &str,
        chunks: Vec<String>,
    ) -> Result<FileRecord> {
        self.require_dataset(dataset_id).await?;

        let previous = self
            .index
            .list_files(dataset_id)
            .await?
            .into_iter()
            .find(|file| file.absolute_path == absolute_path);

        let file = FileRecord::new(dataset_id, absolute_path);
        let documents: Vec<VectorDocument> = chunks
            .into_iter()
            .map(|chunk| {
                VectorDocument::new(chunk)
                    .with_metadata(SOURCE_METADATA_KEY, absolute_path)
                    .with_metadata(FILE_ID_METADATA_KEY, file.id.as_str())
            })
            .collect();

        let ids = self.vector_store.add_documents(dataset_id, documents).await?;
        let file = file.with_documents(ids);
        self.index.add_file(file.clone()).await?;

        if let Some(previous) = previous {
            self.vector_store
                .remove_documents(dataset_id, &previous.documents)
                .await?;
            debug!(dataset = dataset_id, path = absolute_path, "Replaced earlier ingestion");
        }

        info!(
            dataset = dataset_id,
            path = absolute_path,
            documents = file.documents.len(),
            "Ingested file"
        );
        Ok(file)
    }

    /// The `top_k` documents of a dataset most similar to `query`.
    pub async fn retrieve(
        &self,
        dataset_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.require_dataset(dataset_id).await?;

        let hits = self
            .vector_store
            .similarity_search(dataset_id, query, top_k)
            .await
            .map_err(|e| match e {
                VectorStoreError::CollectionNotFound(id) => DatastoreError::DatasetNotFound(id),
                other => other.into(),
            })?;

        debug!(dataset = dataset_id, hits = hits.len(), "Retrieved documents");
        Ok(hits)
    }

    /// Export datasets (all when `dataset_ids` is empty) into one archive.
    ///
    /// An existing directory as `destination` receives a timestamped archive.
    /// Returns the path the archive was written to.
    pub async fn export_datasets_to_file(
        &self,
        destination: impl AsRef<Path>,
        dataset_ids: &[String],
    ) -> Result<PathBuf> {
        let scratch = scratch_dir(self.scratch_root.as_deref(), EXPORT_PREFIX)?;

        self.index
            .export_datasets_to_file(scratch.path(), dataset_ids)
            .await
            .map_err(|e| DatastoreError::BackendExport(e.into()))?;

        self.vector_store
            .export_collections_to_file(scratch.path(), dataset_ids)
            .await
            .map_err(|e| DatastoreError::BackendExport(e.into()))?;

        let destination = resolve_destination(destination.as_ref(), Local::now())
            .map_err(DatastoreError::archive_io)?;

        let src = scratch.path().to_path_buf();
        let dst = destination.clone();
        tokio::task::spawn_blocking(move || zip_dir(&src, &dst))
            .await
            .map_err(DatastoreError::task)?
            .map_err(DatastoreError::Archive)?;

        info!(
            path = %destination.display(),
            datasets = ?dataset_ids,
            "Exported datasets"
        );
        Ok(destination)
    }

    /// Import an archive, restricting vector collections to `dataset_ids`
    /// when it is not empty.
    ///
    /// The archive is validated before either store is touched, and the
    /// index snapshot is applied before the vector snapshot.
    pub async fn import_datasets_from_file(
        &self,
        source: impl AsRef<Path>,
        dataset_ids: &[String],
    ) -> Result<()> {
        let scratch = scratch_dir(self.scratch_root.as_deref(), IMPORT_PREFIX)?;

        let source = source.as_ref().to_path_buf();
        let dest = scratch.path().to_path_buf();
        let archive_path = source.clone();
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&archive_path, &dest))
            .await
            .map_err(DatastoreError::task)??;

        self.index
            .import_datasets_from_file(&unpacked.index_snapshot)
            .await
            .map_err(|e| DatastoreError::BackendImport(e.into()))?;

        self.vector_store
            .import_collections_from_file(&unpacked.vector_snapshot, dataset_ids)
            .await
            .map_err(|e| DatastoreError::BackendImport(e.into()))?;

        info!(
            path = %source.display(),
            datasets = ?dataset_ids,
            "Imported datasets"
        );
        Ok(())
    }

    async fn require_dataset(&self, id: &str) -> Result<()> {
        match self.index.get_dataset(id).await? {
            Some(_) => Ok(()),
            None => Err(DatastoreError::DatasetNotFound(id.to_string())),
        }
    }

    async fn ensure_default_dataset(&self) -> Result<()> {
        let existing = self
            .get_dataset(DEFAULT_DATASET)
            .await
            .map_err(|e| DatastoreError::DefaultDataset(Box::new(e)))?;

        if existing.is_none() {
            self.create_dataset(Dataset::new(DEFAULT_DATASET))
                .await
                .map_err(|e| DatastoreError::DefaultDataset(Box::new(e)))?;
        }
        Ok(())
    }
}

/// Builder for [`Datastore`].
pub struct DatastoreBuilder {
    config: DatastoreConfig,
    data_dirs: Arc<dyn DataDirProvider>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    archive_dir: Option<TempDir>,
}

impl DatastoreBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: DatastoreConfig::default(),
            data_dirs: Arc::new(PlatformDataDir),
            embedding_provider: None,
            archive_dir: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: DatastoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the index DSN. An empty DSN selects the default.
    pub fn with_index_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.index_dsn = Some(dsn.into());
        self
    }

    /// Set the vector DSN. An empty DSN selects the default.
    pub fn with_vector_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.config.vector_dsn = Some(dsn.into());
        self
    }

    /// Set whether the index schema is migrated while opening.
    pub fn with_auto_migrate(mut self, auto_migrate: bool) -> Self {
        self.config.auto_migrate = auto_migrate;
        self
    }

    /// Set where default DSNs are placed.
    pub fn with_data_dirs(mut self, data_dirs: Arc<dyn DataDirProvider>) -> Self {
        self.data_dirs = data_dirs;
        self
    }

    /// Set the parent of export/import scratch directories.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    /// Set the embedding provider. Defaults to [`HashEmbeddingProvider`].
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Unpack `archive` and build a datastore on its snapshots.
    ///
    /// Any DSNs set on the builder are replaced by archive DSNs.
    pub async fn build_from_archive(mut self, archive: impl AsRef<Path>) -> Result<Datastore> {
        let scratch = scratch_dir(self.config.scratch_dir.as_deref(), IMPORT_PREFIX)?;

        let source = archive.as_ref().to_path_buf();
        let dest = scratch.path().to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&source, &dest))
            .await
            .map_err(DatastoreError::task)??;

        self.config.index_dsn =
            Some(Dsn::archive(INDEX_SCHEME, &unpacked.index_snapshot).to_string());
        self.config.vector_dsn =
            Some(Dsn::archive(VECTOR_SCHEME, &unpacked.vector_snapshot).to_string());
        self.archive_dir = Some(scratch);

        self.build().await
    }

    /// Open both stores and, unless archive-sourced, ensure the default
    /// dataset exists.
    pub async fn build(self) -> Result<Datastore> {
        let resolved = resolve_dsns(
            self.config.index_dsn.as_deref().unwrap_or_default(),
            self.config.vector_dsn.as_deref().unwrap_or_default(),
            self.data_dirs.as_ref(),
        )?;

        let index = open_index(&resolved.index_dsn, self.config.auto_migrate).await?;
        index
            .auto_migrate()
            .await
            .map_err(|e| DatastoreError::IndexInit {
                dsn: resolved.index_dsn.clone(),
                source: e.into(),
            })?;

        let embedding_provider = self
            .embedding_provider
            .unwrap_or_else(|| Arc::new(HashEmbeddingProvider::new()));
        let embedding_config = embedding_provider.config();
        debug!(
            provider = embedding_provider.name(),
            config = %redact_sensitive(&embedding_config),
            "Using embedding model provider"
        );

        let embedding_func = log_embedding_func(embedding_provider.embedding_func());
        let vector_store = open_vector_store(&resolved.vector_dsn, embedding_func).await?;

        let datastore = Datastore {
            index,
            vector_store,
            embedding_provider,
            embedding_config,
            scratch_root: self.config.scratch_dir,
            is_archive: resolved.is_archive,
            archive_dir: self.archive_dir,
        };

        if resolved.is_archive {
            info!(
                index_dsn = %resolved.index_dsn,
                vector_dsn = %resolved.vector_dsn,
                "Opened datastore from archive"
            );
            return Ok(datastore);
        }

        datastore.ensure_default_dataset().await?;

        info!(
            index_dsn = %resolved.index_dsn,
            vector_dsn = %resolved.vector_dsn,
            "Opened datastore"
        );
        Ok(datastore)
    }
}

impl Default for DatastoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
