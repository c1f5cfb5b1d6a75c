//! Vector store kept in memory and mirrored to a directory.
//!
//! Each collection is written as one JSON file named after a hash of the
//! collection name, so arbitrary dataset ids map to safe file names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use knowledge_embeddings::{EmbeddingFunc, find_top_k};

use crate::SNAPSHOT_FILE_NAME;
use crate::error::{Result, VectorStoreError};
use crate::snapshot::{Collection, Snapshot};
use crate::store::{SearchHit, VectorDocument, VectorStore};

/// Vector store with optional directory persistence.
pub struct PersistentVectorStore {
    /// Directory holding one file per collection; `None` keeps everything in memory.
    root: Option<PathBuf>,

    /// Collections keyed by name.
    collections: RwLock<HashMap<String, Collection>>,

    /// Computes embeddings for documents and queries.
    embedding_func: Arc<dyn EmbeddingFunc>,
}

impl PersistentVectorStore {
    /// Open a store persisted under `root`, loading existing collections.
    ///
    /// This will create the directory if it doesn't exist.
    pub async fn open(
        root: impl AsRef<Path>,
        embedding_func: Arc<dyn EmbeddingFunc>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let store = Self {
            root: Some(root),
            collections: RwLock::new(HashMap::new()),
            embedding_func,
        };
        store.load_all().await?;

        Ok(store)
    }

    /// Create a store that never touches the filesystem except for
    /// explicit export/import.
    pub fn open_in_memory(embedding_func: Arc<dyn EmbeddingFunc>) -> Self {
        Self {
            root: None,
            collections: RwLock::new(HashMap::new()),
            embedding_func,
        }
    }

    /// The persistence directory, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn collection_path(&self, name: &str) -> Option<PathBuf> {
        let digest = format!("{:x}", Sha256::digest(name.as_bytes()));
        self.root
            .as_ref()
            .map(|root| root.join(format!("{}.json", &digest[..16])))
    }

    async fn load_all(&self) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let mut loaded = HashMap::new();
        let mut entries = fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match load_collection(&path).await {
                Ok(collection) => {
                    debug!("Loaded collection {}", collection.name);
                    loaded.insert(collection.name.clone(), collection);
                }
                Err(e) => {
                    warn!("Failed to load collection {}: {e}", path.display());
                }
            }
        }

        info!("Loaded {} collections from {}", loaded.len(), root.display());
        *self.collections.write().await = loaded;
        Ok(())
    }

    /// Write a collection atomically using a temp file.
    async fn persist(&self, collection: &Collection) -> Result<()> {
        let Some(path) = self.collection_path(&collection.name) else {
            return Ok(());
        };

        let content = serde_json::to_vec(collection)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved collection {}", collection.name);
        Ok(())
    }

    async fn forget(&self, name: &str) -> Result<()> {
        if let Some(path) = self.collection_path(name) {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn load_collection(path: &Path) -> Result<Collection> {
    let content = fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

#[async_trait]
impl VectorStore for PersistentVectorStore {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(VectorStoreError::CollectionExists(name.to_string()));
        }

        let collection = Collection::new(name);
        self.persist(&collection).await?;
        collections.insert(name.to_string(), collection);

        debug!("Created collection {name}");
        Ok(())
    }

    async fn remove_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_none() {
            return Err(VectorStoreError::CollectionNotFound(name.to_string()));
        }
        self.forget(name).await?;

        debug!("Removed collection {name}");
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    async fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn add_documents(
        &self,
        collection: &str,
        mut documents: Vec<VectorDocument>,
    ) -> Result<Vec<String>> {
        if !self.has_collection(collection).await {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }

        for document in documents.iter_mut().filter(|d| d.embedding.is_empty()) {
            document.embedding = self.embedding_func.embed(&document.content).await?;
        }

        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        for document in documents {
            target.documents.insert(document.id.clone(), document);
        }
        self.persist(target).await?;

        debug!("Added {} documents to collection {collection}", ids.len());
        Ok(ids)
    }

    async fn remove_documents(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let before = target.documents.len();
        for id in ids {
            target.documents.remove(id);
        }
        if target.documents.len() != before {
            self.persist(target).await?;
        }

        debug!(
            "Removed {} documents from collection {collection}",
            before - target.documents.len()
        );
        Ok(())
    }

    async fn documents(&self, collection: &str) -> Result<Vec<VectorDocument>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        Ok(target.documents.values().cloned().collect())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if !self.has_collection(collection).await {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }

        let query_embedding = self.embedding_func.embed(query).await?;

        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let candidates = target
            .documents
            .values()
            .map(|d| (d.id.as_str(), d.embedding.as_slice()));
        let ranked = find_top_k(&query_embedding, candidates, k, -1.0)?;

        Ok(ranked
            .into_iter()
            .filter_map(|result| {
                target.documents.get(&result.id).map(|d| SearchHit {
                    id: d.id.clone(),
                    content: d.content.clone(),
                    metadata: d.metadata.clone(),
                    score: result.score,
                })
            })
            .collect())
    }

    async fn export_collections_to_file(
        &self,
        dir: &Path,
        collections: &[String],
    ) -> Result<PathBuf> {
        let snapshot = {
            let stored = self.collections.read().await;
            let mut names: Vec<String> = if collections.is_empty() {
                stored.keys().cloned().collect()
            } else {
                collections.to_vec()
            };
            names.sort();

            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let collection = stored
                    .get(&name)
                    .ok_or_else(|| VectorStoreError::CollectionNotFound(name.clone()))?;
                selected.push(collection.clone());
            }
            Snapshot::new(selected)
        };

        let path = dir.join(SNAPSHOT_FILE_NAME);
        fs::write(&path, snapshot.to_bytes()?).await?;

        info!(
            "Exported {} collections to {}",
            snapshot.collections.len(),
            path.display()
        );
        Ok(path)
    }

    async fn import_collections_from_file(
        &self,
        path: &Path,
        collections: &[String],
    ) -> Result<()> {
        let bytes = fs::read(path).await?;
        let snapshot = Snapshot::from_bytes(&bytes)?;

        let mut available: HashMap<String, Collection> = snapshot
            .collections
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        let selected: Vec<Collection> = if collections.is_empty() {
            available.into_values().collect()
        } else {
            let mut selected = Vec::with_capacity(collections.len());
            for name in collections {
                let collection = available
                    .remove(name)
                    .ok_or_else(|| VectorStoreError::CollectionNotFound(name.clone()))?;
                selected.push(collection);
            }
            selected
        };

        let count = selected.len();
        let mut stored = self.collections.write().await;
        for collection in selected {
            self.persist(&collection).await?;
            stored.insert(collection.name.clone(), collection);
        }

        info!("Imported {count} collections from {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_embeddings::{EmbeddingProvider, HashEmbeddingProvider};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn embedder() -> Arc<dyn EmbeddingFunc> {
        HashEmbeddingProvider::new().with_dimension(256).embedding_func()
    }

    #[tokio::test]
    async fn test_create_and_remove_collection() {
        let store = PersistentVectorStore::open_in_memory(embedder());

        store.create_collection("a").await.unwrap();
        assert!(store.has_collection("a").await);
        assert!(matches!(
            store.create_collection("a").await.unwrap_err(),
            VectorStoreError::CollectionExists(_)
        ));

        store.remove_collection("a").await.unwrap();
        assert!(!store.has_collection("a").await);
        assert!(matches!(
            store.remove_collection("a").await.unwrap_err(),
            VectorStoreError::CollectionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_add_documents_requires_collection() {
        let store = PersistentVectorStore::open_in_memory(embedder());
        let err = store
            .add_documents("missing", vec![VectorDocument::new("text")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_similarity_search_ranks_best_match_first() {
        let store = PersistentVectorStore::open_in_memory(embedder());
        store.create_collection("docs").await.unwrap();
        store
            .add_documents(
                "docs",
                vec![
                    VectorDocument::new("rust borrow checker ownership").with_id("rust"),
                    VectorDocument::new("sourdough bread baking").with_id("bread"),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .similarity_search("docs", "ownership in rust", 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "rust");
    }

    #[tokio::test]
    async fn test_collections_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = PersistentVectorStore::open(dir.path(), embedder()).await.unwrap();
            store.create_collection("dataset/with spaces").await.unwrap();
            store
                .add_documents(
                    "dataset/with spaces",
                    vec![VectorDocument::new("hello world").with_id("d1")],
                )
                .await
                .unwrap();
        }

        let store = PersistentVectorStore::open(dir.path(), embedder()).await.unwrap();
        assert_eq!(store.list_collections().await, vec!["dataset/with spaces".to_string()]);
        let documents = store.documents("dataset/with spaces").await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].embedding.len(), 256);
    }

    #[tokio::test]
    async fn test_remove_documents_ignores_unknown_ids() {
        let store = PersistentVectorStore::open_in_memory(embedder());
        store.create_collection("a").await.unwrap();
        store
            .add_documents(
                "a",
                vec![
                    VectorDocument::new("one").with_id("1"),
                    VectorDocument::new("two").with_id("2"),
                ],
            )
            .await
            .unwrap();

        store
            .remove_documents("a", &["1".to_string(), "missing".to_string()])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .documents("a")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_precomputed_embeddings_are_kept() {
        let store = PersistentVectorStore::open_in_memory(embedder());
        store.create_collection("a").await.unwrap();

        let mut embedding = vec![0.0; 256];
        embedding[3] = 1.0;
        store
            .add_documents(
                "a",
                vec![VectorDocument::new("x").with_id("d").with_embedding(embedding.clone())],
            )
            .await
            .unwrap();

        assert_eq!(store.documents("a").await.unwrap()[0].embedding, embedding);
    }
}
