//! Scheme registry for the index and vector backends.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use knowledge_embeddings::EmbeddingFunc;
use knowledge_index::{IndexError, IndexStore, SqliteIndex};
use knowledge_vectorstore::{PersistentVectorStore, VectorStore};

use crate::dsn::{Dsn, INDEX_SCHEME, VECTOR_SCHEME};
use crate::error::{BackendError, DatastoreError, Result};

type OpenFuture<T> = Pin<Box<dyn Future<Output = std::result::Result<T, BackendError>> + Send>>;

type IndexOpener = fn(Dsn, bool) -> OpenFuture<Arc<dyn IndexStore>>;

type VectorOpener = fn(Dsn, Arc<dyn EmbeddingFunc>) -> OpenFuture<Arc<dyn VectorStore>>;

const INDEX_BACKENDS: &[(&str, IndexOpener)] = &[(INDEX_SCHEME, open_sqlite)];

const VECTOR_BACKENDS: &[(&str, VectorOpener)] = &[(VECTOR_SCHEME, open_chromem)];

/// Schemes an index DSN may use.
pub fn index_schemes() -> impl Iterator<Item = &'static str> {
    INDEX_BACKENDS.iter().map(|(scheme, _)| *scheme)
}

/// Schemes a vector DSN may use.
pub fn vector_schemes() -> impl Iterator<Item = &'static str> {
    VECTOR_BACKENDS.iter().map(|(scheme, _)| *scheme)
}

/// Open the index store a DSN names.
pub async fn open_index(dsn: &str, auto_migrate: bool) -> Result<Arc<dyn IndexStore>> {
    let init_error = |source| DatastoreError::IndexInit {
        dsn: dsn.to_string(),
        source,
    };
    let parsed =
        Dsn::parse(dsn).map_err(|err| init_error(BackendError::InvalidDsn(err.to_string())))?;

    let opener = INDEX_BACKENDS
        .iter()
        .find(|(scheme, _)| *scheme == parsed.scheme)
        .map(|(_, opener)| *opener)
        .ok_or_else(|| init_error(BackendError::UnsupportedScheme(parsed.scheme.clone())))?;

    debug!(dsn, "Opening index store");
    opener(parsed, auto_migrate).await.map_err(init_error)
}

/// Open the vector store a DSN names, bound to `embedding_func`.
pub async fn open_vector_store(
    dsn: &str,
    embedding_func: Arc<dyn EmbeddingFunc>,
) -> Result<Arc<dyn VectorStore>> {
    let init_error = |source| DatastoreError::VectorStoreInit {
        dsn: dsn.to_string(),
        source,
    };
    let parsed =
        Dsn::parse(dsn).map_err(|err| init_error(BackendError::InvalidDsn(err.to_string())))?;

    let opener = VECTOR_BACKENDS
        .iter()
        .find(|(scheme, _)| *scheme == parsed.scheme)
        .map(|(_, opener)| *opener)
        .ok_or_else(|| init_error(BackendError::UnsupportedScheme(parsed.scheme.clone())))?;

    debug!(dsn, "Opening vector store");
    opener(parsed, embedding_func).await.map_err(init_error)
}

fn open_sqlite(dsn: Dsn, auto_migrate: bool) -> OpenFuture<Arc<dyn IndexStore>> {
    Box::pin(async move {
        let index =
            tokio::task::spawn_blocking(move || SqliteIndex::open(&dsn.location, auto_migrate))
                .await
                .map_err(IndexError::from)??;
        Ok::<_, BackendError>(Arc::new(index) as Arc<dyn IndexStore>)
    })
}

/// Archive DSNs load the snapshot into memory; others persist to a directory.
fn open_chromem(
    dsn: Dsn,
    embedding_func: Arc<dyn EmbeddingFunc>,
) -> OpenFuture<Arc<dyn VectorStore>> {
    Box::pin(async move {
        let store = if dsn.archive {
            let store = PersistentVectorStore::open_in_memory(embedding_func);
            store
                .import_collections_from_file(Path::new(&dsn.location), &[])
                .await?;
            store
        } else {
            PersistentVectorStore::open(&dsn.location, embedding_func).await?
        };
        Ok::<_, BackendError>(Arc::new(store) as Arc<dyn VectorStore>)
    })
}
