//! Snapshot export/import between vector stores.

use std::sync::Arc;

use knowledge_embeddings::{EmbeddingFunc, EmbeddingProvider, HashEmbeddingProvider};
use knowledge_vectorstore::{
    PersistentVectorStore, SNAPSHOT_FILE_NAME, VectorDocument, VectorStore, VectorStoreError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn embedder() -> Arc<dyn EmbeddingFunc> {
    HashEmbeddingProvider::new().embedding_func()
}

async fn seeded() -> PersistentVectorStore {
    let store = PersistentVectorStore::open_in_memory(embedder());
    for name in ["alpha", "beta"] {
        store.create_collection(name).await.unwrap();
        store
            .add_documents(
                name,
                vec![
                    VectorDocument::new(format!("{name} first document")).with_id(format!("{name}-1")),
                    VectorDocument::new(format!("{name} second document"))
                        .with_id(format!("{name}-2"))
                        .with_metadata("source", format!("/data/{name}.md")),
                ],
            )
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let source = seeded().await;
    let dir = TempDir::new().unwrap();

    let snapshot = source
        .export_collections_to_file(dir.path(), &[])
        .await
        .unwrap();
    assert_eq!(snapshot, dir.path().join(SNAPSHOT_FILE_NAME));

    let target = PersistentVectorStore::open_in_memory(embedder());
    target
        .import_collections_from_file(&snapshot, &[])
        .await
        .unwrap();

    assert_eq!(target.list_collections().await, source.list_collections().await);
    assert_eq!(
        target.documents("beta").await.unwrap(),
        source.documents("beta").await.unwrap()
    );
}

#[tokio::test]
async fn test_import_restricted_to_requested_collections() {
    let source = seeded().await;
    let dir = TempDir::new().unwrap();
    let snapshot = source
        .export_collections_to_file(dir.path(), &[])
        .await
        .unwrap();

    let target = PersistentVectorStore::open_in_memory(embedder());
    target
        .import_collections_from_file(&snapshot, &["beta".to_string()])
        .await
        .unwrap();

    assert_eq!(target.list_collections().await, vec!["beta".to_string()]);
}

#[tokio::test]
async fn test_import_missing_requested_collection_fails() {
    let source = seeded().await;
    let dir = TempDir::new().unwrap();
    let snapshot = source
        .export_collections_to_file(dir.path(), &["alpha".to_string()])
        .await
        .unwrap();

    let target = PersistentVectorStore::open_in_memory(embedder());
    let err = target
        .import_collections_from_file(&snapshot, &["beta".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, VectorStoreError::CollectionNotFound(name) if name == "beta"));
    assert!(target.list_collections().await.is_empty());
}

#[tokio::test]
async fn test_export_unknown_collection_fails() {
    let source = seeded().await;
    let dir = TempDir::new().unwrap();

    let err = source
        .export_collections_to_file(dir.path(), &["gamma".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    assert!(!dir.path().join(SNAPSHOT_FILE_NAME).exists());
}

#[tokio::test]
async fn test_import_replaces_existing_collection_and_persists() {
    let source = seeded().await;
    let dir = TempDir::new().unwrap();
    let snapshot = source
        .export_collections_to_file(dir.path(), &["alpha".to_string()])
        .await
        .unwrap();

    let root = TempDir::new().unwrap();
    {
        let target = PersistentVectorStore::open(root.path(), embedder()).await.unwrap();
        target.create_collection("alpha").await.unwrap();
        target
            .add_documents("alpha", vec![VectorDocument::new("stale").with_id("stale")])
            .await
            .unwrap();

        target
            .import_collections_from_file(&snapshot, &[])
            .await
            .unwrap();
    }

    let reopened = PersistentVectorStore::open(root.path(), embedder()).await.unwrap();
    let ids: Vec<String> = reopened
        .documents("alpha")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["alpha-1".to_string(), "alpha-2".to_string()]);
}
