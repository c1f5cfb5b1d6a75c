//! Exporting datastores into archives and importing them back.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use knowledge_datastore::knowledge_embeddings::HashEmbeddingProvider;
use knowledge_datastore::knowledge_index::Dataset;
use knowledge_datastore::{DEFAULT_DATASET, Datastore, ErrorKind, EXPORT_PREFIX};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

/// A datastore on disk whose scratch directories live under `scratch`.
struct Fixture {
    _data: TempDir,
    scratch: TempDir,
    datastore: Datastore,
}

impl Fixture {
    async fn new() -> Self {
        let data = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let datastore = Datastore::builder()
            .with_index_dsn(format!("sqlite://{}", data.path().join("knowledge.db").display()))
            .with_vector_dsn(format!("chromem://{}", data.path().join("vector.db").display()))
            .with_scratch_dir(scratch.path())
            .with_embedding_provider(Arc::new(HashEmbeddingProvider::new()))
            .build()
            .await
            .unwrap();

        Self {
            _data: data,
            scratch,
            datastore,
        }
    }

    async fn seeded() -> Self {
        let fixture = Self::new().await;
        let datastore = &fixture.datastore;
        for (dataset, path, chunks) in [
            ("recipes", "/docs/bread.md", vec!["flour water salt yeast", "bake at high heat"]),
            ("manuals", "/docs/drill.md", vec!["charge the battery", "select the torque"]),
        ] {
            datastore.create_dataset(Dataset::new(dataset)).await.unwrap();
            datastore
                .ingest(dataset, path, chunks.into_iter().map(String::from).collect())
                .await
                .unwrap();
        }
        fixture
    }

    fn scratch_entries(&self) -> Vec<String> {
        fs::read_dir(self.scratch.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

fn entry_names(archive: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    names
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

async fn dataset_ids(datastore: &Datastore) -> Vec<String> {
    datastore
        .list_datasets()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect()
}

#[tokio::test]
async fn test_round_trip_restores_selected_datasets() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let selected = vec!["recipes".to_string()];

    let archive = source
        .datastore
        .export_datasets_to_file(out.path().join("recipes.zip"), &selected)
        .await
        .unwrap();
    assert_eq!(archive, out.path().join("recipes.zip"));

    let target = Fixture::new().await;
    target
        .datastore
        .import_datasets_from_file(&archive, &selected)
        .await
        .unwrap();

    assert_eq!(
        dataset_ids(&target.datastore).await,
        vec![DEFAULT_DATASET.to_string(), "recipes".to_string()]
    );
    assert_eq!(
        target.datastore.list_files("recipes").await.unwrap(),
        source.datastore.list_files("recipes").await.unwrap()
    );
    assert_eq!(
        target.datastore.vector_store().documents("recipes").await.unwrap(),
        source.datastore.vector_store().documents("recipes").await.unwrap()
    );
    assert!(!target.datastore.vector_store().has_collection("manuals").await);

    let hits = target
        .datastore
        .retrieve("recipes", "yeast and flour", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].content, "flour water salt yeast");
}

#[tokio::test]
async fn test_export_always_has_two_entries() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();

    for (name, selected) in [
        ("all.zip", vec![]),
        ("one.zip", vec!["manuals".to_string()]),
        (
            "three.zip",
            vec![
                DEFAULT_DATASET.to_string(),
                "manuals".to_string(),
                "recipes".to_string(),
            ],
        ),
    ] {
        let archive = source
            .datastore
            .export_datasets_to_file(out.path().join(name), &selected)
            .await
            .unwrap();
        assert_eq!(
            entry_names(&archive),
            vec!["knowledge.db".to_string(), "vectorstore.gob".to_string()]
        );
    }
}

#[tokio::test]
async fn test_export_into_directory_synthesizes_name() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();

    let archive = source
        .datastore
        .export_datasets_to_file(out.path(), &[])
        .await
        .unwrap();

    assert_eq!(archive.parent(), Some(out.path()));
    let name = archive.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(EXPORT_PREFIX), "{name}");
    assert!(name.ends_with(".zip"), "{name}");
    // knowledge-export-YYYY-MM-DD-HH-MM-SS.zip
    assert_eq!(name.len(), EXPORT_PREFIX.len() + 19 + ".zip".len());
    assert!(archive.is_file());
}

#[tokio::test]
async fn test_export_creates_missing_parent_directories() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let destination = out.path().join("backups/2024/knowledge.zip");

    let archive = source
        .datastore
        .export_datasets_to_file(&destination, &[])
        .await
        .unwrap();

    assert_eq!(archive, destination);
    assert!(destination.is_file());
}

#[tokio::test]
async fn test_export_unknown_dataset_leaves_no_archive() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let destination = out.path().join("bad.zip");

    let err = source
        .datastore
        .export_datasets_to_file(&destination, &["nope".to_string()])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendExport);
    assert!(!destination.exists());
    assert!(source.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_scratch_directories_removed_after_success() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();

    let archive = source
        .datastore
        .export_datasets_to_file(out.path().join("a.zip"), &[])
        .await
        .unwrap();
    assert!(source.scratch_entries().is_empty());

    let target = Fixture::new().await;
    target
        .datastore
        .import_datasets_from_file(&archive, &[])
        .await
        .unwrap();
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_wrong_entry_count_is_rejected_without_changes() {
    let target = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let archive = out.path().join("three.zip");
    write_zip(
        &archive,
        &[
            ("knowledge.db", b"db"),
            ("vectorstore.gob", b"gob"),
            ("notes.txt", b"extra"),
        ],
    );

    let before = dataset_ids(&target.datastore).await;
    let collections_before = target.datastore.vector_store().list_collections().await;

    let err = target
        .datastore
        .import_datasets_from_file(&archive, &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveStructure);
    assert_eq!(dataset_ids(&target.datastore).await, before);
    assert_eq!(
        target.datastore.vector_store().list_collections().await,
        collections_before
    );
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_missing_snapshot_kind_is_rejected() {
    let target = Fixture::new().await;
    let out = TempDir::new().unwrap();

    let no_gob = out.path().join("no-gob.zip");
    write_zip(&no_gob, &[("knowledge.db", b"db"), ("other.db", b"db")]);
    let err = target
        .datastore
        .import_datasets_from_file(&no_gob, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveStructure);

    let no_db = out.path().join("no-db.zip");
    write_zip(&no_db, &[("vectorstore.gob", b"gob"), ("README.md", b"hi")]);
    let err = target
        .datastore
        .import_datasets_from_file(&no_db, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveStructure);

    assert_eq!(
        dataset_ids(&target.datastore).await,
        vec![DEFAULT_DATASET.to_string()]
    );
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_unreadable_archives_fail_to_open() {
    let target = Fixture::new().await;
    let out = TempDir::new().unwrap();

    let err = target
        .datastore
        .import_datasets_from_file(out.path().join("missing.zip"), &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveOpen);

    let garbage = out.path().join("garbage.zip");
    fs::write(&garbage, b"not a zip").unwrap();
    let err = target
        .datastore
        .import_datasets_from_file(&garbage, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArchiveOpen);
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_corrupt_snapshot_fails_backend_import() {
    let target = Fixture::new().await;
    let out = TempDir::new().unwrap();
    let archive = out.path().join("corrupt.zip");
    write_zip(
        &archive,
        &[("knowledge.db", b"not sqlite"), ("vectorstore.gob", b"{}")],
    );

    let err = target
        .datastore
        .import_datasets_from_file(&archive, &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendImport);
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_damaged_entry_data_fails_to_open() {
    let target = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let archive = out.path().join("damaged.zip");

    let payload = b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    let mut writer = ZipWriter::new(File::create(&archive).unwrap());
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("knowledge.db", stored).unwrap();
    writer.write_all(payload).unwrap();
    writer.start_file("vectorstore.gob", stored).unwrap();
    writer.write_all(b"{}").unwrap();
    writer.finish().unwrap();

    // Change one payload byte; the central directory still reads fine.
    let mut bytes = fs::read(&archive).unwrap();
    let offset = bytes
        .windows(payload.len())
        .position(|window| window == payload)
        .unwrap();
    bytes[offset] = b'Z';
    fs::write(&archive, bytes).unwrap();

    let before = dataset_ids(&target.datastore).await;
    let collections_before = target.datastore.vector_store().list_collections().await;

    let err = target
        .datastore
        .import_datasets_from_file(&archive, &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveOpen);
    assert_eq!(dataset_ids(&target.datastore).await, before);
    assert_eq!(
        target.datastore.vector_store().list_collections().await,
        collections_before
    );
    assert!(target.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_open_archive_serves_contents_without_default_dataset() {
    let source = Fixture::seeded().await;
    let out = TempDir::new().unwrap();
    let archive = source
        .datastore
        .export_datasets_to_file(out.path().join("manuals.zip"), &["manuals".to_string()])
        .await
        .unwrap();

    let datastore = Datastore::open_archive(&archive, Arc::new(HashEmbeddingProvider::new()))
        .await
        .unwrap();

    assert!(datastore.is_archive());
    assert_eq!(dataset_ids(&datastore).await, vec!["manuals".to_string()]);
    let hits = datastore
        .retrieve("manuals", "battery charge", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].content, "charge the battery");

    let unpacked = datastore.archive_dir().unwrap().to_path_buf();
    assert!(unpacked.join("knowledge.db").is_file());
    drop(datastore);
    assert!(!unpacked.exists());
}
