//! SQLite-backed index store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::SNAPSHOT_FILE_NAME;
use crate::error::{IndexError, Result};
use crate::schema::{apply_migrations, ensure_supported};
use crate::store::IndexStore;
use crate::types::{Dataset, FileRecord};

/// Index store on a single SQLite connection.
///
/// Every operation runs on tokio's blocking pool while holding the
/// connection lock, so one `SqliteIndex` may be shared across tasks.
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl SqliteIndex {
    /// Open (or create) a database file, creating missing parent directories.
    ///
    /// With `auto_migrate` the schema is brought up to date immediately;
    /// otherwise only the schema version is checked.
    pub fn open(path: impl AsRef<Path>, auto_migrate: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                debug!("Created index directory: {}", parent.display());
            }
        }

        let conn = Connection::open(path)?;
        Self::bootstrap(conn, path.display().to_string(), auto_migrate)
    }

    /// Open an in-memory database.
    pub fn open_in_memory(auto_migrate: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, ":memory:".to_string(), auto_migrate)
    }

    fn bootstrap(mut conn: Connection, location: String, auto_migrate: bool) -> Result<Self> {
        configure(&conn)?;
        if auto_migrate {
            apply_migrations(&mut conn)?;
        } else {
            ensure_supported(&conn)?;
        }

        info!("Opened index store at {location}");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    /// Where this store keeps its data.
    pub fn location(&self) -> &str {
        &self.location
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| IndexError::LockPoisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

#[async_trait]
impl IndexStore for SqliteIndex {
    async fn auto_migrate(&self) -> Result<()> {
        self.with_conn(apply_migrations).await
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let id = id.to_string();
        self.with_conn(move |conn| get_dataset(conn, &id)).await
    }

    async fn create_dataset(&self, dataset: Dataset) -> Result<()> {
        self.with_conn(move |conn| {
            if get_dataset(conn, &dataset.id)?.is_some() {
                return Err(IndexError::DatasetExists(dataset.id));
            }
            upsert_dataset(conn, &dataset)?;
            debug!("Created dataset {}", dataset.id);
            Ok(())
        })
        .await
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.with_conn(|conn| list_datasets(conn)).await
    }

    async fn delete_dataset(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM datasets WHERE id = ?1", [&id])?;
            if removed == 0 {
                return Err(IndexError::DatasetNotFound(id));
            }
            debug!("Deleted dataset {id}");
            Ok(())
        })
        .await
    }

    async fn add_file(&self, file: FileRecord) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if get_dataset(&tx, &file.dataset_id)?.is_none() {
                return Err(IndexError::DatasetNotFound(file.dataset_id));
            }
            write_file(&tx, &file)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_files(&self, dataset_id: &str) -> Result<Vec<FileRecord>> {
        let dataset_id = dataset_id.to_string();
        self.with_conn(move |conn| list_files(conn, &dataset_id)).await
    }

    async fn export_datasets_to_file(
        &self,
        dir: &Path,
        dataset_ids: &[String],
    ) -> Result<PathBuf> {
        let path = dir.join(SNAPSHOT_FILE_NAME);
        let target = path.clone();
        let requested = dataset_ids.to_vec();

        let count = self
            .with_conn(move |conn| {
                let ids = if requested.is_empty() {
                    list_datasets(conn)?.into_iter().map(|d| d.id).collect()
                } else {
                    requested
                };

                let mut bundles = Vec::with_capacity(ids.len());
                for id in ids {
                    let dataset = get_dataset(conn, &id)?
                        .ok_or_else(|| IndexError::DatasetNotFound(id.clone()))?;
                    let files = list_files(conn, &id)?;
                    bundles.push((dataset, files));
                }

                if target.exists() {
                    std::fs::remove_file(&target)?;
                }

                let mut out = Connection::open(&target)?;
                configure(&out)?;
                apply_migrations(&mut out)?;

                let tx = out.transaction()?;
                for (dataset, files) in &bundles {
                    write_bundle(&tx, dataset, files)?;
                }
                tx.commit()?;

                Ok(bundles.len())
            })
            .await?;

        info!("Exported {count} datasets to {}", path.display());
        Ok(path)
    }

    async fn import_datasets_from_file(&self, path: &Path) -> Result<()> {
        let source = path.to_path_buf();

        let count = self
            .with_conn(move |conn| {
                let snapshot =
                    Connection::open_with_flags(&source, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
                ensure_supported(&snapshot)?;

                let mut bundles = Vec::new();
                for dataset in list_datasets(&snapshot)? {
                    let files = list_files(&snapshot, &dataset.id)?;
                    bundles.push((dataset, files));
                }

                let tx = conn.transaction()?;
                for (dataset, files) in &bundles {
                    write_bundle(&tx, dataset, files)?;
                }
                tx.commit()?;

                Ok(bundles.len())
            })
            .await?;

        info!("Imported {count} datasets from {}", path.display());
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

fn row_to_dataset(row: &Row) -> rusqlite::Result<Dataset> {
    let metadata: Option<String> = row.get(1)?;
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    let created_at: String = row.get(2)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Dataset {
        id: row.get(0)?,
        metadata,
        created_at,
    })
}

fn get_dataset(conn: &Connection, id: &str) -> Result<Option<Dataset>> {
    conn.query_row(
        "SELECT id, metadata, created_at FROM datasets WHERE id = ?1",
        [id],
        row_to_dataset,
    )
    .optional()
    .map_err(Into::into)
}

fn list_datasets(conn: &Connection) -> Result<Vec<Dataset>> {
    let mut stmt = conn.prepare("SELECT id, metadata, created_at FROM datasets ORDER BY id")?;
    let datasets = stmt
        .query_map([], row_to_dataset)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(datasets)
}

fn upsert_dataset(conn: &Connection, dataset: &Dataset) -> Result<()> {
    let metadata = dataset
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"
        INSERT INTO datasets (id, metadata, created_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET metadata = excluded.metadata, created_at = excluded.created_at
        "#,
        params![dataset.id, metadata, dataset.created_at.to_rfc3339()],
    )?;
    Ok(())
}

fn list_files(conn: &Connection, dataset_id: &str) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, dataset_id, absolute_path, checksum FROM files WHERE dataset_id = ?1 ORDER BY absolute_path",
    )?;
    let mut files = stmt
        .query_map([dataset_id], |row| {
            Ok(FileRecord {
                id: row.get(0)?,
                dataset_id: row.get(1)?,
                absolute_path: row.get(2)?,
                checksum: row.get(3)?,
                documents: Vec::new(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut docs = conn.prepare("SELECT id FROM documents WHERE file_id = ?1 ORDER BY position")?;
    for file in &mut files {
        let documents = docs
            .query_map([&file.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        file.documents = documents;
    }

    Ok(files)
}

/// Replaces any file with the same id or the same path in the dataset.
fn write_file(conn: &Connection, file: &FileRecord) -> Result<()> {
    conn.execute(
        "DELETE FROM files WHERE id = ?1 OR (dataset_id = ?2 AND absolute_path = ?3)",
        params![file.id, file.dataset_id, file.absolute_path],
    )?;
    conn.execute(
        "INSERT INTO files (id, dataset_id, absolute_path, checksum) VALUES (?1, ?2, ?3, ?4)",
        params![file.id, file.dataset_id, file.absolute_path, file.checksum],
    )?;

    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO documents (id, file_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, document) in file.documents.iter().enumerate() {
        stmt.execute(params![document, file.id, position as i64])?;
    }
    Ok(())
}

fn write_bundle(conn: &Connection, dataset: &Dataset, files: &[FileRecord]) -> Result<()> {
    upsert_dataset(conn, dataset)?;
    for file in files {
        write_file(conn, file)?;
    }
    debug!("Wrote dataset {} with {} files", dataset.id, files.len());
    Ok(())
}
