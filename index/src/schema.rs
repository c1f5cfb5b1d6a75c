//! Schema migrations.
//!
//! Migrations are applied in order inside one transaction. The applied
//! version is mirrored to `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY NOT NULL,
    dataset_id TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
    absolute_path TEXT NOT NULL,
    checksum TEXT,
    UNIQUE(dataset_id, absolute_path)
);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    position INTEGER NOT NULL
);
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_files_dataset ON files(dataset_id);
CREATE INDEX IF NOT EXISTS idx_documents_file ON documents(file_id);
"#;

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: CREATE_TABLES,
    },
    Migration {
        version: 2,
        sql: CREATE_INDEXES,
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Returns the schema version recorded in the database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Fails when the database was written by a newer schema.
pub fn ensure_supported(conn: &Connection) -> Result<u32> {
    let current = current_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(IndexError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    Ok(current)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let current = ensure_supported(conn)?;
    if current == latest_version() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();

        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();

        match apply_migrations(&mut conn).unwrap_err() {
            IndexError::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => {
                assert_eq!(db_version, 999);
                assert_eq!(latest_supported, latest_version());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
