//! # Index Store
//!
//! The relational side of the knowledge datastore. It tracks datasets, the
//! files ingested into them and the ids of the documents each file was split
//! into. Vectors live elsewhere; this crate only knows their ids.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Index Store                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  IndexStore (trait) ◄── SqliteIndex ──► schema migrations      │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  datasets ──► files ──► documents        knowledge.db snapshot │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::{IndexError, Result};
pub use sqlite::SqliteIndex;
pub use store::IndexStore;
pub use types::{Dataset, FileRecord};

/// File name of the snapshot written by [`IndexStore::export_datasets_to_file`].
pub const SNAPSHOT_FILE_NAME: &str = "knowledge.db";
