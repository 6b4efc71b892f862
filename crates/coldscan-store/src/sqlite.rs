use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use coldscan_core::StoreError;

pub const SCHEMA_VERSION: i64 = 2;

/// SQLite-backed snapshot store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::write("open", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store
            .configure_pragmas()
            .map_err(|e| StoreError::write("configure", e))?;
        store.migrate_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        // WAL lets a reporting process keep reading the previous findings
        // while a scan commits the next set.
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode)");
        Ok(())
    }

    /// Check the schema version and migrate if needed.
    /// Version 1 stored finding paths as lossy text: the findings table is
    /// dropped (the next scan recreates it), snapshots are kept.
    fn migrate_schema(&self) -> Result<(), StoreError> {
        const OP: &str = "migrate";

        let version = self.schema_version()?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        if version == 1 {
            debug!("Schema version 1, dropping file findings");
            self.conn
                .execute_batch("DROP TABLE IF EXISTS file_finding;")
                .map_err(|e| StoreError::write(OP, e))?;
        }

        self.conn
            .execute_batch(include_str!("schema.sql"))
            .map_err(|e| StoreError::write(OP, e))?;
        if version < SCHEMA_VERSION {
            debug!(from = version, to = SCHEMA_VERSION, "Schema migrated");
        }
        Ok(())
    }

    /// The database's `user_version`.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| StoreError::read("schema_version", e))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
