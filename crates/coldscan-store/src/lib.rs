//! Snapshot and findings storage for coldscan.
//!
//! Two independent tables back the system:
//!
//! - **`storage_snapshot`** - append-only, one row per user per scan run.
//!   The latest state of a user is derived at query time, never stored.
//! - **`file_finding`** - the file-level findings of the most recent scan
//!   pass, replaced wholesale and atomically by every new pass.
//!
//! [`SqliteStore`] is the persistent implementation; [`MemoryStore`] keeps
//! the same contract in memory for tests and one-off runs.
//!
//! ```rust,no_run
//! use coldscan_store::{SnapshotStore, SqliteStore};
//!
//! let store = SqliteStore::open("storage.db").unwrap();
//! for snapshot in store.query_latest_per_user().unwrap() {
//!     println!("{}: {} bytes", snapshot.user, snapshot.total_size_bytes);
//! }
//! ```

mod convert;
mod legacy;
mod memory;
mod queries;
mod sqlite;

use chrono::{DateTime, Utc};

pub use coldscan_core::{FileRecord, NewSnapshot, StorageSnapshot, StoreError};
pub use legacy::{LEGACY_DATE_FORMAT, import_legacy_snapshots};
pub use memory::MemoryStore;
pub use sqlite::{SCHEMA_VERSION, SqliteStore};

/// Storage for snapshots and file findings.
///
/// Snapshot rows are immutable once appended. Findings are only ever
/// replaced as a complete set: readers observe either the previous set or
/// the new one, never a mix.
pub trait SnapshotStore {
    /// Discard all stored findings and insert `records`, all-or-nothing.
    /// Returns the number of rows inserted.
    fn replace_file_findings(&mut self, records: &[FileRecord]) -> Result<usize, StoreError>;

    /// Append one snapshot row and return its id.
    fn append_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<i64, StoreError>;

    /// Append several snapshot rows in one transaction.
    fn append_snapshots(&mut self, snapshots: &[NewSnapshot]) -> Result<Vec<i64>, StoreError>;

    /// The row with the newest `scan_date` for every user, ordered by user.
    ///
    /// When several rows share a user's newest date the one with the highest
    /// id (the last appended) wins.
    fn query_latest_per_user(&self) -> Result<Vec<StorageSnapshot>, StoreError>;

    /// Rows for `user` with `scan_date >= since`, oldest first.
    fn query_history(
        &self,
        user: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StorageSnapshot>, StoreError>;

    /// The latest row for a single user.
    fn latest_for_user(&self, user: &str) -> Result<Option<StorageSnapshot>, StoreError>;

    /// Distinct users in the snapshot table, sorted.
    fn snapshot_users(&self) -> Result<Vec<String>, StoreError>;

    /// The current findings set, ordered by path.
    fn file_findings(&self) -> Result<Vec<FileRecord>, StoreError>;
}
