//! File findings and storage snapshot types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single scanned file, valid as of scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path, unique within one scan pass.
    pub path: PathBuf,
    /// User the file is attributed to.
    pub owning_user: String,
    /// Apparent size in bytes.
    pub size_bytes: u64,
    /// Last access time.
    pub last_access_time: DateTime<Utc>,
    /// Last modification time.
    pub last_modified_time: DateTime<Utc>,
    /// Creation time (if available, platform-dependent).
    pub creation_time: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Create a record with no creation time.
    pub fn new(
        path: impl Into<PathBuf>,
        owning_user: impl Into<String>,
        size_bytes: u64,
        last_access_time: DateTime<Utc>,
        last_modified_time: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            owning_user: owning_user.into(),
            size_bytes,
            last_access_time,
            last_modified_time,
            creation_time: None,
        }
    }

    /// Set the creation time.
    pub fn with_creation_time(mut self, created: DateTime<Utc>) -> Self {
        self.creation_time = Some(created);
        self
    }
}

/// A stored measurement of one user's total storage at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSnapshot {
    /// Row id assigned by the store. Later inserts get higher ids.
    pub id: i64,
    /// User (folder) name.
    pub user: String,
    /// Total size of the user's files at scan time.
    pub total_size_bytes: u64,
    /// When the snapshot was taken.
    pub scan_date: DateTime<Utc>,
    /// Newest modification time observed, if known.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A snapshot that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub user: String,
    pub total_size_bytes: u64,
    pub scan_date: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl NewSnapshot {
    pub fn new(user: impl Into<String>, total_size_bytes: u64, scan_date: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            total_size_bytes,
            scan_date,
            last_modified: None,
        }
    }

    /// Set the newest modification time.
    pub fn with_last_modified(mut self, last_modified: Option<DateTime<Utc>>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Attach the id the store assigned.
    pub fn into_stored(self, id: i64) -> StorageSnapshot {
        StorageSnapshot {
            id,
            user: self.user,
            total_size_bytes: self.total_size_bytes,
            scan_date: self.scan_date,
            last_modified: self.last_modified,
        }
    }
}
