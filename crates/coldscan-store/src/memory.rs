use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use coldscan_core::{FileRecord, NewSnapshot, StorageSnapshot, StoreError};

use crate::SnapshotStore;

/// In-memory snapshot store with the same contract as [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    snapshots: Vec<StorageSnapshot>,
    findings: Vec<FileRecord>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshot rows stored.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

fn is_newer(candidate: &StorageSnapshot, current: &StorageSnapshot) -> bool {
    (candidate.scan_date, candidate.id) > (current.scan_date, current.id)
}

impl SnapshotStore for MemoryStore {
    fn replace_file_findings(&mut self, records: &[FileRecord]) -> Result<usize, StoreError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(&record.path) {
                return Err(StoreError::write(
                    "replace_file_findings",
                    format!("duplicate path {}", record.path.display()),
                ));
            }
        }

        let mut next = records.to_vec();
        // Byte order, matching SQLite's default collation.
        next.sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
        self.findings = next;
        debug!(inserted = records.len(), "Replaced in-memory findings");
        Ok(records.len())
    }

    fn append_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<i64, StoreError> {
        self.next_id += 1;
        let id = self.next_id;
        self.snapshots.push(snapshot.clone().into_stored(id));
        Ok(id)
    }

    fn append_snapshots(&mut self, snapshots: &[NewSnapshot]) -> Result<Vec<i64>, StoreError> {
        snapshots.iter().map(|s| self.append_snapshot(s)).collect()
    }

    fn query_latest_per_user(&self) -> Result<Vec<StorageSnapshot>, StoreError> {
        let mut latest: BTreeMap<&str, &StorageSnapshot> = BTreeMap::new();
        for snapshot in &self.snapshots {
            latest
                .entry(snapshot.user.as_str())
                .and_modify(|current| {
                    if is_newer(snapshot, *current) {
                        *current = snapshot;
                    }
                })
                .or_insert(snapshot);
        }
        Ok(latest.into_values().cloned().collect())
    }

    fn query_history(
        &self,
        user: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StorageSnapshot>, StoreError> {
        let mut history: Vec<StorageSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.user == user && s.scan_date >= since)
            .cloned()
            .collect();
        history.sort_by_key(|s| (s.scan_date, s.id));
        Ok(history)
    }

    fn latest_for_user(&self, user: &str) -> Result<Option<StorageSnapshot>, StoreError> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| s.user == user)
            .max_by_key(|s| (s.scan_date, s.id))
            .cloned())
    }

    fn snapshot_users(&self) -> Result<Vec<String>, StoreError> {
        let mut users: Vec<String> = self.snapshots.iter().map(|s| s.user.clone()).collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    fn file_findings(&self) -> Result<Vec<FileRecord>, StoreError> {
        Ok(self.findings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_duplicate_paths_leave_findings_untouched() {
        let mut store = MemoryStore::new();
        let a = FileRecord::new("/d/alice/a.nd2", "alice", 1, day(0), day(0));
        store.replace_file_findings(std::slice::from_ref(&a)).unwrap();

        let b = FileRecord::new("/d/alice/b.nd2", "alice", 2, day(0), day(0));
        let result = store.replace_file_findings(&[b.clone(), b]);
        assert!(matches!(result, Err(StoreError::Write { .. })));
        assert_eq!(store.file_findings().unwrap(), vec![a]);
    }

    #[test]
    fn test_latest_ignores_append_order() {
        let mut store = MemoryStore::new();
        store.append_snapshot(&NewSnapshot::new("alice", 30, day(3))).unwrap();
        store.append_snapshot(&NewSnapshot::new("alice", 10, day(1))).unwrap();
        store.append_snapshot(&NewSnapshot::new("bob", 5, day(2))).unwrap();

        let latest = store.query_latest_per_user().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].user, "alice");
        assert_eq!(latest[0].total_size_bytes, 30);
        assert_eq!(latest[1].user, "bob");
        assert_eq!(store.snapshot_count(), 3);
    }
}
