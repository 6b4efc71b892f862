use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::{debug, info};

use coldscan_core::{FileRecord, NewSnapshot, StorageSnapshot, StoreError};

use crate::SnapshotStore;
use crate::convert::{
    from_micros, path_from_sql, path_to_sql, size_from_sql, size_to_sql, to_micros,
};
use crate::sqlite::SqliteStore;

const SNAPSHOT_COLUMNS: &str = "id, user, size_bytes, scan_date, last_modified";

type SnapshotRow = (i64, String, i64, i64, Option<i64>);
type FindingRow = (Vec<u8>, String, i64, i64, i64, Option<i64>);

fn read_snapshot_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn snapshot_from_row(row: SnapshotRow) -> Result<StorageSnapshot, StoreError> {
    let (id, user, size, scan_date, last_modified) = row;
    Ok(StorageSnapshot {
        id,
        user,
        total_size_bytes: size_from_sql(size)?,
        scan_date: from_micros("scan_date", scan_date)?,
        last_modified: last_modified
            .map(|m| from_micros("last_modified", m))
            .transpose()?,
    })
}

fn finding_from_row(row: FindingRow) -> Result<FileRecord, StoreError> {
    let (path, user, size, last_access, last_modified, creation_time) = row;
    Ok(FileRecord {
        path: path_from_sql(path)?,
        owning_user: user,
        size_bytes: size_from_sql(size)?,
        last_access_time: from_micros("last_access", last_access)?,
        last_modified_time: from_micros("last_modified", last_modified)?,
        creation_time: creation_time
            .map(|c| from_micros("creation_time", c))
            .transpose()?,
    })
}

impl SqliteStore {
    fn query_snapshots(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<StorageSnapshot>, StoreError> {
        let mut stmt = self
            .connection()
            .prepare_cached(sql)
            .map_err(|e| StoreError::read(operation, e))?;
        let rows = stmt
            .query_map(params, read_snapshot_row)
            .map_err(|e| StoreError::read(operation, e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::read(operation, e))?;
        rows.into_iter().map(snapshot_from_row).collect()
    }
}

impl SnapshotStore for SqliteStore {
    fn replace_file_findings(&mut self, records: &[FileRecord]) -> Result<usize, StoreError> {
        const OP: &str = "replace_file_findings";

        // Convert up front so a bad record cannot abort a half-written transaction.
        let rows = records
            .iter()
            .map(|r| {
                Ok::<_, StoreError>((
                    path_to_sql(&r.path),
                    r.owning_user.as_str(),
                    size_to_sql(r.size_bytes)?,
                    to_micros(r.last_access_time),
                    to_micros(r.last_modified_time),
                    r.creation_time.map(to_micros),
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let tx = self
            .connection_mut()
            .transaction()
            .map_err(|e| StoreError::write(OP, e))?;

        let removed = tx
            .execute("DELETE FROM file_finding", [])
            .map_err(|e| StoreError::write(OP, e))?;

        let mut count = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO file_finding \
                     (path, user, size_bytes, last_access, last_modified, creation_time) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| StoreError::write(OP, e))?;
            for (path, user, size, access, modified, created) in &rows {
                count += stmt
                    .execute(params![path, user, size, access, modified, created])
                    .map_err(|e| StoreError::write(OP, e))?;
            }
        }

        tx.commit().map_err(|e| StoreError::write(OP, e))?;
        info!(removed, inserted = count, "Replaced file findings");
        Ok(count)
    }

    fn append_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<i64, StoreError> {
        let ids = self.append_snapshots(std::slice::from_ref(snapshot))?;
        Ok(ids[0])
    }

    fn append_snapshots(&mut self, snapshots: &[NewSnapshot]) -> Result<Vec<i64>, StoreError> {
        const OP: &str = "append_snapshots";

        let tx = self
            .connection_mut()
            .transaction()
            .map_err(|e| StoreError::write(OP, e))?;

        let mut ids = Vec::with_capacity(snapshots.len());
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO storage_snapshot (user, size_bytes, scan_date, last_modified) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| StoreError::write(OP, e))?;
            for snapshot in snapshots {
                stmt.execute(params![
                    snapshot.user,
                    size_to_sql(snapshot.total_size_bytes)?,
                    to_micros(snapshot.scan_date),
                    snapshot.last_modified.map(to_micros),
                ])
                .map_err(|e| StoreError::write(OP, e))?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit().map_err(|e| StoreError::write(OP, e))?;
        debug!(count = ids.len(), "Appended storage snapshots");
        Ok(ids)
    }

    fn query_latest_per_user(&self) -> Result<Vec<StorageSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM storage_snapshot s \
             WHERE s.id = ( \
                 SELECT t.id FROM storage_snapshot t WHERE t.user = s.user \
                 ORDER BY t.scan_date DESC, t.id DESC LIMIT 1) \
             ORDER BY s.user"
        );
        self.query_snapshots("query_latest_per_user", &sql, [])
    }

    fn query_history(
        &self,
        user: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StorageSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM storage_snapshot \
             WHERE user = ?1 AND scan_date >= ?2 \
             ORDER BY scan_date, id"
        );
        self.query_snapshots("query_history", &sql, params![user, to_micros(since)])
    }

    fn latest_for_user(&self, user: &str) -> Result<Option<StorageSnapshot>, StoreError> {
        const OP: &str = "latest_for_user";
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM storage_snapshot WHERE user = ?1 \
             ORDER BY scan_date DESC, id DESC LIMIT 1"
        );
        let row = self
            .connection()
            .query_row(&sql, params![user], read_snapshot_row)
            .optional()
            .map_err(|e| StoreError::read(OP, e))?;
        row.map(snapshot_from_row).transpose()
    }

    fn snapshot_users(&self) -> Result<Vec<String>, StoreError> {
        const OP: &str = "snapshot_users";
        let mut stmt = self
            .connection()
            .prepare_cached("SELECT DISTINCT user FROM storage_snapshot ORDER BY user")
            .map_err(|e| StoreError::read(OP, e))?;
        let users = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StoreError::read(OP, e))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| StoreError::read(OP, e))?;
        Ok(users)
    }

    fn file_findings(&self) -> Result<Vec<FileRecord>, StoreError> {
        const OP: &str = "file_findings";
        let mut stmt = self
            .connection()
            .prepare_cached(
                "SELECT path, user, size_bytes, last_access, last_modified, creation_time \
                 FROM file_finding ORDER BY path",
            )
            .map_err(|e| StoreError::read(OP, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(|e| StoreError::read(OP, e))?
            .collect::<rusqlite::Result<Vec<FindingRow>>>()
            .map_err(|e| StoreError::read(OP, e))?;
        rows.into_iter().map(finding_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_append_returns_increasing_ids() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.append_snapshot(&NewSnapshot::new("alice", 10, day(0))).unwrap();
        let b = store.append_snapshot(&NewSnapshot::new("alice", 20, day(1))).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_latest_tie_break_highest_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append_snapshot(&NewSnapshot::new("alice", 10, day(5))).unwrap();
        let last = store.append_snapshot(&NewSnapshot::new("alice", 99, day(5))).unwrap();

        let latest = store.query_latest_per_user().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, last);
        assert_eq!(latest[0].total_size_bytes, 99);
        assert_eq!(store.latest_for_user("alice").unwrap().unwrap().id, last);
    }

    #[test]
    fn test_latest_for_unknown_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.latest_for_user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_oversized_record_rejected_before_write() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let ok = FileRecord::new("/d/alice/a.nd2", "alice", 1, day(0), day(0));
        store.replace_file_findings(std::slice::from_ref(&ok)).unwrap();

        let huge = FileRecord::new("/d/alice/b.nd2", "alice", u64::MAX, day(0), day(0));
        assert!(store.replace_file_findings(&[huge]).is_err());
        assert_eq!(store.file_findings().unwrap(), vec![ok]);
    }
}
