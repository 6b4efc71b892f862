use chrono::{DateTime, Duration, TimeZone, Utc};
use coldscan_store::{
    FileRecord, MemoryStore, NewSnapshot, SCHEMA_VERSION, SnapshotStore, SqliteStore, StoreError,
    import_legacy_snapshots,
};
use std::collections::HashMap;
use tempfile::TempDir;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap() + Duration::days(n)
}

fn record(path: &str, user: &str, size: u64, accessed_day: i64) -> FileRecord {
    FileRecord::new(path, user, size, day(accessed_day), day(accessed_day - 1))
}

/// Runs the same check against both store implementations.
fn for_each_store(check: impl Fn(&mut dyn SnapshotStore)) {
    let mut memory = MemoryStore::new();
    check(&mut memory);

    let temp = TempDir::new().unwrap();
    let mut sqlite = SqliteStore::open(temp.path().join("storage.db")).unwrap();
    check(&mut sqlite);
}

#[test]
fn test_latest_per_user_is_max_scan_date() {
    for_each_store(|store| {
        // Interleaved, out-of-order appends.
        let appends = [
            ("alice", 100, 3),
            ("bob", 50, 1),
            ("alice", 300, 7),
            ("carol", 10, 2),
            ("alice", 200, 5),
            ("bob", 70, 9),
            ("carol", 20, 2),
        ];
        for (user, size, d) in appends {
            store.append_snapshot(&NewSnapshot::new(user, size, day(d))).unwrap();
        }

        let latest = store.query_latest_per_user().unwrap();
        let by_user: HashMap<&str, u64> = latest
            .iter()
            .map(|s| (s.user.as_str(), s.total_size_bytes))
            .collect();

        assert_eq!(latest.len(), 3);
        assert_eq!(by_user["alice"], 300);
        assert_eq!(by_user["bob"], 70);
        // Same date twice: the later append wins.
        assert_eq!(by_user["carol"], 20);
        let users: Vec<&str> = latest.iter().map(|s| s.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob", "carol"]);
    });
}

#[test]
fn test_history_window_is_inclusive_and_ascending() {
    for_each_store(|store| {
        for d in [10, 2, 6, 4, 8] {
            store
                .append_snapshot(&NewSnapshot::new("alice", d as u64 * 10, day(d)))
                .unwrap();
        }
        store.append_snapshot(&NewSnapshot::new("bob", 1, day(9))).unwrap();

        let history = store.query_history("alice", day(4)).unwrap();
        let dates: Vec<DateTime<Utc>> = history.iter().map(|s| s.scan_date).collect();
        assert_eq!(dates, vec![day(4), day(6), day(8), day(10)]);
        assert!(history.iter().all(|s| s.user == "alice"));

        assert!(store.query_history("nobody", day(0)).unwrap().is_empty());
    });
}

#[test]
fn test_snapshot_fields_round_trip() {
    for_each_store(|store| {
        let snapshot = NewSnapshot::new("alice", 123_456_789, day(3)).with_last_modified(Some(day(2)));
        let id = store.append_snapshot(&snapshot).unwrap();

        let latest = store.latest_for_user("alice").unwrap().unwrap();
        assert_eq!(latest, snapshot.clone().into_stored(id));
    });
}

#[test]
fn test_replace_supersedes_previous_findings() {
    for_each_store(|store| {
        let first = vec![
            record("/d/alice/a.nd2", "alice", 1, 0),
            record("/d/alice/b.nd2", "alice", 2, 0),
            record("/d/bob/c.nd2", "bob", 3, 0),
        ];
        assert_eq!(store.replace_file_findings(&first).unwrap(), 3);

        let second = vec![record("/d/bob/z.nd2", "bob", 9, 4), record("/d/alice/a.nd2", "alice", 5, 4)];
        assert_eq!(store.replace_file_findings(&second).unwrap(), 2);

        let findings = store.file_findings().unwrap();
        let paths: Vec<String> = findings
            .iter()
            .map(|r| r.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(paths, vec!["/d/alice/a.nd2", "/d/bob/z.nd2"]);
        assert_eq!(findings[0].size_bytes, 5);
    });
}

#[test]
fn test_failed_replace_keeps_old_findings() {
    for_each_store(|store| {
        let old = vec![record("/d/alice/a.nd2", "alice", 1, 0), record("/d/alice/b.nd2", "alice", 2, 0)];
        store.replace_file_findings(&old).unwrap();

        // The duplicate path fails partway through the insert.
        let bad = vec![
            record("/d/bob/x.nd2", "bob", 1, 1),
            record("/d/bob/y.nd2", "bob", 1, 1),
            record("/d/bob/x.nd2", "bob", 1, 1),
        ];
        let err = store.replace_file_findings(&bad).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));

        assert_eq!(store.file_findings().unwrap(), old);
    });
}

#[test]
fn test_empty_replace_clears_findings() {
    for_each_store(|store| {
        store
            .replace_file_findings(&[record("/d/alice/a.nd2", "alice", 1, 0)])
            .unwrap();
        assert_eq!(store.replace_file_findings(&[]).unwrap(), 0);
        assert!(store.file_findings().unwrap().is_empty());
    });
}

#[test]
fn test_creation_time_round_trip() {
    for_each_store(|store| {
        let with_birth = record("/d/alice/a.nd2", "alice", 1, 3).with_creation_time(day(-30));
        let without = record("/d/alice/b.nd2", "alice", 1, 3);
        store
            .replace_file_findings(&[without.clone(), with_birth.clone()])
            .unwrap();
        assert_eq!(store.file_findings().unwrap(), vec![with_birth, without]);
    });
}

#[cfg(unix)]
#[test]
fn test_non_utf8_paths_stay_distinct() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    for_each_store(|store| {
        let dir = std::path::Path::new("/d/alice");
        let ff = FileRecord::new(dir.join(OsStr::from_bytes(b"\xff.nd2")), "alice", 1, day(0), day(0));
        let fe = FileRecord::new(dir.join(OsStr::from_bytes(b"\xfe.nd2")), "alice", 2, day(0), day(0));
        let plain = record("/d/alice/a.nd2", "alice", 3, 0);

        let written = store
            .replace_file_findings(&[ff.clone(), plain.clone(), fe.clone()])
            .unwrap();
        assert_eq!(written, 3);
        // Byte order: 'a' (0x61) < 0xfe < 0xff.
        assert_eq!(store.file_findings().unwrap(), vec![plain, fe, ff]);
    });
}

#[test]
fn test_snapshot_users_distinct_sorted() {
    for_each_store(|store| {
        for user in ["carol", "alice", "carol", "bob"] {
            store.append_snapshot(&NewSnapshot::new(user, 1, day(0))).unwrap();
        }
        assert_eq!(store.snapshot_users().unwrap(), vec!["alice", "bob", "carol"]);
    });
}

#[test]
fn test_second_handle_sees_complete_sets_only() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("storage.db");
    let mut writer = SqliteStore::open(&path).unwrap();
    let reader = SqliteStore::open(&path).unwrap();

    let old: Vec<FileRecord> = (0..50)
        .map(|i| record(&format!("/d/alice/{i:03}.nd2"), "alice", i, 0))
        .collect();
    writer.replace_file_findings(&old).unwrap();
    assert_eq!(reader.file_findings().unwrap().len(), 50);

    let new: Vec<FileRecord> = (0..20)
        .map(|i| record(&format!("/d/bob/{i:03}.nd2"), "bob", i, 1))
        .collect();
    writer.replace_file_findings(&new).unwrap();
    let seen = reader.file_findings().unwrap();
    assert_eq!(seen.len(), 20);
    assert!(seen.iter().all(|r| r.owning_user == "bob"));
}

#[test]
fn test_reopen_preserves_data() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("storage.db");
    {
        let mut store = SqliteStore::open(&path).unwrap();
        store.append_snapshot(&NewSnapshot::new("alice", 42, day(1))).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.query_latest_per_user().unwrap()[0].total_size_bytes, 42);
}

fn write_legacy_db(dir: &TempDir, rows: &[(&str, i64, &str, Option<&str>)]) -> std::path::PathBuf {
    let path = dir.path().join("storage_data.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE storage_data (
            folder TEXT, size_bytes INTEGER, date TEXT, last_modified TEXT
        );",
    )
    .unwrap();
    for (folder, size, date, modified) in rows {
        conn.execute(
            "INSERT INTO storage_data (folder, size_bytes, date, last_modified) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![folder, size, date, modified],
        )
        .unwrap();
    }
    path
}

#[test]
fn test_import_legacy_snapshots() {
    let temp = TempDir::new().unwrap();
    let legacy = write_legacy_db(
        &temp,
        &[
            ("alice", 1000, "2024-01-01 10:00:00.000000", Some("2023-12-31 09:00:00.500000")),
            ("alice", 1500, "2024-01-08 10:00:00.000000", None),
            ("bob", 700, "2024-01-08 10:00:00.123456", Some("2024-01-02 00:00:00.000000")),
        ],
    );

    let mut store = SqliteStore::open(temp.path().join("new.db")).unwrap();
    let imported = import_legacy_snapshots(&mut store, &legacy).unwrap();
    assert_eq!(imported, 3);

    let latest = store.query_latest_per_user().unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].user, "alice");
    assert_eq!(latest[0].total_size_bytes, 1500);
    assert_eq!(latest[0].scan_date, Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap());
    assert_eq!(latest[0].last_modified, None);
    assert_eq!(latest[1].total_size_bytes, 700);
}

#[test]
fn test_import_rejects_bad_rows_atomically() {
    let temp = TempDir::new().unwrap();
    let legacy = write_legacy_db(
        &temp,
        &[
            ("alice", 1000, "2024-01-01 10:00:00.000000", None),
            ("bob", 700, "last tuesday", None),
        ],
    );

    let mut store = MemoryStore::new();
    let err = import_legacy_snapshots(&mut store, &legacy).unwrap_err();
    assert!(matches!(err, StoreError::InvalidRow { .. }));
    assert_eq!(store.snapshot_count(), 0);
}

#[test]
fn test_import_missing_legacy_db() {
    let temp = TempDir::new().unwrap();
    let mut store = MemoryStore::new();
    let err = import_legacy_snapshots(&mut store, &temp.path().join("absent.db")).unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[test]
fn test_version_one_database_is_migrated() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("storage.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE storage_snapshot (
                 id INTEGER PRIMARY KEY AUTOINCREMENT, user TEXT NOT NULL,
                 size_bytes INTEGER NOT NULL, scan_date INTEGER NOT NULL,
                 last_modified INTEGER);
             CREATE TABLE file_finding (
                 path TEXT PRIMARY KEY NOT NULL, user TEXT NOT NULL,
                 size_bytes INTEGER NOT NULL, last_access INTEGER NOT NULL,
                 last_modified INTEGER NOT NULL, creation_time INTEGER);
             INSERT INTO storage_snapshot (user, size_bytes, scan_date)
                 VALUES ('alice', 42, 1704067200000000);
             INSERT INTO file_finding VALUES ('/d/alice/a.nd2', 'alice', 1, 0, 0, NULL);
             PRAGMA user_version = 1;",
        )
        .unwrap();
    }

    let mut store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    assert_eq!(store.query_latest_per_user().unwrap()[0].total_size_bytes, 42);
    assert!(store.file_findings().unwrap().is_empty());

    let fresh = vec![record("/d/alice/b.nd2", "alice", 5, 1)];
    store.replace_file_findings(&fresh).unwrap();
    assert_eq!(store.file_findings().unwrap(), fresh);
}

#[test]
fn test_newer_schema_is_refused() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("storage.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        store.connection().execute_batch("PRAGMA user_version = 99;").unwrap();
    }

    let err = SqliteStore::open(&path).err().unwrap();
    assert!(matches!(
        err,
        StoreError::UnsupportedSchema { found: 99, supported: SCHEMA_VERSION }
    ));
}
