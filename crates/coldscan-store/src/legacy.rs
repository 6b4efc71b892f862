//! Import from the older single-table snapshot database.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use coldscan_core::{NewSnapshot, StoreError};

use crate::SnapshotStore;
use crate::convert::size_from_sql;

/// Text format of the legacy `date` and `last_modified` columns.
pub const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Copy every row of a legacy `storage_data(folder, size_bytes, date,
/// last_modified)` table into `store` as snapshots.
///
/// Legacy timestamps carry no zone and are read as UTC. The whole table is
/// parsed before anything is written, so a malformed row imports nothing.
pub fn import_legacy_snapshots<S>(store: &mut S, legacy_db: &Path) -> Result<usize, StoreError>
where
    S: SnapshotStore + ?Sized,
{
    const OP: &str = "import_legacy_snapshots";

    let conn = Connection::open_with_flags(legacy_db, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(
        |source| StoreError::Open {
            path: legacy_db.to_path_buf(),
            source: source.into(),
        },
    )?;

    let rows = {
        let mut stmt = conn
            .prepare(
                "SELECT folder, size_bytes, date, last_modified FROM storage_data ORDER BY rowid",
            )
            .map_err(|e| StoreError::read(OP, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| StoreError::read(OP, e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::read(OP, e))?;
        rows
    };

    let snapshots = rows
        .into_iter()
        .map(|(folder, size, date, last_modified)| {
            let scan_date = parse_legacy_date(&date)?;
            let last_modified = last_modified.as_deref().map(parse_legacy_date).transpose()?;
            Ok(NewSnapshot::new(folder, size_from_sql(size)?, scan_date)
                .with_last_modified(last_modified))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    store.append_snapshots(&snapshots)?;
    info!(rows = snapshots.len(), source = %legacy_db.display(), "Imported legacy snapshots");
    Ok(snapshots.len())
}

/// Parse a legacy timestamp such as `2024-02-29 17:45:12.123456`.
pub(crate) fn parse_legacy_date(text: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(text.trim(), LEGACY_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::invalid_row(format!("bad legacy date {text:?}: {e}")))
}
