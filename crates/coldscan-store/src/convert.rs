//! Conversions between domain values and SQLite column values.
//!
//! Timestamps are stored as Unix microseconds so that integer ordering
//! matches time ordering; sizes as signed 64-bit integers; paths as the
//! raw bytes of the OS string so non-UTF-8 names survive a round trip.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use coldscan_core::StoreError;

pub(crate) fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

pub(crate) fn from_micros(column: &str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::invalid_row(format!("{column} out of range: {micros}")))
}

pub(crate) fn size_to_sql(size: u64) -> Result<i64, StoreError> {
    i64::try_from(size).map_err(|_| StoreError::invalid_row(format!("size too large: {size}")))
}

pub(crate) fn size_from_sql(size: i64) -> Result<u64, StoreError> {
    u64::try_from(size).map_err(|_| StoreError::invalid_row(format!("negative size: {size}")))
}

#[cfg(unix)]
pub(crate) fn path_to_sql(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
pub(crate) fn path_from_sql(bytes: Vec<u8>) -> Result<PathBuf, StoreError> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

// Paths that are not valid Unicode cannot be represented on these platforms.
#[cfg(not(unix))]
pub(crate) fn path_to_sql(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
pub(crate) fn path_from_sql(bytes: Vec<u8>) -> Result<PathBuf, StoreError> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| StoreError::invalid_row(format!("path is not UTF-8: {e}")))
}
