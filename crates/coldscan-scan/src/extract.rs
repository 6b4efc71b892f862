//! Per-file metadata extraction.

use std::fs::Metadata;
use std::path::Path;

use chrono::{DateTime, Utc};

use coldscan_core::{FileRecord, ScanError, UserResolver};

/// Stat a single file and build its record.
///
/// Access time falls back to the modification time on platforms that do
/// not report it; creation time is left empty when unavailable.
pub fn extract(path: &Path, resolver: &dyn UserResolver) -> Result<FileRecord, ScanError> {
    let metadata = std::fs::metadata(path).map_err(|e| ScanError::io(path, e))?;
    let owning_user = resolver.resolve(path)?;
    record_from_metadata(path, owning_user, &metadata)
}

fn record_from_metadata(
    path: &Path,
    owning_user: String,
    metadata: &Metadata,
) -> Result<FileRecord, ScanError> {
    let modified: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| ScanError::io(path, e))?
        .into();
    let accessed: DateTime<Utc> = metadata.accessed().map(Into::into).unwrap_or(modified);

    Ok(FileRecord {
        path: path.to_path_buf(),
        owning_user,
        size_bytes: metadata.len(),
        last_access_time: accessed,
        last_modified_time: modified,
        creation_time: metadata.created().ok().map(Into::into),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldscan_core::RelativeToRoot;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_reads_size_and_user() {
        let temp = TempDir::new().unwrap();
        let user_dir = temp.path().join("alice");
        fs::create_dir(&user_dir).unwrap();
        let file = user_dir.join("a.nd2");
        fs::write(&file, vec![0u8; 1234]).unwrap();

        let resolver = RelativeToRoot::new(temp.path());
        let record = extract(&file, &resolver).unwrap();

        assert_eq!(record.owning_user, "alice");
        assert_eq!(record.size_bytes, 1234);
        assert_eq!(record.path, file);
    }

    #[test]
    fn test_extract_missing_file() {
        let temp = TempDir::new().unwrap();
        let resolver = RelativeToRoot::new(temp.path());
        let err = extract(&temp.path().join("bob/gone.nd2"), &resolver).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }
}
