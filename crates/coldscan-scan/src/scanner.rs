//! JWalk-based directory scanner.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use tracing::{debug, warn};

use coldscan_core::{
    FileRecord, MonitorConfig, NewSnapshot, ScanError, ScanWarning, UserResolver, UserSegment,
    WarningKind,
};

use crate::extract::extract;

/// Result of scanning one user's subtree.
#[derive(Debug, Clone)]
pub struct ScanPass {
    /// User whose directory was scanned.
    pub user: String,
    /// Directory that was walked.
    pub root: PathBuf,
    /// One record per matching file, in no particular order.
    pub records: Vec<FileRecord>,
    /// Files and directories that were skipped.
    pub warnings: Vec<ScanWarning>,
    /// Time spent walking.
    pub duration: Duration,
}

impl ScanPass {
    /// Sum of all record sizes.
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }

    /// Number of matching files.
    pub fn file_count(&self) -> usize {
        self.records.len()
    }

    /// Newest modification time among the records.
    pub fn newest_modified(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.last_modified_time).max()
    }

    /// Build the storage snapshot this pass contributes.
    pub fn snapshot(&self, scan_date: DateTime<Utc>) -> NewSnapshot {
        NewSnapshot::new(&self.user, self.total_size(), scan_date)
            .with_last_modified(self.newest_modified())
    }
}

/// Scanner that walks per-user subtrees and extracts file records.
pub struct DirectoryScanner {
    segment: UserSegment,
    resolver: Option<Box<dyn UserResolver>>,
    threads: usize,
}

impl DirectoryScanner {
    /// Create a scanner that attributes files using `segment`.
    pub fn new(segment: UserSegment) -> Self {
        Self {
            segment,
            resolver: None,
            threads: 0,
        }
    }

    /// Create a scanner from the monitor configuration.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.user_segment.clone())
    }

    /// Use a custom attribution strategy instead of the configured segment.
    pub fn with_resolver(mut self, resolver: Box<dyn UserResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Number of walker threads for a single subtree (0 = auto-detect).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Scan `root/user` for files whose name ends with `extension`.
    ///
    /// Per-file stat failures are skipped and reported as warnings. The scan
    /// fails if the user directory is missing or if any file resolves to a
    /// different user than `user`.
    pub fn scan(&self, root: &Path, user: &str, extension: &str) -> Result<ScanPass, ScanError> {
        let parallelism = match self.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };
        self.scan_with(root, user, extension, parallelism)
    }

    /// Scan several users in parallel. Results keep the order of `users`.
    pub fn scan_users(
        &self,
        root: &Path,
        users: &[String],
        extension: &str,
    ) -> Vec<(String, Result<ScanPass, ScanError>)> {
        users
            .par_iter()
            .map(|user| {
                // Users already run on the rayon pool; walk each subtree serially.
                let pass = self.scan_with(root, user, extension, Parallelism::Serial);
                (user.clone(), pass)
            })
            .collect()
    }

    fn scan_with(
        &self,
        root: &Path,
        user: &str,
        extension: &str,
        parallelism: Parallelism,
    ) -> Result<ScanPass, ScanError> {
        let start = Instant::now();
        let root = canonical_root(root)?;
        let user_dir = root.join(user);

        match std::fs::metadata(&user_dir) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Err(ScanError::NotADirectory { path: user_dir }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::RootMissing { path: user_dir });
            }
            Err(e) => return Err(ScanError::io(&user_dir, e)),
        }

        let default_resolver;
        let resolver: &dyn UserResolver = match &self.resolver {
            Some(custom) => custom.as_ref(),
            None => {
                default_resolver = self.segment.resolver(&root);
                default_resolver.as_ref()
            }
        };

        let walker = WalkDir::new(&user_dir)
            .parallelism(parallelism)
            .skip_hidden(false)
            .follow_links(false)
            .sort(false);

        let mut records = Vec::new();
        let mut warnings = Vec::new();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                    warnings.push(ScanWarning::new(path, err.to_string(), WarningKind::ReadError));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(extension) {
                continue;
            }

            let path = entry.path();
            match extract(&path, resolver) {
                Ok(record) if record.owning_user == user => records.push(record),
                Ok(record) => {
                    return Err(ScanError::UserMismatch {
                        path,
                        expected: user.to_string(),
                        found: record.owning_user,
                    });
                }
                Err(err) if err.is_per_file() => {
                    warn!(path = %path.display(), error = %err, "Skipping file");
                    warnings.push(ScanWarning::from_error(&err));
                }
                Err(err) => return Err(err),
            }
        }

        let duration = start.elapsed();
        debug!(
            user,
            files = records.len(),
            warnings = warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Scan pass complete"
        );

        Ok(ScanPass {
            user: user.to_string(),
            root: user_dir,
            records,
            warnings,
            duration,
        })
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(UserSegment::default())
    }
}

/// List the user directories directly below `root`, sorted by name.
pub fn discover_users(root: &Path) -> Result<Vec<String>, ScanError> {
    let root = canonical_root(root)?;
    let entries = std::fs::read_dir(&root).map_err(|e| ScanError::io(&root, e))?;

    let mut users = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::io(&root, e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            users.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    users.sort();
    Ok(users)
}

fn canonical_root(root: &Path) -> Result<PathBuf, ScanError> {
    let root = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
    if !root.is_dir() {
        return Err(ScanError::NotADirectory { path: root });
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("alice/run1/deep")).unwrap();
        fs::create_dir_all(root.join("bob")).unwrap();

        fs::write(root.join("alice/a.nd2"), vec![0u8; 100]).unwrap();
        fs::write(root.join("alice/run1/b.nd2"), vec![0u8; 200]).unwrap();
        fs::write(root.join("alice/run1/deep/c.nd2"), vec![0u8; 300]).unwrap();
        fs::write(root.join("alice/run1/notes.txt"), "not an image").unwrap();
        fs::write(root.join("alice/run1/upper.ND2"), vec![0u8; 50]).unwrap();
        fs::write(root.join("bob/x.nd2"), vec![0u8; 500]).unwrap();

        temp
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let temp = create_test_tree();
        let scanner = DirectoryScanner::default();
        let pass = scanner.scan(temp.path(), "alice", ".nd2").unwrap();

        assert_eq!(pass.file_count(), 3);
        assert_eq!(pass.total_size(), 600);
        assert!(pass.warnings.is_empty());
        assert!(pass.records.iter().all(|r| r.owning_user == "alice"));
    }

    #[test]
    fn test_extension_is_case_sensitive() {
        let temp = create_test_tree();
        let scanner = DirectoryScanner::default();
        let pass = scanner.scan(temp.path(), "alice", ".ND2").unwrap();

        assert_eq!(pass.file_count(), 1);
        assert_eq!(pass.total_size(), 50);
    }

    #[test]
    fn test_missing_user_is_fatal() {
        let temp = create_test_tree();
        let scanner = DirectoryScanner::default();
        let err = scanner.scan(temp.path(), "carol", ".nd2").unwrap_err();
        assert!(matches!(err, ScanError::RootMissing { .. }));
    }

    #[test]
    fn test_snapshot_from_pass() {
        let temp = create_test_tree();
        let scanner = DirectoryScanner::default();
        let pass = scanner.scan(temp.path(), "bob", ".nd2").unwrap();

        let now = Utc::now();
        let snapshot = pass.snapshot(now);
        assert_eq!(snapshot.user, "bob");
        assert_eq!(snapshot.total_size_bytes, 500);
        assert_eq!(snapshot.scan_date, now);
        assert_eq!(snapshot.last_modified, pass.newest_modified());
    }

    #[test]
    fn test_discover_users() {
        let temp = create_test_tree();
        fs::write(temp.path().join("stray.nd2"), "x").unwrap();
        let users = discover_users(temp.path()).unwrap();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }
}
