//! File system scanning engine for coldscan.
//!
//! Walks one directory per user below a scan root, keeps the files whose
//! name ends with the configured extension and turns each one into a
//! [`FileRecord`] via a single `stat`.
//!
//! - **Per-file failures** (permission denied, files deleted mid-scan) are
//!   logged and returned as [`ScanWarning`]s; the pass continues.
//! - **Fatal failures** (missing user directory, a file attributed to the
//!   wrong user) abort the pass.
//! - **Parallel** traversal via jwalk, and across users via rayon.
//!
//! # Example
//!
//! ```rust,no_run
//! use coldscan_scan::{DirectoryScanner, UserSegment};
//!
//! let scanner = DirectoryScanner::new(UserSegment::Relative);
//! let pass = scanner.scan("/data/microscopy".as_ref(), "alice", ".nd2").unwrap();
//!
//! println!("{} files, {} bytes", pass.file_count(), pass.total_size());
//! ```

mod extract;
mod scanner;

pub use extract::extract;
pub use scanner::{DirectoryScanner, ScanPass, discover_users};

// Re-export core types for convenience
pub use coldscan_core::{
    FileRecord, RelativeToRoot, ScanError, ScanWarning, SegmentIndex, UserResolver, UserSegment,
    WarningKind,
};
