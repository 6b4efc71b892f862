//! Error types for scanning, storage and configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used to carry backend-specific failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a scan pass.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The user's directory under the scan root does not exist.
    #[error("User directory not found: {path}")]
    RootMissing { path: PathBuf },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No user could be derived from a path.
    #[error("Cannot derive user from {path}: {reason}")]
    UserUnresolved { path: PathBuf, reason: String },

    /// The derived user does not match the subtree being scanned.
    #[error("Path {path} resolves to user {found:?}, expected {expected:?}")]
    UserMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error only affects a single file.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::NotFound { .. } | Self::Io { .. }
        )
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// File disappeared between listing and stat.
    Vanished,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Build a warning from a per-file extraction failure.
    pub fn from_error(error: &ScanError) -> Self {
        match error {
            ScanError::PermissionDenied { path } => Self::new(
                path,
                format!("Permission denied: {}", path.display()),
                WarningKind::PermissionDenied,
            ),
            ScanError::NotFound { path } => Self::new(
                path,
                format!("Vanished during scan: {}", path.display()),
                WarningKind::Vanished,
            ),
            ScanError::Io { path, source } => {
                Self::new(path, format!("Metadata error: {source}"), WarningKind::MetadataError)
            }
            other => Self::new(PathBuf::new(), other.to_string(), WarningKind::ReadError),
        }
    }
}

/// Errors raised by a snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be opened.
    #[error("Cannot open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A write failed; nothing from the operation was committed.
    #[error("Store write failed during {operation}: {source}")]
    Write {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// A read failed. Callers must treat the data as unknown.
    #[error("Store read failed during {operation}: {source}")]
    Read {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The database was written by a newer schema than this build knows.
    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },

    /// A stored or imported row could not be interpreted.
    #[error("Invalid row: {message}")]
    InvalidRow { message: String },
}

impl StoreError {
    pub fn write(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Write {
            operation,
            source: source.into(),
        }
    }

    pub fn read(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Read {
            operation,
            source: source.into(),
        }
    }

    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow {
            message: message.into(),
        }
    }
}

/// Invalid configuration, rejected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Capacity must be greater than zero, got {0}")]
    InvalidCapacity(i64),

    #[error("{name} must be between 0 and {max} days, got {value}", max = crate::config::MAX_DAYS)]
    InvalidThreshold { name: &'static str, value: i64 },

    #[error(
        "Age boundaries must be positive, strictly ascending and at most {max} days, got {0:?}",
        max = crate::config::MAX_DAYS
    )]
    InvalidBoundaries([i64; 3]),

    #[error("History window must be between 1 and {max} days, got {0}", max = crate::config::MAX_DAYS)]
    InvalidHistoryWindow(i64),

    #[error("Extension filter cannot be empty")]
    EmptyExtension,

    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Builder(String),
}
