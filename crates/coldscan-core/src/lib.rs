//! Core types and traits for coldscan.
//!
//! This crate provides the data model shared by the scanner, the snapshot
//! store and the aggregation engine: file findings, storage snapshots,
//! configuration, user attribution strategies and the error taxonomy.

mod config;
mod error;
mod record;
mod user;

pub use config::{
    AgeBoundaries, DEFAULT_CAPACITY_BYTES, MAX_DAYS, MonitorConfig, MonitorConfigBuilder,
};
pub use error::{BoxError, ConfigError, ScanError, ScanWarning, StoreError, WarningKind};
pub use record::{FileRecord, NewSnapshot, StorageSnapshot};
pub use user::{RelativeToRoot, SegmentIndex, UserResolver, UserSegment};
