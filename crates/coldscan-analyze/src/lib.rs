//! Aggregation engine for coldscan.
//!
//! Turns stored snapshots and file findings into the views the reports
//! need:
//!
//! - **Capacity** - total usage of the latest snapshots against the
//!   configured capacity, with a warning level
//! - **Age buckets** - findings grouped by user and time since last access
//! - **Migration candidates** - files unused for at least the cold-storage
//!   threshold, with a priority
//!
//! All computations take the reference time `now` explicitly, so the same
//! inputs always produce the same output.
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use coldscan_analyze::AggregationEngine;
//! use coldscan_store::SqliteStore;
//!
//! let store = SqliteStore::open("storage.db").unwrap();
//! let engine = AggregationEngine::new();
//!
//! let status = engine.stored_status(&store).unwrap();
//! println!("{:.1}% used ({})", status.percent, status.warning_level);
//!
//! let report = engine.stored_report(&store, Utc::now()).unwrap();
//! for rec in &report.recommendations {
//!     println!("{} {} days ({})", rec.path.display(), rec.days_unused, rec.priority);
//! }
//! ```

pub mod age;
mod capacity;
mod engine;
mod migration;

pub use age::{AgeBucket, AgeGroup, AgeSummary, BucketStats, UserAgeStats, age_since};
pub use capacity::{StorageStatus, WarningLevel};
pub use engine::{AggregationEngine, EngineConfig, EngineConfigBuilder};
pub use migration::{MigrationRecommendation, MigrationReport, Priority, UserMigrationSummary};

// Re-export core types
pub use coldscan_core::{
    AgeBoundaries, ConfigError, FileRecord, MonitorConfig, NewSnapshot, StorageSnapshot, StoreError,
};
