//! The aggregation engine.
//!
//! Every operation is a pure transformation of its inputs: findings and
//! snapshots are passed in (or read through a [`SnapshotStore`]) and the
//! reference time `now` is always an argument.

use std::collections::BTreeMap;
use std::num::NonZeroU64;

use chrono::{DateTime, TimeDelta, Utc};
use derive_builder::Builder;
use tracing::debug;

use coldscan_core::{
    AgeBoundaries, ConfigError, DEFAULT_CAPACITY_BYTES, FileRecord, MAX_DAYS, MonitorConfig,
    StorageSnapshot, StoreError,
};
use coldscan_store::SnapshotStore;

use crate::age::{AgeBucket, AgeSummary, UserAgeStats, summarize};
use crate::capacity::StorageStatus;
use crate::migration::{MigrationRecommendation, MigrationReport, recommend, summarize_by_user};

/// Configuration for the aggregation engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate", error = "ConfigError"))]
pub struct EngineConfig {
    /// Total storage capacity in bytes.
    #[builder(default = "DEFAULT_CAPACITY_BYTES as u64")]
    pub capacity: u64,

    /// Minimum days since last access for a migration candidate.
    #[builder(default = "90")]
    pub threshold_days: i64,

    /// Candidates unused for more than this many days are high priority.
    #[builder(default = "180")]
    pub high_priority_days: i64,

    /// Length of the history series.
    #[builder(default = "30")]
    pub history_window_days: i64,

    #[builder(default)]
    pub boundaries: AgeBoundaries,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::InvalidCapacity(0));
        }
        for (name, value) in [
            ("threshold_days", self.threshold_days),
            ("high_priority_days", self.high_priority_days),
        ] {
            if let Some(v) = value.filter(|v| !(0..=MAX_DAYS).contains(v)) {
                return Err(ConfigError::InvalidThreshold { name, value: v });
            }
        }
        if let Some(days) = self.history_window_days.filter(|d| !(1..=MAX_DAYS).contains(d)) {
            return Err(ConfigError::InvalidHistoryWindow(days));
        }
        if let Some(ref boundaries) = self.boundaries {
            boundaries.validate()?;
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Derive the engine settings from a validated monitor configuration.
    pub fn from_monitor(config: &MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity(),
            threshold_days: config.cold_storage_threshold_days,
            high_priority_days: config.high_priority_days,
            history_window_days: config.history_window_days,
            boundaries: config.age_boundaries,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY_BYTES as u64,
            threshold_days: 90,
            high_priority_days: 180,
            history_window_days: 30,
            boundaries: AgeBoundaries::default(),
        }
    }
}

/// Aggregates snapshots and findings into reports.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: EngineConfig,
}

impl AggregationEngine {
    /// Create an engine with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom config.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sum of the latest snapshot sizes.
    pub fn total_storage(&self, latest: &[StorageSnapshot]) -> u64 {
        latest.iter().map(|s| s.total_size_bytes).sum()
    }

    /// Usage status for `used` bytes against the configured capacity.
    /// A zero capacity (only reachable by building the config by hand)
    /// counts as one byte.
    pub fn storage_status(&self, used: u64) -> StorageStatus {
        let capacity = NonZeroU64::new(self.config.capacity).unwrap_or(NonZeroU64::MIN);
        StorageStatus::new(used, capacity)
    }

    /// Group findings by user and age bucket. Empty groups are omitted.
    pub fn age_summary(&self, records: &[FileRecord], now: DateTime<Utc>) -> AgeSummary {
        summarize(records, now, &self.config.boundaries)
    }

    /// All four buckets for one user; zero-count when the user has no findings.
    pub fn user_age_stats(
        &self,
        user: &str,
        records: &[FileRecord],
        now: DateTime<Utc>,
    ) -> UserAgeStats {
        let mut stats = UserAgeStats::empty(user);
        for record in records.iter().filter(|r| r.owning_user == user) {
            let bucket = AgeBucket::classify(record.last_access_time, now, &self.config.boundaries);
            stats.add(bucket, record);
        }
        stats
    }

    /// Per-user stats for every known user and every user in `records`,
    /// ordered by user.
    pub fn age_overview(
        &self,
        known_users: &[String],
        records: &[FileRecord],
        now: DateTime<Utc>,
    ) -> Vec<UserAgeStats> {
        let mut by_user: BTreeMap<&str, UserAgeStats> = known_users
            .iter()
            .map(|u| (u.as_str(), UserAgeStats::empty(u.as_str())))
            .collect();

        for record in records {
            let bucket = AgeBucket::classify(record.last_access_time, now, &self.config.boundaries);
            by_user
                .entry(record.owning_user.as_str())
                .or_insert_with(|| UserAgeStats::empty(record.owning_user.as_str()))
                .add(bucket, record);
        }

        by_user.into_values().collect()
    }

    /// Files unused for at least the threshold, ordered by path.
    pub fn migration_recommendations(
        &self,
        records: &[FileRecord],
        now: DateTime<Utc>,
    ) -> Vec<MigrationRecommendation> {
        recommend(
            records,
            now,
            self.config.threshold_days,
            self.config.high_priority_days,
        )
    }

    /// Full migration report over one findings set.
    pub fn report(&self, records: &[FileRecord], now: DateTime<Utc>) -> MigrationReport {
        let recommendations = self.migration_recommendations(records, now);
        let user_details = summarize_by_user(&recommendations);

        let report = MigrationReport {
            generated_at: now,
            threshold_days: self.config.threshold_days,
            scanned_files: records.len() as u64,
            scanned_size: records.iter().map(|r| r.size_bytes).sum(),
            total_files: recommendations.len() as u64,
            total_size: recommendations.iter().map(|r| r.size_bytes).sum(),
            users_affected: user_details.len(),
            user_details,
            recommendations,
        };
        debug!(
            scanned = report.scanned_files,
            candidates = report.total_files,
            users = report.users_affected,
            "Built migration report"
        );
        report
    }

    // Store-backed views

    /// Latest snapshot per user, largest first (ties by user name).
    pub fn latest_per_user<S>(&self, store: &S) -> Result<Vec<StorageSnapshot>, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        let mut latest = store.query_latest_per_user()?;
        latest.sort_by(|a, b| {
            b.total_size_bytes
                .cmp(&a.total_size_bytes)
                .then_with(|| a.user.cmp(&b.user))
        });
        Ok(latest)
    }

    /// Total bytes used according to the latest snapshots.
    pub fn stored_total<S>(&self, store: &S) -> Result<u64, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        Ok(self.total_storage(&store.query_latest_per_user()?))
    }

    /// Capacity status according to the latest snapshots.
    pub fn stored_status<S>(&self, store: &S) -> Result<StorageStatus, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        Ok(self.storage_status(self.stored_total(store)?))
    }

    /// Snapshots for `user` within the configured window before `now`.
    pub fn user_history<S>(
        &self,
        store: &S,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StorageSnapshot>, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        // Windows reaching past the representable range start at the beginning of time.
        let since = TimeDelta::try_days(self.config.history_window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        store.query_history(user, since)
    }

    /// Age overview of the stored findings, including snapshot-only users.
    pub fn stored_age_overview<S>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserAgeStats>, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        let users = store.snapshot_users()?;
        let findings = store.file_findings()?;
        Ok(self.age_overview(&users, &findings, now))
    }

    /// Migration report over the stored findings.
    pub fn stored_report<S>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<MigrationReport, StoreError>
    where
        S: SnapshotStore + ?Sized,
    {
        Ok(self.report(&store.file_findings()?, now))
    }
}
