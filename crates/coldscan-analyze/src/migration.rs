//! Cold-storage migration candidates.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use coldscan_core::FileRecord;

use crate::age::age_since;

/// Urgency of a migration recommendation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Priority {
    Medium,
    High,
}

/// A file that should move to cold storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecommendation {
    pub path: PathBuf,
    pub user: String,
    pub size_bytes: u64,
    /// Whole days since last access.
    pub days_unused: i64,
    /// Date of last access (UTC).
    pub last_access: NaiveDate,
    pub priority: Priority,
}

/// Migration candidates of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMigrationSummary {
    pub user: String,
    pub file_count: u64,
    pub total_size: u64,
    pub oldest_access: NaiveDate,
}

/// Migration report over one findings set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Reference time the report was computed for.
    pub generated_at: DateTime<Utc>,
    /// Minimum days unused for a candidate.
    pub threshold_days: i64,
    /// Number of files in the findings set.
    pub scanned_files: u64,
    /// Total size of the findings set.
    pub scanned_size: u64,
    /// Number of migration candidates.
    pub total_files: u64,
    /// Total size of all candidates (space that can be freed).
    pub total_size: u64,
    /// Distinct users owning at least one candidate.
    pub users_affected: usize,
    /// Per-user candidate breakdown, ordered by user.
    pub user_details: Vec<UserMigrationSummary>,
    /// Candidates ordered by path.
    pub recommendations: Vec<MigrationRecommendation>,
}

impl MigrationReport {
    /// Check if there is anything to migrate.
    pub fn has_candidates(&self) -> bool {
        !self.recommendations.is_empty()
    }

    /// Candidates owned by `user`.
    pub fn recommendations_for<'a>(
        &'a self,
        user: &'a str,
    ) -> impl Iterator<Item = &'a MigrationRecommendation> + 'a {
        self.recommendations.iter().filter(move |r| r.user == user)
    }

    /// Number of high-priority candidates.
    pub fn high_priority_count(&self) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.priority == Priority::High)
            .count()
    }
}

pub(crate) fn recommend(
    records: &[FileRecord],
    now: DateTime<Utc>,
    threshold_days: i64,
    high_priority_days: i64,
) -> Vec<MigrationRecommendation> {
    records
        .iter()
        .filter_map(|record| {
            // Whole days, the same measure the age buckets use.
            let days_unused = age_since(record.last_access_time, now).num_days();
            if days_unused < threshold_days {
                return None;
            }
            Some(MigrationRecommendation {
                path: record.path.clone(),
                user: record.owning_user.clone(),
                size_bytes: record.size_bytes,
                days_unused,
                last_access: record.last_access_time.date_naive(),
                priority: if days_unused > high_priority_days {
                    Priority::High
                } else {
                    Priority::Medium
                },
            })
        })
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect()
}

pub(crate) fn summarize_by_user(
    recommendations: &[MigrationRecommendation],
) -> Vec<UserMigrationSummary> {
    recommendations
        .iter()
        .into_group_map_by(|r| r.user.as_str())
        .into_iter()
        .sorted_by_key(|(user, _)| *user)
        .filter_map(|(user, recs)| {
            Some(UserMigrationSummary {
                user: user.to_string(),
                file_count: recs.len() as u64,
                total_size: recs.iter().map(|r| r.size_bytes).sum(),
                oldest_access: recs.iter().map(|r| r.last_access).min()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap()
    }

    fn unused_for(path: &str, user: &str, days: i64) -> FileRecord {
        let accessed = now() - TimeDelta::days(days);
        FileRecord::new(path, user, 10, accessed, accessed)
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let records = [
            unused_for("/d/a/89.nd2", "a", 89),
            unused_for("/d/a/90.nd2", "a", 90),
            unused_for("/d/a/91.nd2", "a", 91),
        ];
        let recs = recommend(&records, now(), 90, 180);
        let days: Vec<i64> = recs.iter().map(|r| r.days_unused).collect();
        assert_eq!(days, vec![90, 91]);
    }

    #[test]
    fn test_priority_boundary() {
        let records = [
            unused_for("/d/a/180.nd2", "a", 180),
            unused_for("/d/a/181.nd2", "a", 181),
        ];
        let recs = recommend(&records, now(), 90, 180);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert_eq!(recs[1].priority, Priority::High);
    }

    #[test]
    fn test_partial_day_keeps_medium_priority() {
        let accessed = now() - TimeDelta::days(180) - TimeDelta::hours(12);
        let records = [FileRecord::new("/d/a/half.nd2", "a", 10, accessed, accessed)];
        let recs = recommend(&records, now(), 180, 180);
        assert_eq!(recs[0].days_unused, 180);
        assert_eq!(recs[0].priority, Priority::Medium);
    }

    #[test]
    fn test_zero_threshold_includes_everything() {
        let records = [unused_for("/d/a/new.nd2", "a", 0)];
        let recs = recommend(&records, now(), 0, 180);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].days_unused, 0);
    }

    #[test]
    fn test_output_sorted_by_path() {
        let records = [
            unused_for("/d/b/z.nd2", "b", 100),
            unused_for("/d/a/y.nd2", "a", 100),
            unused_for("/d/a/x.nd2", "a", 100),
        ];
        let recs = recommend(&records, now(), 90, 180);
        let paths: Vec<&str> = recs.iter().map(|r| r.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["/d/a/x.nd2", "/d/a/y.nd2", "/d/b/z.nd2"]);
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(Priority::High.to_string(), "HIGH");
        assert_eq!(Priority::Medium.as_ref(), "MEDIUM");
    }
}
