//! Age-bucketed summaries of file findings.
//!
//! Files are classified by the time since their last access into four
//! fixed buckets. Each bucket's configured bound is inclusive: with the
//! default boundaries a file accessed 30 days ago (or 30 days and some
//! hours) is still in [`AgeBucket::OneMonth`].

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use coldscan_core::{AgeBoundaries, FileRecord};

/// Time-since-last-access classification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
)]
pub enum AgeBucket {
    #[serde(rename = "1_month")]
    #[strum(serialize = "1_month")]
    OneMonth,
    #[serde(rename = "3_months")]
    #[strum(serialize = "3_months")]
    ThreeMonths,
    #[serde(rename = "6_months")]
    #[strum(serialize = "6_months")]
    SixMonths,
    #[serde(rename = "12_plus_months")]
    #[strum(serialize = "12_plus_months")]
    TwelvePlusMonths,
}

impl AgeBucket {
    /// Classify an age against the configured boundaries.
    ///
    /// Only whole elapsed days count, so 180 days and 12 hours is still
    /// 180 days old.
    pub fn for_age(age: TimeDelta, boundaries: &AgeBoundaries) -> Self {
        Self::for_days(age.num_days(), boundaries)
    }

    /// Classify a whole number of days since last access.
    pub fn for_days(days: i64, boundaries: &AgeBoundaries) -> Self {
        if days <= boundaries.one_month {
            Self::OneMonth
        } else if days <= boundaries.three_months {
            Self::ThreeMonths
        } else if days <= boundaries.six_months {
            Self::SixMonths
        } else {
            Self::TwelvePlusMonths
        }
    }

    /// Classify a last-access time relative to `now`.
    pub fn classify(
        last_access: DateTime<Utc>,
        now: DateTime<Utc>,
        boundaries: &AgeBoundaries,
    ) -> Self {
        Self::for_age(age_since(last_access, now), boundaries)
    }
}

/// Time elapsed since `then`. Times after `now` count as zero.
pub fn age_since(then: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (now - then).max(TimeDelta::zero())
}

/// One `(user, bucket)` group in an [`AgeSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeGroup {
    pub user: String,
    pub bucket: AgeBucket,
    /// Number of files in the group.
    pub count: u64,
    /// Total size of files in the group.
    pub total_size: u64,
    /// Earliest last-access time in the group.
    pub oldest_access: DateTime<Utc>,
    /// Latest modification time in the group.
    pub newest_modified: DateTime<Utc>,
}

/// Non-empty age groups ordered by user, then bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AgeSummary {
    pub groups: Vec<AgeGroup>,
}

impl AgeSummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a single group.
    pub fn group(&self, user: &str, bucket: AgeBucket) -> Option<&AgeGroup> {
        self.groups
            .iter()
            .find(|g| g.user == user && g.bucket == bucket)
    }

    /// Groups belonging to one user.
    pub fn for_user<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a AgeGroup> + 'a {
        self.groups.iter().filter(move |g| g.user == user)
    }

    /// Total files across all groups.
    pub fn total_files(&self) -> u64 {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Total size across all groups.
    pub fn total_size(&self) -> u64 {
        self.groups.iter().map(|g| g.total_size).sum()
    }
}

/// Statistics for one bucket of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub bucket: AgeBucket,
    pub count: u64,
    pub total_size: u64,
    pub oldest_access: Option<DateTime<Utc>>,
    pub newest_access: Option<DateTime<Utc>>,
    pub newest_modified: Option<DateTime<Utc>>,
}

impl BucketStats {
    const fn empty(bucket: AgeBucket) -> Self {
        Self {
            bucket,
            count: 0,
            total_size: 0,
            oldest_access: None,
            newest_access: None,
            newest_modified: None,
        }
    }

    fn add(&mut self, record: &FileRecord) {
        self.count += 1;
        self.total_size += record.size_bytes;
        self.oldest_access = Some(min_time(self.oldest_access, record.last_access_time));
        self.newest_access = Some(max_time(self.newest_access, record.last_access_time));
        self.newest_modified = Some(max_time(self.newest_modified, record.last_modified_time));
    }
}

static EMPTY_BUCKETS: [BucketStats; 4] = [
    BucketStats::empty(AgeBucket::OneMonth),
    BucketStats::empty(AgeBucket::ThreeMonths),
    BucketStats::empty(AgeBucket::SixMonths),
    BucketStats::empty(AgeBucket::TwelvePlusMonths),
];

/// Age breakdown for a single user, always covering all four buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgeStats {
    pub user: String,
    /// One entry per bucket, in bucket order.
    pub buckets: Vec<BucketStats>,
}

impl UserAgeStats {
    pub(crate) fn empty(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            buckets: AgeBucket::iter().map(BucketStats::empty).collect(),
        }
    }

    pub(crate) fn add(&mut self, bucket: AgeBucket, record: &FileRecord) {
        if let Some(stats) = self.buckets.iter_mut().find(|b| b.bucket == bucket) {
            stats.add(record);
        }
    }

    /// Stats for one bucket. A bucket missing from `buckets` reads as empty.
    pub fn bucket(&self, bucket: AgeBucket) -> &BucketStats {
        self.buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .unwrap_or(&EMPTY_BUCKETS[bucket as usize])
    }

    pub fn total_files(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.buckets.iter().map(|b| b.total_size).sum()
    }
}

/// Internal accumulator for a summary group.
struct GroupCollector {
    count: u64,
    total_size: u64,
    oldest_access: DateTime<Utc>,
    newest_modified: DateTime<Utc>,
}

impl GroupCollector {
    fn new(record: &FileRecord) -> Self {
        Self {
            count: 1,
            total_size: record.size_bytes,
            oldest_access: record.last_access_time,
            newest_modified: record.last_modified_time,
        }
    }

    fn add(&mut self, record: &FileRecord) {
        self.count += 1;
        self.total_size += record.size_bytes;
        self.oldest_access = self.oldest_access.min(record.last_access_time);
        self.newest_modified = self.newest_modified.max(record.last_modified_time);
    }
}

/// Group records by `(user, bucket)`.
pub(crate) fn summarize(
    records: &[FileRecord],
    now: DateTime<Utc>,
    boundaries: &AgeBoundaries,
) -> AgeSummary {
    let mut groups: BTreeMap<(&str, AgeBucket), GroupCollector> = BTreeMap::new();

    for record in records {
        let bucket = AgeBucket::classify(record.last_access_time, now, boundaries);
        groups
            .entry((record.owning_user.as_str(), bucket))
            .and_modify(|g| g.add(record))
            .or_insert_with(|| GroupCollector::new(record));
    }

    AgeSummary {
        groups: groups
            .into_iter()
            .map(|((user, bucket), g)| AgeGroup {
                user: user.to_string(),
                bucket,
                count: g.count,
                total_size: g.total_size,
                oldest_access: g.oldest_access,
                newest_modified: g.newest_modified,
            })
            .collect(),
    }
}

fn min_time(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    current.map_or(candidate, |c| c.min(candidate))
}

fn max_time(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    current.map_or(candidate, |c| c.max(candidate))
}
