//! Capacity usage and threshold classification.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Severity of the current capacity usage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WarningLevel {
    Normal,
    Notice,
    Warning,
    Critical,
}

impl WarningLevel {
    /// Thresholds are checked high to low and are inclusive.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::Critical
        } else if percent >= 80.0 {
            Self::Warning
        } else if percent >= 70.0 {
            Self::Notice
        } else {
            Self::Normal
        }
    }
}

/// Usage of the whole storage against its configured capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStatus {
    /// Bytes used (sum of the latest snapshot of every user).
    pub used: u64,
    /// Configured capacity in bytes.
    pub capacity: u64,
    /// `used / capacity * 100`.
    pub percent: f64,
    /// `capacity - used`; negative when usage exceeds capacity.
    pub available: i64,
    pub warning_level: WarningLevel,
}

impl StorageStatus {
    /// Compute the status.
    pub fn new(used: u64, capacity: NonZeroU64) -> Self {
        let capacity = capacity.get();
        let percent = used as f64 * 100.0 / capacity as f64;
        let available = i64::try_from(i128::from(capacity) - i128::from(used)).unwrap_or(
            if capacity >= used { i64::MAX } else { i64::MIN },
        );
        Self {
            used,
            capacity,
            percent,
            available,
            warning_level: WarningLevel::from_percent(percent),
        }
    }

    /// Whether usage is above capacity.
    pub fn is_over_capacity(&self) -> bool {
        self.available < 0
    }
}
