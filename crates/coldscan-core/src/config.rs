//! Monitor configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::user::UserSegment;

/// 80 TiB.
pub const DEFAULT_CAPACITY_BYTES: i64 = 80 * 1024_i64.pow(4);

/// Largest accepted day count for thresholds, windows and boundaries.
pub const MAX_DAYS: i64 = 36_500;

/// Upper bounds (in days, inclusive) of the first three age buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBoundaries {
    #[serde(default = "default_one_month")]
    pub one_month: i64,
    #[serde(default = "default_three_months")]
    pub three_months: i64,
    #[serde(default = "default_six_months")]
    pub six_months: i64,
}

fn default_one_month() -> i64 {
    30
}

fn default_three_months() -> i64 {
    90
}

fn default_six_months() -> i64 {
    180
}

impl Default for AgeBoundaries {
    fn default() -> Self {
        Self {
            one_month: default_one_month(),
            three_months: default_three_months(),
            six_months: default_six_months(),
        }
    }
}

impl AgeBoundaries {
    pub fn new(one_month: i64, three_months: i64, six_months: i64) -> Result<Self, ConfigError> {
        let boundaries = Self {
            one_month,
            three_months,
            six_months,
        };
        boundaries.validate()?;
        Ok(boundaries)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let days = [self.one_month, self.three_months, self.six_months];
        if days[0] <= 0 || days[0] >= days[1] || days[1] >= days[2] || days[2] > MAX_DAYS {
            return Err(ConfigError::InvalidBoundaries(days));
        }
        Ok(())
    }
}

/// Configuration for scan and report runs.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate_builder", error = "ConfigError"))]
pub struct MonitorConfig {
    /// Directory containing one subdirectory per user.
    #[builder(default = "PathBuf::from(\".\")")]
    #[serde(default = "default_scan_root")]
    pub scan_root: PathBuf,

    /// How the owning user is derived from a file path.
    #[builder(default)]
    #[serde(default)]
    pub user_segment: UserSegment,

    /// Case-sensitive file name suffix to match.
    #[builder(default = "default_extension()")]
    #[serde(default = "default_extension")]
    pub extension: String,

    /// SQLite database holding snapshots and findings.
    #[builder(default = "default_database()")]
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Total capacity of the storage in bytes.
    #[builder(default = "DEFAULT_CAPACITY_BYTES")]
    #[serde(default = "default_capacity")]
    pub capacity_bytes: i64,

    /// Minimum days since last access for a migration candidate.
    #[builder(default = "90")]
    #[serde(default = "default_threshold")]
    pub cold_storage_threshold_days: i64,

    /// Candidates unused for more than this many days get high priority.
    #[builder(default = "180")]
    #[serde(default = "default_high_priority")]
    pub high_priority_days: i64,

    /// Length of the per-user history series.
    #[builder(default = "30")]
    #[serde(default = "default_history_window")]
    pub history_window_days: i64,

    #[builder(default)]
    #[serde(default)]
    pub age_boundaries: AgeBoundaries,
}

fn default_scan_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    ".nd2".to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("storage.db")
}

fn default_capacity() -> i64 {
    DEFAULT_CAPACITY_BYTES
}

fn default_threshold() -> i64 {
    90
}

fn default_high_priority() -> i64 {
    180
}

fn default_history_window() -> i64 {
    30
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::Builder(err.to_string())
    }
}

impl MonitorConfigBuilder {
    fn validate_builder(&self) -> Result<(), ConfigError> {
        if let Some(capacity) = self.capacity_bytes {
            check_capacity(capacity)?;
        }
        if let Some(days) = self.cold_storage_threshold_days {
            check_day_count("cold_storage_threshold_days", days)?;
        }
        if let Some(days) = self.high_priority_days {
            check_day_count("high_priority_days", days)?;
        }
        if let Some(days) = self.history_window_days {
            check_history_window(days)?;
        }
        if let Some(ref ext) = self.extension {
            check_extension(ext)?;
        }
        if let Some(ref boundaries) = self.age_boundaries {
            boundaries.validate()?;
        }
        Ok(())
    }
}

fn check_capacity(capacity: i64) -> Result<(), ConfigError> {
    if capacity <= 0 {
        return Err(ConfigError::InvalidCapacity(capacity));
    }
    Ok(())
}

fn check_day_count(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if !(0..=MAX_DAYS).contains(&value) {
        return Err(ConfigError::InvalidThreshold { name, value });
    }
    Ok(())
}

fn check_history_window(days: i64) -> Result<(), ConfigError> {
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(ConfigError::InvalidHistoryWindow(days));
    }
    Ok(())
}

fn check_extension(ext: &str) -> Result<(), ConfigError> {
    if ext.is_empty() {
        return Err(ConfigError::EmptyExtension);
    }
    Ok(())
}

impl MonitorConfig {
    /// Create a new config builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field. Run again after applying overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_capacity(self.capacity_bytes)?;
        check_day_count("cold_storage_threshold_days", self.cold_storage_threshold_days)?;
        check_day_count("high_priority_days", self.high_priority_days)?;
        check_history_window(self.history_window_days)?;
        check_extension(&self.extension)?;
        self.age_boundaries.validate()
    }

    /// Capacity as an unsigned byte count. Only meaningful after validation.
    pub fn capacity(&self) -> u64 {
        self.capacity_bytes.max(0) as u64
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_root: default_scan_root(),
            user_segment: UserSegment::default(),
            extension: default_extension(),
            database: default_database(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            cold_storage_threshold_days: default_threshold(),
            high_priority_days: default_high_priority(),
            history_window_days: default_history_window(),
            age_boundaries: AgeBoundaries::default(),
        }
    }
}
