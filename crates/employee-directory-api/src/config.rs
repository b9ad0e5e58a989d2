use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use employee_directory_core::{FreshnessPolicy, DEFAULT_PAGE_SIZE};
use employee_directory_source::SourceConfig;
use serde::{Deserialize, Serialize};
use time::Duration;

/// Freshness and sizing policy for the composed views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Records per incremental feed page (default: 10)
    pub page_size: usize,
    /// Dashboard snapshot lifetime in seconds (default: 3600)
    pub dashboard_revalidate_secs: i64,
    /// Per-employee snapshot lifetime in seconds (default: 60)
    pub detail_revalidate_secs: i64,
    /// How many leading employees get detail snapshots at startup (default: 30)
    pub prebuild_limit: usize,
    /// Users sampled for the dashboard department list (default: 30)
    pub dashboard_sample_limit: usize,
    /// Users fetched for the full directory listing (default: 100)
    pub directory_limit: usize,
    /// Employee of the day is drawn from ids `1..=max` (default: 100)
    pub employee_of_the_day_max_id: u64,
    /// Feeds and detail sessions untouched this long are discarded (default: 1800)
    pub idle_timeout_secs: i64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            dashboard_revalidate_secs: 3600,
            detail_revalidate_secs: 60,
            prebuild_limit: 30,
            dashboard_sample_limit: 30,
            directory_limit: 100,
            employee_of_the_day_max_id: 100,
            idle_timeout_secs: 1800,
        }
    }
}

impl DirectoryConfig {
    #[must_use]
    pub fn dashboard_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::revalidate_every(self.dashboard_revalidate_secs)
    }

    #[must_use]
    pub fn detail_max_age(&self) -> Duration {
        Duration::seconds(self.detail_revalidate_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::seconds(self.idle_timeout_secs)
    }
}

/// Everything a binary needs, as read from an optional JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    /// # Errors
    /// Fails if the file cannot be read or is not valid JSON for this shape.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Reads `path` when given, otherwise the defaults.
    ///
    /// # Errors
    /// See [`AppConfig::from_json_file`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_json_file)
    }
}
