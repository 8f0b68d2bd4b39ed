//! Engine configuration.
//!
//! Defaults are tuned for a handheld viewer on a home network: a small
//! decoded window, cheap wide thumbnail and pre-buffer sweeps, and a
//! generous loading timeout because slow responses are far more common
//! than permanent failures.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::{EngineError, Result};

pub const DEFAULT_WINDOW_RADIUS: usize = 3;
pub const DEFAULT_THUMBNAIL_RADIUS: usize = 5;
pub const DEFAULT_PREBUFFER_RADIUS: usize = 5;
pub const DEFAULT_PREBUFFER_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Decoded assets are kept within this distance of the cursor
    pub window_radius: usize,
    /// Thumbnails are prefetched and kept within this distance
    pub thumbnail_radius: usize,
    /// Videos within this distance get their leading bytes pre-buffered
    pub prebuffer_radius: usize,
    /// Size of the pre-buffered prefix per video
    pub prebuffer_bytes: u64,
    /// Pause between publishing a preview and starting its upgrade
    #[serde(deserialize_with = "human_duration")]
    pub upgrade_settle_delay: Duration,
    /// How long the current index may stay in the loading state before a
    /// timeout event is emitted
    #[serde(deserialize_with = "human_duration")]
    pub loading_timeout: Duration,
    /// Minimum spacing between download progress events
    #[serde(deserialize_with = "human_duration")]
    pub progress_interval: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub http_timeout: Duration,
    pub event_capacity: usize,
    pub max_concurrent_downloads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_radius: DEFAULT_WINDOW_RADIUS,
            thumbnail_radius: DEFAULT_THUMBNAIL_RADIUS,
            prebuffer_radius: DEFAULT_PREBUFFER_RADIUS,
            prebuffer_bytes: DEFAULT_PREBUFFER_BYTES,
            upgrade_settle_delay: Duration::from_millis(350),
            loading_timeout: Duration::from_secs(20),
            progress_interval: Duration::from_millis(100),
            http_timeout: Duration::from_secs(30),
            event_capacity: 1024,
            max_concurrent_downloads: 2,
        }
    }
}

fn human_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Apply `VANTAGE_*` environment overrides on top of the current values.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok());
        self.validate()?;
        Ok(self)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring unparseable override; key={key}, value={raw}");
                    None
                }
            }
        }
        fn duration(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<Duration> {
            let raw = lookup(key)?;
            match humantime::parse_duration(raw.trim()) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("ignoring unparseable override; key={key}, err={e}");
                    None
                }
            }
        }

        if let Some(v) = parsed(&lookup, "VANTAGE_WINDOW_RADIUS") {
            self.window_radius = v;
        }
        if let Some(v) = parsed(&lookup, "VANTAGE_THUMBNAIL_RADIUS") {
            self.thumbnail_radius = v;
        }
        if let Some(v) = parsed(&lookup, "VANTAGE_PREBUFFER_RADIUS") {
            self.prebuffer_radius = v;
        }
        if let Some(v) = parsed(&lookup, "VANTAGE_PREBUFFER_BYTES") {
            self.prebuffer_bytes = v;
        }
        if let Some(v) = duration(&lookup, "VANTAGE_UPGRADE_SETTLE_DELAY") {
            self.upgrade_settle_delay = v;
        }
        if let Some(v) = duration(&lookup, "VANTAGE_LOADING_TIMEOUT") {
            self.loading_timeout = v;
        }
        if let Some(v) = duration(&lookup, "VANTAGE_PROGRESS_INTERVAL") {
            self.progress_interval = v;
        }
        if let Some(v) = duration(&lookup, "VANTAGE_HTTP_TIMEOUT") {
            self.http_timeout = v;
        }
        if let Some(v) = parsed(&lookup, "VANTAGE_MAX_CONCURRENT_DOWNLOADS") {
            self.max_concurrent_downloads = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_radius == 0 {
            return Err(EngineError::Config(
                "window_radius must be at least 1".into(),
            ));
        }
        if self.thumbnail_radius < self.window_radius {
            return Err(EngineError::Config(format!(
                "thumbnail_radius ({}) must not be smaller than window_radius ({})",
                self.thumbnail_radius, self.window_radius
            )));
        }
        if self.prebuffer_radius < self.window_radius {
            return Err(EngineError::Config(format!(
                "prebuffer_radius ({}) must not be smaller than window_radius ({})",
                self.prebuffer_radius, self.window_radius
            )));
        }
        if self.prebuffer_bytes == 0 {
            return Err(EngineError::Config(
                "prebuffer_bytes must be non-zero".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config(
                "event_capacity must be non-zero".into(),
            ));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(EngineError::Config(
                "max_concurrent_downloads must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
