//! Application configuration. Paths, day boundary, retention, reminder time.

use crate::domain::{DayBoundary, DomainError};
use crate::usecases::exercise_repository::DEFAULT_RETENTION_DAYS;
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment prefix: REHAB_GUIDE_DATA_DIR, REHAB_GUIDE_DAY_BOUNDARY, ...
pub const ENV_PREFIX: &str = "REHAB_GUIDE";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_REMINDER_HOUR: u32 = 8;
pub const DEFAULT_REMINDER_MINUTE: u32 = 0;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Directory holding exercises.db. Read from REHAB_GUIDE_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Directory holding exercise videos. Defaults to `<data_dir>/media`.
    #[serde(default)]
    pub media_dir: Option<String>,

    /// `local` (default) or `utc`. Drives the daily reset and streak buckets.
    #[serde(default)]
    pub day_boundary: Option<DayBoundary>,

    /// Progress entries older than this many days are purged (default 30).
    #[serde(default)]
    pub progress_retention_days: Option<u32>,

    // ─────────────────────────────────────────────────────────────────────────
    // Daily reminder
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub reminders_enabled: Option<bool>,

    /// Hour of the daily reminder, 0-23 (default 8).
    #[serde(default)]
    pub reminder_hour: Option<u32>,

    #[serde(default)]
    pub reminder_minute: Option<u32>,

    /// Simulated player rate for the terminal front-end (default 1.0).
    #[serde(default)]
    pub playback_speed: Option<f64>,
}

impl AppConfig {
    /// Environment (REHAB_GUIDE_*) plus an optional file named by REHAB_GUIDE_CONFIG.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG")) {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        c.build()?.try_deserialize()
    }

    /// Parse a TOML document (used for config files and tests).
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    pub fn media_dir_or_default(&self) -> PathBuf {
        self.media_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("media"))
    }

    pub fn day_boundary_or_default(&self) -> DayBoundary {
        self.day_boundary.unwrap_or_default()
    }

    pub fn retention_days_or_default(&self) -> u32 {
        self.progress_retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)
    }

    pub fn reminders_enabled_or_default(&self) -> bool {
        self.reminders_enabled.unwrap_or(true)
    }

    /// Reminder wall-clock time. Defaults to 08:00; rejects out-of-range values.
    pub fn reminder_time(&self) -> Result<NaiveTime, DomainError> {
        let hour = self.reminder_hour.unwrap_or(DEFAULT_REMINDER_HOUR);
        let minute = self.reminder_minute.unwrap_or(DEFAULT_REMINDER_MINUTE);
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            DomainError::Config(format!("invalid reminder time {hour:02}:{minute:02}"))
        })
    }

    pub fn playback_speed_or_default(&self) -> f64 {
        self.playback_speed.filter(|s| *s > 0.0).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.data_dir_or_default(), PathBuf::from("./data"));
        assert_eq!(cfg.media_dir_or_default(), PathBuf::from("./data/media"));
        assert_eq!(cfg.day_boundary_or_default(), DayBoundary::Local);
        assert_eq!(cfg.retention_days_or_default(), 30);
        assert!(cfg.reminders_enabled_or_default());
        assert_eq!(
            cfg.reminder_time().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(cfg.playback_speed_or_default(), 1.0);
    }

    #[test]
    fn test_from_toml() {
        let cfg = AppConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/rehab"
            day_boundary = "utc"
            progress_retention_days = 14
            reminder_hour = 19
            reminder_minute = 30
            reminders_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.media_dir_or_default(), PathBuf::from("/var/lib/rehab/media"));
        assert_eq!(cfg.day_boundary_or_default(), DayBoundary::Utc);
        assert_eq!(cfg.retention_days_or_default(), 14);
        assert!(!cfg.reminders_enabled_or_default());
        assert_eq!(
            cfg.reminder_time().unwrap(),
            NaiveTime::from_hms_opt(19, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_reminder_time() {
        let cfg = AppConfig {
            reminder_hour: Some(24),
            ..AppConfig::default()
        };
        assert!(matches!(cfg.reminder_time(), Err(DomainError::Config(_))));
    }
}
