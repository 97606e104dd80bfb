use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{
    errors::{ReportError, ReportResult, StoreError},
    utils::paths::{ensure_dir, write_atomic, PathResolver},
};

const TTL_ENV: &str = "TXN_SUMMARY_TTL_SECONDS";
const TZ_ENV: &str = "TXN_SUMMARY_TZ";

pub const DEFAULT_TIMEZONE: &str = "Asia/Tehran";
pub const DEFAULT_SUMMARY_TTL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA zone every record is bucketed in, regardless of where it came from.
    pub timezone: String,
    /// Retention window of cached summary documents.
    pub summary_ttl_seconds: u64,
    pub transaction_collection: String,
    pub summary_collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.into(),
            summary_ttl_seconds: DEFAULT_SUMMARY_TTL_SECONDS,
            transaction_collection: "transaction".into(),
            summary_collection: "transaction_summary".into(),
        }
    }
}

impl Config {
    pub fn tz(&self) -> ReportResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ReportError::Validation(format!("unknown timezone `{}`", self.timezone))
        })
    }

    /// Applies `TXN_SUMMARY_TTL_SECONDS` / `TXN_SUMMARY_TZ` on top of the file values.
    pub fn with_env_overrides(mut self) -> ReportResult<Self> {
        if let Ok(raw) = env::var(TTL_ENV) {
            self.summary_ttl_seconds = raw.trim().parse().map_err(|_| {
                ReportError::Validation(format!("{TTL_ENV} must be a whole number of seconds"))
            })?;
        }
        if let Ok(zone) = env::var(TZ_ENV) {
            self.timezone = zone.trim().to_string();
        }
        self.tz()?;
        Ok(self)
    }
}

/// Loads and persists [`Config`] under the application home directory.
pub struct ConfigManager {
    base: PathBuf,
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> ReportResult<Self> {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> ReportResult<Self> {
        ensure_dir(&base).map_err(StoreError::from)?;
        Ok(Self {
            path: PathResolver::config_file_in(&base),
            base,
        })
    }

    pub fn load(&self) -> ReportResult<Config> {
        let config = if self.path.exists() {
            let data = fs::read_to_string(&self.path).map_err(StoreError::from)?;
            serde_json::from_str(&data).map_err(StoreError::from)?
        } else {
            Config::default()
        };
        config.with_env_overrides()
    }

    pub fn save(&self, config: &Config) -> ReportResult<()> {
        let json = serde_json::to_string_pretty(config).map_err(StoreError::from)?;
        write_atomic(&self.path, &json).map_err(StoreError::from)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the document store collections.
    pub fn data_dir(&self) -> PathBuf {
        PathResolver::data_dir_in(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config.summary_collection, "transaction_summary");
        assert_eq!(config.tz().unwrap(), chrono_tz::Asia::Tehran);
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();
        let config = Config {
            summary_ttl_seconds: 3_600,
            ..Config::default()
        };
        manager.save(&config).unwrap();
        assert!(manager.path().exists());
        let raw = fs::read_to_string(manager.path()).unwrap();
        let stored: Config = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.summary_ttl_seconds, 3_600);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"summary_ttl_seconds": 60}"#).unwrap();
        assert_eq!(parsed.summary_ttl_seconds, 60);
        assert_eq!(parsed.timezone, DEFAULT_TIMEZONE);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let config = Config {
            timezone: "Mars/Olympus".into(),
            ..Config::default()
        };
        assert!(matches!(config.tz(), Err(ReportError::Validation(_))));
    }
}
