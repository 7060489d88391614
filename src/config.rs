//! Layered settings.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `IOTWATCH__SECTION__KEY` environment variables. Command-line flags are
//! applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "IOTWATCH";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: EndpointSettings,
    pub polling: PollingSettings,
    pub alerts: AlertSettings,
    pub history: HistorySettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub base_url: String,
    /// Per-request timeout; unset means wait for the backend indefinitely.
    pub timeout_ms: Option<u64>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: iotwatch_adapters::http::DEFAULT_ENDPOINT.to_string(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub stale_after_ms: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            stale_after_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: crate::data::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub credentials_path: PathBuf,
    pub session_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("users.json"),
            session_path: PathBuf::from("session.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, reading `path` if it exists.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.polling.interval_ms > 0, "polling.interval_ms must be positive");
        ensure!(self.history.capacity > 0, "history.capacity must be positive");
        ensure!(!self.endpoint.base_url.is_empty(), "endpoint.base_url is empty");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.alerts.stale_after_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.endpoint.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.stale_after(), Duration::from_secs(5));
        assert_eq!(settings.history.capacity, 500);
        assert_eq!(settings.storage.credentials_path, PathBuf::from("users.json"));
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[endpoint]
base_url = "http://10.0.0.5:8000"
timeout_ms = 2500

[polling]
interval_ms = 250

[history]
capacity = 60
"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.endpoint.base_url, "http://10.0.0.5:8000");
        assert_eq!(settings.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.history.capacity, 60);
        // Untouched sections keep their defaults.
        assert_eq!(settings.alerts.stale_after_ms, 5000);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[history]\ncapacity = 0").unwrap();

        assert!(Settings::load(file.path()).is_err());
    }
}
