use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregator::UndatedOrder;
use crate::utils;

pub const DEFAULT_HA_URL: &str = "http://homeassistant.local:8123";
pub const DEFAULT_CALENDAR_ENTITY: &str = "calendar.local_calendar";
const DEFAULT_FALLBACK_MINUTES: i64 = 120;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Everything the pipeline needs from its surroundings, resolved once at
/// startup and handed to the pieces that use it.
///
/// Layers, lowest first: built-in defaults, the JSON config file, then the
/// environment (`HA_URL`, `HA_TOKEN`, `HA_CALENDAR_ENTITY`, `DB_PATH`,
/// `LOG_FILE`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ha_url: String,
    pub ha_token: Option<String>,
    pub ha_calendar_entity: String,
    pub ledger_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub undated_order: UndatedOrder,
    /// Event length the calendar sink assumes when a source gives no end.
    pub fallback_duration_minutes: i64,
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ha_url: DEFAULT_HA_URL.to_string(),
            ha_token: None,
            ha_calendar_entity: DEFAULT_CALENDAR_ENTITY.to_string(),
            ledger_path: utils::default_ledger_path(),
            log_file: None,
            undated_order: UndatedOrder::default(),
            fallback_duration_minutes: DEFAULT_FALLBACK_MINUTES,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Reads the config file and overlays the process environment. An
    /// explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => read_config(path)?,
            None => {
                let default_path = utils::default_config_path();
                if default_path.exists() {
                    read_config(&default_path)?
                } else {
                    AppConfig::default()
                }
            }
        };
        Ok(config.apply_env(|key| std::env::var(key).ok()))
    }

    /// Overlays values from `lookup`. Blank values are ignored so an empty
    /// `HA_TOKEN=` does not count as a credential.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get("HA_URL") {
            self.ha_url = url;
        }
        if let Some(token) = get("HA_TOKEN") {
            self.ha_token = Some(token);
        }
        if let Some(entity) = get("HA_CALENDAR_ENTITY") {
            self.ha_calendar_entity = entity;
        }
        if let Some(path) = get("DB_PATH") {
            self.ledger_path = PathBuf::from(path);
        }
        if let Some(path) = get("LOG_FILE") {
            self.log_file = Some(PathBuf::from(path));
        }
        self
    }

    pub fn fallback_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.fallback_duration_minutes.max(0))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.ha_url, DEFAULT_HA_URL);
        assert_eq!(config.ha_calendar_entity, DEFAULT_CALENDAR_ENTITY);
        assert_eq!(config.ha_token, None);
        assert_eq!(config.undated_order, UndatedOrder::First);
        assert_eq!(config.fallback_duration(), chrono::Duration::hours(2));
        assert!(config.ledger_path.ends_with("events.db"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"ha_url": "http://ha.lan:8123", "undated_order": "last", "fallback_duration_minutes": 90}"#,
        )
        .expect("write config");

        let config = read_config(&path).expect("read config");
        assert_eq!(config.ha_url, "http://ha.lan:8123");
        assert_eq!(config.undated_order, UndatedOrder::Last);
        assert_eq!(config.fallback_duration(), chrono::Duration::minutes(90));
        assert_eq!(config.ha_calendar_entity, DEFAULT_CALENDAR_ENTITY);
    }

    #[test]
    fn environment_overrides_file_and_ignores_blanks() {
        let vars = env(&[
            ("HA_TOKEN", "secret"),
            ("HA_URL", "   "),
            ("DB_PATH", "/tmp/ledger.db"),
            ("HA_CALENDAR_ENTITY", "calendar.parties"),
        ]);
        let config = AppConfig::default().apply_env(|key| vars.get(key).cloned());

        assert_eq!(config.ha_token.as_deref(), Some("secret"));
        assert_eq!(config.ha_url, DEFAULT_HA_URL);
        assert_eq!(config.ledger_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.ha_calendar_entity, "calendar.parties");
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.json");
        let err = AppConfig::load(Some(missing.as_path())).expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write config");
        assert!(matches!(read_config(&path), Err(ConfigError::Parse { .. })));
    }
}
