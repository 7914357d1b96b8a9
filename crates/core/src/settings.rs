use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONSOLE_URL: &str = "http://localhost:8082";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_console_url")]
    pub console_url: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub logging: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            console_url: default_console_url(),
            request_timeout_secs: None,
            logging: LogSettings::default(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn health_url(&self) -> String {
        format!("{}/sql/health", self.service_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn query_url(&self) -> String {
        format!("{}/sql/query", self.service_url.trim_end_matches('/'))
    }
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_console_url() -> String {
    DEFAULT_CONSOLE_URL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write settings file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl FileSettingsStore {
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = default_settings_path()?;
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                settings: Settings::default(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                settings: Settings::default(),
            });
        }

        let settings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Log file used when the settings leave `logging.file` unset.
    #[must_use]
    pub fn default_log_path(&self) -> PathBuf {
        self.path
            .parent()
            .map_or_else(|| PathBuf::from("sqlab.log"), |dir| dir.join("sqlab.log"))
    }

    pub fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SettingsError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let rendered = toml::to_string_pretty(&self.settings)
            .map_err(|source| SettingsError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    let base_dir = if let Some(custom) = env::var_os("SQLAB_CONFIG_DIR") {
        PathBuf::from(custom)
    } else if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(SettingsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(SettingsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("sqlab").join("settings.toml"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{FileSettingsStore, Settings, SettingsError, DEFAULT_SERVICE_URL};

    #[test]
    fn missing_settings_file_loads_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileSettingsStore::load_from_path(temp_dir.path().join("settings.toml"))
            .expect("failed to load store");

        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(store.settings().service_url, DEFAULT_SERVICE_URL);
        assert_eq!(store.settings().request_timeout(), None);
        assert_eq!(
            store.default_log_path(),
            temp_dir.path().join("sqlab.log")
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "service_url = \"http://db.local:9000/\"\nrequest_timeout_secs = 5\n\n[logging]\nlevel = \"debug\"\n",
        )
        .expect("failed to write settings");

        let store = FileSettingsStore::load_from_path(&path).expect("failed to load store");
        let settings = store.settings();
        assert_eq!(settings.health_url(), "http://db.local:9000/sql/health");
        assert_eq!(settings.query_url(), "http://db.local:9000/sql/query");
        assert_eq!(settings.console_url, "http://localhost:8082");
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn unparseable_file_reports_path() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "service_url = [").expect("failed to write settings");

        let err = FileSettingsStore::load_from_path(&path).expect_err("parse should fail");
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn persist_then_reload_round_trips() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("nested").join("settings.toml");

        let mut store = FileSettingsStore::load_from_path(&path).expect("failed to load store");
        store.settings_mut().console_url = "http://localhost:9092".to_string();
        store.settings_mut().request_timeout_secs = Some(30);
        store.persist().expect("failed to persist store");

        let reloaded = FileSettingsStore::load_from_path(&path).expect("failed to reload");
        assert_eq!(reloaded.settings(), store.settings());
    }
}
