//! Configuration loading and management.

use crate::time::TimeNormalizer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-level config file, relative to the working directory.
pub const PROJECT_CONFIG: &str = ".memo-tracker/config.yaml";

/// Memo tracker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub time: TimeConfig,
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory attachment files are copied into.
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            attachments_dir: default_attachments_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".memo-tracker/memos.db")
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from(".memo-tracker/attachments")
}

/// Canonical civil zone settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Offset every stored timestamp is expressed in, e.g. `+08:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> String {
    "+08:00".to_string()
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `explicit` if given, otherwise from the project or user
    /// config file, falling back to defaults. Environment overrides apply last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            // An explicit path must exist and parse.
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from default locations or return defaults.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(PROJECT_CONFIG) {
            return config;
        }

        if let Some(user_config) = user_config_path()
            && let Ok(config) = Self::load(user_config)
        {
            return config;
        }

        Self::default()
    }

    /// Apply `MEMO_TRACKER_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("MEMO_TRACKER_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
        if let Some(dir) = lookup("MEMO_TRACKER_ATTACHMENTS_DIR") {
            self.server.attachments_dir = PathBuf::from(dir);
        }
        if let Some(offset) = lookup("MEMO_TRACKER_UTC_OFFSET") {
            self.time.utc_offset = offset;
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Normalizer for the configured canonical zone.
    pub fn time_normalizer(&self) -> Result<TimeNormalizer> {
        Ok(TimeNormalizer::from_offset_str(&self.time.utc_offset)?)
    }
}

/// `~/.memo-tracker/config.yaml`, when a home directory is known.
fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".memo-tracker").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_use_project_dir_and_utc8() {
        let config = Config::default();
        assert_eq!(config.server.db_path, PathBuf::from(".memo-tracker/memos.db"));
        assert_eq!(
            config.server.attachments_dir,
            PathBuf::from(".memo-tracker/attachments")
        );
        assert_eq!(
            config.time_normalizer().unwrap().zone(),
            FixedOffset::east_opt(8 * 3600).unwrap()
        );
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "time:\n  utc_offset: \"-05:00\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.time.utc_offset, "-05:00");
        assert_eq!(config.server.db_path, PathBuf::from(".memo-tracker/memos.db"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::resolve(Some(&dir.path().join("absent.yaml"))).is_err());
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let vars: HashMap<&str, &str> = [
            ("MEMO_TRACKER_DB_PATH", "/tmp/other.db"),
            ("MEMO_TRACKER_UTC_OFFSET", "Z"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(
            config.server.attachments_dir,
            PathBuf::from(".memo-tracker/attachments")
        );
        assert_eq!(config.time_normalizer().unwrap().zone().local_minus_utc(), 0);
    }

    #[test]
    fn bad_offset_is_rejected() {
        let mut config = Config::default();
        config.time.utc_offset = "somewhere".into();
        assert!(config.time_normalizer().is_err());
    }

    #[test]
    fn ensure_db_dir_creates_parent() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.server.db_path = dir.path().join("nested").join("memos.db");

        config.ensure_db_dir().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
