use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{KharchaError, Result};
use crate::models::DEFAULT_CATEGORY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_sync_batch_size")]
    pub sync_batch_size: usize,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_dedup_ttl_secs() -> u64 {
    crate::dedup::DEFAULT_TTL.as_secs()
}

fn default_dedup_capacity() -> usize {
    crate::dedup::DEFAULT_CAPACITY
}

fn default_sync_batch_size() -> usize {
    crate::sync::DEFAULT_BATCH_SIZE
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            dedup_capacity: default_dedup_capacity(),
            sync_batch_size: default_sync_batch_size(),
            default_category: default_category(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("kharcha")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("kharcha")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| KharchaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let home = tempfile::tempdir().unwrap();
        let previous = std::env::var_os("HOME");
        std::env::set_var("HOME", home.path());

        assert_eq!(load_settings().sync_batch_size, 500);
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            dedup_ttl_secs: 30,
            sync_batch_size: 50,
            default_category: "transfers".to_string(),
            ..Settings::default()
        };
        save_settings(&settings).unwrap();
        let written = home.path().join(".config").join("kharcha").join("settings.json");
        assert!(written.exists());
        let loaded = load_settings();

        match previous {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.dedup_ttl(), Duration::from_secs(30));
        assert_eq!(loaded.sync_batch_size, 50);
        assert_eq!(loaded.default_category, "transfers");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.dedup_ttl_secs, 120);
        assert_eq!(s.dedup_capacity, 400);
        assert_eq!(s.sync_batch_size, 500);
        assert_eq!(s.default_category, "other");
        assert_eq!(s.log_level, "info");
        assert!(s.data_dir.ends_with("kharcha"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "log_level": "debug"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.dedup_capacity, 400);
        assert_eq!(s.db_path(), PathBuf::from("/tmp/test").join(DB_FILE));
    }

    #[test]
    fn test_shellexpand_home() {
        let expanded = shellexpand_path("~/books");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("books"));
    }
}
