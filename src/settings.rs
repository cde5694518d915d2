use anyhow::{Context, Result};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::config::AppConfig;

/// JSON-backed store for the app configuration.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                AppConfig::default()
            })
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored config with environment overrides applied on top.
    pub fn config(&self) -> AppConfig {
        let mut config = match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        config.apply_env_overrides();
        config
    }

    pub fn update(&self, config: AppConfig) -> Result<()> {
        config.validate().context("Refusing to store invalid settings")?;

        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: AppConfig = serde_json::from_str(&contents)?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &AppConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.config().content.max_results, 12);
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut config = AppConfig::default();
        config.content.max_results = 20;
        config.stabilizer.gradual_streak = 4;
        store.update(config).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        let loaded = reopened.config();
        assert_eq!(loaded.content.max_results, 20);
        assert_eq!(loaded.stabilizer.gradual_streak, 4);
    }

    #[test]
    fn test_update_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let mut config = AppConfig::default();
        config.detection.tick_interval_ms = 0;
        assert!(store.update(config).is_err());
        assert_eq!(store.config().detection.tick_interval_ms, 500);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.config().detection.input_size, 416);
        assert!(store.reload().is_err());
    }
}
