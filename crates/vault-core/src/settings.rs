//! Application settings management
//!
//! Stores non-sensitive preferences in a plain JSON file.
//! Settings are readable before the vault is unlocked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::generator::GeneratorOptions;
use crate::storage::write_atomic;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Idle time before the caller should re-prompt for the master password
    pub idle_timeout_minutes: u32,
    /// Defaults for generated passwords
    pub generator: GeneratorOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            idle_timeout_minutes: 5,
            generator: GeneratorOptions::default(),
        }
    }
}

impl Settings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.idle_timeout_minutes) * 60)
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings, falling back to defaults if the file is missing or unreadable
    pub fn new(settings_file: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_file).unwrap_or_else(|e| {
            debug!("Ignoring unreadable settings file: {}", e);
            Settings::default()
        });

        Self {
            settings_file,
            settings,
        }
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.settings)?;
        write_atomic(&self.settings_file, &contents).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        self.settings = settings;
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().join("settings.json"));

        let settings = manager.get();
        assert_eq!(settings.idle_timeout(), Duration::from_secs(300));
        assert_eq!(settings.generator.length, 16);
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        {
            let mut manager = SettingsManager::new(path.clone());
            manager.get_mut().idle_timeout_minutes = 15;
            manager.get_mut().generator.symbols = false;
            manager.save().await.unwrap();
        }

        let manager = SettingsManager::new(path);
        assert_eq!(manager.get().idle_timeout_minutes, 15);
        assert!(!manager.get().generator.symbols);
        assert!(manager.get().generator.uppercase);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"idleTimeoutMinutes": 1}"#).unwrap();

        let manager = SettingsManager::new(path);
        assert_eq!(manager.get().idle_timeout_minutes, 1);
        assert_eq!(manager.get().generator, GeneratorOptions::default());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{{{").unwrap();

        let manager = SettingsManager::new(path);
        assert_eq!(manager.get(), &Settings::default());
    }
}
