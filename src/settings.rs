//! Persisted defaults for the operation windows.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::loader::DEFAULT_FREQUENCY_AXIS;

/// Values pre-filled into the operation windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Duplicate-collapse threshold of the merge window, kHz.
    pub merge_threshold_khz: f64,
    /// Threshold of the proximity filter window, kHz.
    pub proximity_threshold_khz: f64,
    /// Resampling step of the peak pick window, MHz.
    pub peak_resolution_mhz: f64,
    pub peak_intensity_min: f64,
    pub peak_intensity_max: f64,
    /// Column used as frequency axis when a loaded file has one by this name.
    pub frequency_axis: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            merge_threshold_khz: 10.0,
            proximity_threshold_khz: 100.0,
            peak_resolution_mhz: 0.01,
            peak_intensity_min: 0.0,
            peak_intensity_max: 1.0e6,
            frequency_axis: DEFAULT_FREQUENCY_AXIS.to_string(),
        }
    }
}

impl AppSettings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rusty-peaks").join("settings.json"))
    }

    /// Load from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            log::warn!("Could not determine config directory");
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    log::info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings: {}", e);
                    Self::default()
                }
            },
            // No file yet.
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            log::warn!("Could not determine config directory, settings not saved");
            return;
        };
        if let Err(e) = self.save_to(&path) {
            log::warn!("Failed to save settings: {e:#}");
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing settings")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            merge_threshold_khz: 25.0,
            frequency_axis: "nu".into(),
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn missing_fields_and_garbage_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{"peak_resolution_mhz": 0.5}"#).unwrap();
        let loaded = AppSettings::load_from(&partial);
        assert_eq!(loaded.peak_resolution_mhz, 0.5);
        assert_eq!(loaded.frequency_axis, DEFAULT_FREQUENCY_AXIS);

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").unwrap();
        assert_eq!(AppSettings::load_from(&garbage), AppSettings::default());
        assert_eq!(
            AppSettings::load_from(&dir.path().join("absent.json")),
            AppSettings::default()
        );
    }
}
