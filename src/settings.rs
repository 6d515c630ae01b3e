use anyhow::{ensure, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::detection::DetectionConfig;
use crate::geometry::{camera::DEFAULT_DISTANCE_TO_PLANE_M, CameraFrameContext};
use crate::stabilizer::StabilizerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub processing_interval_ms: u64,
    /// Interval stretch applied while the device is moving a lot
    pub high_motion_multiplier: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_interval_ms: 1000,
            high_motion_multiplier: 1.5,
        }
    }
}

impl PipelineConfig {
    pub fn interval(&self, high_motion: bool) -> Duration {
        let base = self.processing_interval_ms as f64;
        let ms = if high_motion {
            base * self.high_motion_multiplier
        } else {
            base
        };
        Duration::from_millis(ms.round().max(1.0) as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub fov_degrees: f64,
    pub default_distance_to_plane_m: f64,
    /// Assumed height of the device above the road, for tilt estimates
    pub device_height_m: f64,
    /// Per-device horizontal FOV, keyed by device model, supplied by the host
    pub device_fov_overrides: HashMap<String, f64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 67.0,
            default_distance_to_plane_m: DEFAULT_DISTANCE_TO_PLANE_M,
            device_height_m: 1.5,
            device_fov_overrides: HashMap::new(),
        }
    }
}

impl CameraConfig {
    pub fn fov_for_device(&self, device_model: Option<&str>) -> f64 {
        device_model
            .and_then(|model| self.device_fov_overrides.get(model))
            .copied()
            .unwrap_or(self.fov_degrees)
    }

    pub fn frame_context(
        &self,
        screen_width_px: u32,
        screen_height_px: u32,
        device_model: Option<&str>,
    ) -> crate::Result<CameraFrameContext> {
        Ok(CameraFrameContext::new(
            screen_width_px,
            screen_height_px,
            self.fov_for_device(device_model),
        )?
        .with_default_distance(self.default_distance_to_plane_m))
    }
}

/// Every tunable of the measurement core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementSettings {
    pub detection: DetectionConfig,
    pub stabilizer: StabilizerConfig,
    pub pipeline: PipelineConfig,
    pub camera: CameraConfig,
}

impl MeasurementSettings {
    pub fn validate(&self) -> Result<()> {
        self.detection.validate().context("detection settings")?;
        self.stabilizer.validate().context("stabilizer settings")?;
        ensure!(
            self.pipeline.processing_interval_ms > 0,
            "processing interval must be positive"
        );
        ensure!(
            self.pipeline.high_motion_multiplier >= 1.0,
            "high motion multiplier must not shorten the interval"
        );
        let fovs = std::iter::once(&self.camera.fov_degrees)
            .chain(self.camera.device_fov_overrides.values());
        for fov in fovs {
            ensure!(*fov > 0.0 && *fov < 180.0, "field of view {fov} outside (0, 180)");
        }
        ensure!(
            self.camera.default_distance_to_plane_m > 0.0 && self.camera.device_height_m > 0.0,
            "camera distances must be positive"
        );
        Ok(())
    }
}

/// JSON-backed settings, shared between the host and the controllers.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MeasurementSettings>,
}

impl SettingsStore {
    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<MeasurementSettings>(&contents)
                .map_err(anyhow::Error::from)
                .and_then(|s| s.validate().map(|_| s))
            {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring settings at {}: {err:#}", path.display());
                    MeasurementSettings::default()
                }
            }
        } else {
            MeasurementSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> MeasurementSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: MeasurementSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: MeasurementSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &MeasurementSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, MeasurementSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MeasurementSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), MeasurementSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.stabilizer.required_consecutive = 4;
        settings
            .camera
            .device_fov_overrides
            .insert("Pixel 8".into(), 77.0);
        store.update(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.get(), settings);
        assert_eq!(reopened.get().camera.fov_for_device(Some("Pixel 8")), 77.0);
        assert_eq!(reopened.get().camera.fov_for_device(Some("unknown")), 67.0);
    }

    #[test]
    fn invalid_update_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let mut settings = store.get();
        settings.pipeline.processing_interval_ms = 0;
        assert!(store.update(settings).is_err());
        assert_eq!(store.get().pipeline.processing_interval_ms, 1000);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get(), MeasurementSettings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"pipeline": {"processingIntervalMs": 500}}"#).unwrap();
        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.pipeline.processing_interval_ms, 500);
        assert_eq!(settings.pipeline.high_motion_multiplier, 1.5);
        assert_eq!(settings.detection, DetectionConfig::default());
    }

    #[test]
    fn high_motion_stretches_interval() {
        let config = PipelineConfig::default();
        assert_eq!(config.interval(false), Duration::from_millis(1000));
        assert_eq!(config.interval(true), Duration::from_millis(1500));
    }
}
