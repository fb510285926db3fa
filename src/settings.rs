use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::models::ClipLibrary;

/// Wire format of the inference service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ResponseProtocol {
    /// Multipart `frame` upload answered with `{label, confidence, audio}`
    /// (`/predict-frame`).
    Label,
    /// JSON `{frame: <base64 JPEG>, prevSequence}` answered with
    /// `{action, confidence, all_probabilities, sequence}` (`/api/predict`).
    /// The returned keypoint `sequence` is sent back on the next request.
    Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceSettings {
    pub base_url: String,
    pub predict_path: String,
    pub timeout_ms: u64,
    pub protocol: ResponseProtocol,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            predict_path: "/predict-frame".into(),
            timeout_ms: 10_000,
            protocol: ResponseProtocol::Label,
        }
    }
}

impl InferenceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    pub tick_interval_ms: u64,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            ideal_width: 640,
            ideal_height: 480,
            facing: FacingMode::User,
            jpeg_quality: 80,
        }
    }
}

impl CaptureSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackSettings {
    pub surface_width: u32,
    pub surface_height: u32,
    pub frame_rate: u32,
    pub clip_base_path: String,
    pub clip_extension: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        let library = ClipLibrary::default();
        Self {
            surface_width: 800,
            surface_height: 500,
            frame_rate: 60,
            clip_base_path: library.base_path,
            clip_extension: library.extension,
        }
    }
}

impl PlaybackSettings {
    pub fn library(&self) -> ClipLibrary {
        ClipLibrary::new(self.clip_base_path.clone(), self.clip_extension.clone())
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub enabled: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub inference: InferenceSettings,
    pub capture: CaptureSettings,
    pub playback: PlaybackSettings,
    pub sound: SoundSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MediaSettings>,
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
                MediaSettings::default()
            })
        } else {
            MediaSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> MediaSettings {
        self.read().clone()
    }

    pub fn sound(&self) -> SoundSettings {
        self.read().sound.clone()
    }

    pub fn update_sound(&self, settings: SoundSettings) -> Result<()> {
        let mut guard = self.write();
        guard.sound = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &MediaSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, MediaSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MediaSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let settings = store.snapshot();
        assert_eq!(settings.capture.tick_interval_ms, 1_000);
        assert_eq!(settings.capture.ideal_width, 640);
        assert_eq!(settings.inference.protocol, ResponseProtocol::Label);
        assert!(settings.sound.enabled);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"capture": {"tickIntervalMs": 200}, "inference": {"protocol": "action"}}"#,
        )
        .unwrap();

        let settings = SettingsStore::new(path).unwrap().snapshot();
        assert_eq!(settings.capture.tick_interval_ms, 200);
        assert_eq!(settings.capture.jpeg_quality, 80);
        assert_eq!(settings.inference.protocol, ResponseProtocol::Action);
        assert_eq!(settings.inference.predict_path, "/predict-frame");
    }

    #[test]
    fn sound_update_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.update_sound(SoundSettings { enabled: false }).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert!(!reopened.sound().enabled);
    }
}
