/// Player assets
///
/// The on-disk form of an `AudioPlayer`: a name, clip file paths (null for
/// an empty slot) and the player settings. Relative clip paths resolve
/// against the asset file's directory.
///
/// ```json
/// {
///   "name": "Footsteps",
///   "clips": ["step_01.wav", "step_02.wav", null],
///   "settings": { "volume": 0.8, "pitch": [0.9, 1.1], "singleton": true }
/// }
/// ```
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::player::AudioPlayer;
use super::settings::PlayerSettings;
use crate::clip::AudioClip;
use crate::error::{ClipError, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAsset {
    pub name: String,

    #[serde(default)]
    pub clips: Vec<Option<PathBuf>>,

    #[serde(default)]
    pub settings: PlayerSettings,
}

impl PlayerAsset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clips: Vec::new(),
            settings: PlayerSettings::default(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source,
        };

        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let asset: PlayerAsset = serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;

        tracing::info!(
            "Loaded audio player asset `{}` from {} ({} clip slots)",
            asset.name,
            path.display(),
            asset.clips.len()
        );
        Ok(asset)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))
    }

    /// Load every clip and build the player. Relative paths are joined onto
    /// `base_dir`.
    pub fn into_player(self, base_dir: &Path) -> Result<AudioPlayer, ClipError> {
        let clips = self
            .clips
            .iter()
            .map(|slot| match slot {
                Some(path) => {
                    let path = if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path.clone()
                    };
                    AudioClip::from_file(path).map(|clip| Some(Arc::new(clip)))
                }
                None => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AudioPlayer::new(self.name, self.settings, clips))
    }

    /// Build the player from a file, loading clips relative to it
    pub fn load_player<P: AsRef<Path>>(path: P) -> anyhow::Result<AudioPlayer> {
        let path = path.as_ref();
        let asset = Self::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(asset.into_player(base_dir)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("audoty-asset-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(path: &Path, samples: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..samples {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_minimal_asset_json() {
        let asset: PlayerAsset = serde_json::from_str(r#"{ "name": "ui" }"#).unwrap();
        assert_eq!(asset.name, "ui");
        assert!(asset.clips.is_empty());
        assert_eq!(asset.settings, PlayerSettings::default());
    }

    #[test]
    fn test_null_clip_slot() {
        let asset: PlayerAsset =
            serde_json::from_str(r#"{ "name": "ui", "clips": ["a.wav", null] }"#).unwrap();
        assert_eq!(asset.clips, vec![Some(PathBuf::from("a.wav")), None]);
    }

    #[test]
    fn test_load_player_resolves_relative_clips() {
        let dir = temp_dir("player");
        write_wav(&dir.join("click.wav"), 4_000);
        let asset = PlayerAsset {
            clips: vec![Some(PathBuf::from("click.wav")), None],
            ..PlayerAsset::new("ui")
        };
        let asset_path = dir.join("ui.json");
        asset.save(&asset_path).unwrap();

        let player = PlayerAsset::load_player(&asset_path).unwrap();

        assert_eq!(player.name(), "ui");
        assert_eq!(player.clip_names(), vec![Some("click"), None]);
        assert_eq!(player.find_index("click"), Some(0));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_clip_file_fails() {
        let dir = temp_dir("missing");
        let asset = PlayerAsset {
            clips: vec![Some(PathBuf::from("nope.wav"))],
            ..PlayerAsset::new("ui")
        };

        let err = asset.into_player(&dir).unwrap_err();
        assert!(matches!(err, ClipError::LoadFailed { .. }));
        let _ = fs::remove_dir_all(dir);
    }
}
