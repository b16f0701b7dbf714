/// Engine configuration
///
/// Process-wide settings for an `AudioContext`, stored as JSON next to the
/// other Audoty files in the platform config directory.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::MixerGroup;
use crate::backend::Position;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on simultaneous voices; `None` grows without limit
    pub max_voices: Option<usize>,

    /// Preference file; `None` uses `<config dir>/Audoty/prefs.json`
    pub prefs_path: Option<PathBuf>,

    /// Mixer groups registered with the context at startup
    pub mixer_groups: Vec<MixerGroup>,

    /// Listener position for 3D voices
    pub listener_position: Position,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_voices: Some(64),
            prefs_path: None,
            mixer_groups: Vec::new(),
            listener_position: [0.0, 0.0, 0.0],
        }
    }
}

impl EngineConfig {
    /// Load from `path`, writing a default file there if none exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            let config = EngineConfig::default();
            config.save(path)?;
            tracing::info!("Created default config at: {}", path.display());
            return Ok(config);
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source,
        };
        let content = fs::read_to_string(path).map_err(|e| load_failed(Box::new(e)))?;
        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| load_failed(Box::new(e)))?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Load from the platform default location
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Self::default_path()?)
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
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;

        Ok(())
    }

    /// `<config dir>/Audoty/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("Audoty").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_voices == Some(0) {
            return Err(ConfigError::Invalid("max_voices must be at least 1".to_string()));
        }
        if let Some(group) = self.mixer_groups.iter().find(|g| g.name.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "mixer group with volume {} has no name",
                group.volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("audoty-config-{}-{}", name, std::process::id()))
            .join("config.json")
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_voices, Some(64));
        assert!(config.prefs_path.is_none());
        assert!(config.mixer_groups.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_creates_default_file() {
        let path = temp_path("create");
        let _ = fs::remove_file(&path);

        let config = EngineConfig::load(&path).unwrap();

        assert_eq!(config, EngineConfig::default());
        assert!(path.exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("roundtrip");
        let config = EngineConfig {
            max_voices: None,
            mixer_groups: vec![MixerGroup {
                name: "sfx".to_string(),
                volume: 0.5,
            }],
            listener_position: [1.0, 2.0, 3.0],
            ..EngineConfig::default()
        };

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_zero_voices_is_invalid() {
        let config = EngineConfig {
            max_voices: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "max_voices": 8 }"#).unwrap();
        assert_eq!(config.max_voices, Some(8));
        assert_eq!(config.listener_position, [0.0, 0.0, 0.0]);
    }
}
