/// Preference stores
///
/// `MemoryPrefs` lives for the process; `JsonPrefs` mirrors itself into a JSON
/// file on `flush`.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Key-value store used for persisted player parameters
pub trait PreferenceStore {
    fn get_int(&self, key: &str, default: i32) -> i32;

    fn get_float(&self, key: &str, default: f32) -> f32;

    fn set_int(&mut self, key: &str, value: i32);

    fn set_float(&mut self, key: &str, value: f32);

    /// Write pending changes to durable storage
    fn flush(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Stored values, kept in separate tables like the int/float getters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PrefTables {
    #[serde(default)]
    ints: BTreeMap<String, i32>,
    #[serde(default)]
    floats: BTreeMap<String, f32>,
}

/// In-memory preference store
#[derive(Debug, Clone, Default)]
pub struct MemoryPrefs {
    tables: PrefTables,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.ints.len() + self.tables.floats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStore for MemoryPrefs {
    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.tables.ints.get(key).copied().unwrap_or(default)
    }

    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.tables.floats.get(key).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: &str, value: i32) {
        self.tables.ints.insert(key.to_string(), value);
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.tables.floats.insert(key.to_string(), value);
    }
}

/// Preference store backed by a JSON file
#[derive(Debug)]
pub struct JsonPrefs {
    path: PathBuf,
    tables: PrefTables,
    dirty: bool,
}

impl JsonPrefs {
    /// Open the store at `path`; a missing file starts empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            tracing::debug!("No preferences at {}, starting fresh", path.display());
            return Ok(Self {
                path,
                tables: PrefTables::default(),
                dirty: false,
            });
        }

        let load_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::LoadFailed {
                path: path.display().to_string(),
                source,
            }
        };
        let json = std::fs::read_to_string(&path).map_err(|e| load_failed(Box::new(e)))?;
        let tables: PrefTables = serde_json::from_str(&json).map_err(|e| load_failed(Box::new(e)))?;

        tracing::debug!(
            "Loaded {} preferences from {}",
            tables.ints.len() + tables.floats.len(),
            path.display()
        );
        Ok(Self {
            path,
            tables,
            dirty: false,
        })
    }

    /// Platform default location (`<config dir>/Audoty/prefs.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Audoty").join("prefs.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPrefs {
    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.tables.ints.get(key).copied().unwrap_or(default)
    }

    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.tables.floats.get(key).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: &str, value: i32) {
        if self.tables.ints.insert(key.to_string(), value) != Some(value) {
            self.dirty = true;
        }
    }

    fn set_float(&mut self, key: &str, value: f32) {
        if self.tables.floats.insert(key.to_string(), value) != Some(value) {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| {
                ConfigError::DirectoryCreationFailed {
                    path: parent.display().to_string(),
                    source,
                }
            })?;
        }

        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::SaveFailed {
                path: self.path.display().to_string(),
                source,
            }
        };
        let json = serde_json::to_string_pretty(&self.tables).map_err(|e| save_failed(Box::new(e)))?;
        std::fs::write(&self.path, json).map_err(|e| save_failed(Box::new(e)))?;

        self.dirty = false;
        tracing::debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_prefs_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("audoty_prefs_tests")
            .join(format!("{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_memory_defaults() {
        let prefs = MemoryPrefs::new();
        assert_eq!(prefs.get_int("42_loop", 1), 1);
        assert_eq!(prefs.get_float("42_volume", 0.5), 0.5);
        assert!(prefs.is_empty());
    }

    #[test]
    fn test_memory_set_get() {
        let mut prefs = MemoryPrefs::new();
        prefs.set_int("42_loop", 0);
        prefs.set_float("42_volume", 0.25);

        assert_eq!(prefs.get_int("42_loop", 1), 0);
        assert_eq!(prefs.get_float("42_volume", 1.0), 0.25);
        assert_eq!(prefs.len(), 2);
    }

    #[test]
    fn test_int_and_float_tables_are_separate() {
        let mut prefs = MemoryPrefs::new();
        prefs.set_int("7_x", 3);
        assert_eq!(prefs.get_float("7_x", 9.0), 9.0);
    }

    #[test]
    fn test_json_missing_file_starts_empty() {
        let prefs = JsonPrefs::open(temp_prefs_path("missing")).unwrap();
        assert_eq!(prefs.get_float("1_volume", 0.7), 0.7);
    }

    #[test]
    fn test_json_flush_and_reopen() {
        let path = temp_prefs_path("reopen");
        let _ = std::fs::remove_file(&path);

        let mut prefs = JsonPrefs::open(&path).unwrap();
        prefs.set_int("9_singleton", 1);
        prefs.set_float("9_pitchX", 0.8);
        prefs.flush().unwrap();

        let reopened = JsonPrefs::open(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(reopened.get_int("9_singleton", 0), 1);
        assert_eq!(reopened.get_float("9_pitchX", 1.0), 0.8);
    }

    #[test]
    fn test_json_corrupt_file_fails() {
        let path = temp_prefs_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonPrefs::open(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::LoadFailed { .. })));
    }

    #[test]
    fn test_default_path() {
        if let Some(path) = JsonPrefs::default_path() {
            assert!(path.to_string_lossy().contains("Audoty"));
            assert!(path.to_string_lossy().ends_with("prefs.json"));
        }
    }
}
