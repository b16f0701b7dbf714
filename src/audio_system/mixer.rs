/// Mixer groups
///
/// Named buses with their own gain. Players only route to groups registered
/// here; an unknown group name plays on the master output.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerGroup {
    pub name: String,
    #[serde(default = "default_group_volume")]
    pub volume: f32,
}

fn default_group_volume() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default)]
pub struct MixerGroups {
    groups: BTreeMap<String, f32>,
}

impl MixerGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a group. Returns the clamped volume stored.
    pub fn register(&mut self, name: &str, volume: f32) -> f32 {
        let volume = volume.clamp(0.0, 1.0);
        self.groups.insert(name.to_string(), volume);
        volume
    }

    /// Change an existing group's volume. `None` if the group is unknown.
    pub fn set_volume(&mut self, name: &str, volume: f32) -> Option<f32> {
        let slot = self.groups.get_mut(name)?;
        *slot = volume.clamp(0.0, 1.0);
        Some(*slot)
    }

    pub fn volume(&self, name: &str) -> Option<f32> {
        self.groups.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// The group a player asking for `name` actually routes to
    pub fn resolve<'a>(&self, name: Option<&'a str>) -> Option<&'a str> {
        name.filter(|n| self.contains(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.groups.iter().map(|(name, volume)| (name.as_str(), *volume))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_clamps() {
        let mut groups = MixerGroups::new();
        assert_eq!(groups.register("sfx", 1.5), 1.0);
        assert_eq!(groups.volume("sfx"), Some(1.0));
    }

    #[test]
    fn test_set_volume_unknown_group() {
        let mut groups = MixerGroups::new();
        assert_eq!(groups.set_volume("music", 0.5), None);
        groups.register("music", 1.0);
        assert_eq!(groups.set_volume("music", 0.5), Some(0.5));
    }

    #[test]
    fn test_resolve_only_registered() {
        let mut groups = MixerGroups::new();
        groups.register("sfx", 1.0);
        assert_eq!(groups.resolve(Some("sfx")), Some("sfx"));
        assert_eq!(groups.resolve(Some("ui")), None);
        assert_eq!(groups.resolve(None), None);
    }

    #[test]
    fn test_group_json_default_volume() {
        let group: MixerGroup = serde_json::from_str(r#"{ "name": "sfx" }"#).unwrap();
        assert_eq!(group.volume, 1.0);
    }
}
