/// Player parameters
///
/// Everything an asset configures about how its clips play. Serialized as
/// part of a player asset; missing fields take the defaults below.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether a parameter change reaches voices that are already playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveLinks {
    #[serde(rename = "loop")]
    pub looping: bool,
    pub volume: bool,
    pub distances: bool,
    pub pitch: bool,
    pub doppler_level: bool,
}

impl Default for LiveLinks {
    fn default() -> Self {
        Self {
            looping: true,
            volume: true,
            distances: true,
            pitch: true,
            doppler_level: true,
        }
    }
}

/// Which parameters are written to and read from the preference store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveFlags {
    #[serde(rename = "loop")]
    pub looping: bool,
    pub singleton: bool,
    pub volume: bool,
    pub distances: bool,
    pub pitch: bool,
    pub doppler_level: bool,
}

impl SaveFlags {
    pub fn all() -> Self {
        Self {
            looping: true,
            singleton: true,
            volume: true,
            distances: true,
            pitch: true,
            doppler_level: true,
        }
    }

    pub fn any(&self) -> bool {
        self.looping
            || self.singleton
            || self.volume
            || self.distances
            || self.pitch
            || self.doppler_level
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    #[serde(rename = "loop")]
    pub looping: bool,

    /// At most one audible voice per player
    pub singleton: bool,

    /// A singleton playing one clip may be cut off to play another
    pub allow_interrupt: bool,

    /// Target volume (0-1)
    pub volume: f32,

    /// 3D rolloff starts at `min_distance` and bottoms out at `max_distance`
    pub min_distance: f32,
    pub max_distance: f32,

    /// Pitch is drawn uniformly from `[pitch[0], pitch[1]]` per play
    pub pitch: [f32; 2],

    pub doppler_level: f32,

    /// Fade-in applied to every play, in seconds
    pub play_fade_time: f32,

    /// Fade-out used by `AudioHandle::stop` and singleton interruption, in seconds
    pub interrupt_fade_time: f32,

    /// Name of the mixer group voices route to when the context knows it
    pub mixer_group: Option<String>,

    pub live_link: LiveLinks,

    pub save: SaveFlags,

    /// Prefix for preference keys; 0 means not yet assigned
    pub save_key: i32,

    /// Write saved parameters to the store on every change
    pub persist_on_change: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            looping: false,
            singleton: false,
            allow_interrupt: true,
            volume: 1.0,
            min_distance: 1.0,
            max_distance: 500.0,
            pitch: [1.0, 1.0],
            doppler_level: 0.0,
            play_fade_time: 0.0,
            interrupt_fade_time: 0.2,
            mixer_group: None,
            live_link: LiveLinks::default(),
            save: SaveFlags::default(),
            save_key: 0,
            persist_on_change: false,
        }
    }
}

impl PlayerSettings {
    pub fn play_fade(&self) -> Duration {
        seconds(self.play_fade_time)
    }

    pub fn interrupt_fade(&self) -> Duration {
        seconds(self.interrupt_fade_time)
    }
}

/// Pitch at position `t` (0-1) inside `range`
pub(crate) fn pitch_in(range: [f32; 2], t: f32) -> f32 {
    let [low, high] = range;
    low + (high - low) * t
}

/// Seconds to `Duration`, treating negative or non-finite values as zero
pub(crate) fn seconds(secs: f32) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f32(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.min_distance, 1.0);
        assert_eq!(settings.max_distance, 500.0);
        assert_eq!(settings.pitch, [1.0, 1.0]);
        assert!(settings.allow_interrupt);
        assert!(settings.live_link.volume);
        assert!(!settings.save.any());
        assert_eq!(settings.interrupt_fade(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: PlayerSettings =
            serde_json::from_str(r#"{ "loop": true, "volume": 0.5, "live_link": { "volume": false } }"#)
                .unwrap();

        assert!(settings.looping);
        assert_eq!(settings.volume, 0.5);
        assert!(!settings.live_link.volume);
        assert!(settings.live_link.pitch);
        assert_eq!(settings.max_distance, 500.0);
    }

    #[test]
    fn test_pitch_in() {
        assert_eq!(pitch_in([0.5, 1.5], 0.0), 0.5);
        assert_eq!(pitch_in([0.5, 1.5], 0.5), 1.0);
        assert_eq!(pitch_in([0.5, 1.5], 1.0), 1.5);
    }

    #[test]
    fn test_bad_seconds_are_zero() {
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(seconds(f32::NAN), Duration::ZERO);
        assert_eq!(seconds(0.5), Duration::from_millis(500));
    }
}
