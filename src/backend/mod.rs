/// Voice backends
///
/// The engine never touches an audio device directly. Everything it needs
/// from one is expressed by [`VoiceBackend`]:
///
/// ```text
/// VoicePool ──allocate/rebind──> VoiceBackend ──> DeviceBackend (rodio)
///     │                             ▲         └─> RecordingBackend (headless)
///     └── AudioPlayer ──set_*/play──┘
/// ```
///
/// All calls happen on the thread driving `AudioContext::update`.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clip::AudioClip;
use crate::error::BackendError;

pub mod device;
pub mod recording;

pub use device::DeviceBackend;
pub use recording::{BackendCall, Playback, RecordingBackend, VoiceState};

/// World-space position, same layout rodio uses for emitters and ears
pub type Position = [f32; 3];

/// Opaque reference to a physical voice owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceRef(pub u64);

impl fmt::Display for VoiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// A playable-voice provider.
///
/// `spatial` is `None` for 2D playback and the emitter position otherwise.
/// Setters on unknown voices are ignored; only allocation and playback
/// report errors.
pub trait VoiceBackend {
    /// Create a new voice bound to `clip`
    fn allocate(
        &mut self,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<VoiceRef, BackendError>;

    /// Reset a previously used voice and bind it to `clip`.
    ///
    /// After this call the voice carries no state from its previous use.
    fn rebind(
        &mut self,
        voice: VoiceRef,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<(), BackendError>;

    fn set_volume(&mut self, voice: VoiceRef, volume: f32);

    fn set_pitch(&mut self, voice: VoiceRef, pitch: f32);

    fn set_distances(&mut self, voice: VoiceRef, min_distance: f32, max_distance: f32);

    fn set_doppler_level(&mut self, voice: VoiceRef, level: f32);

    fn set_loop(&mut self, voice: VoiceRef, looping: bool);

    fn set_mixer_group(&mut self, voice: VoiceRef, group: Option<&str>);

    fn set_position(&mut self, voice: VoiceRef, position: Position);

    fn play(&mut self, voice: VoiceRef) -> Result<(), BackendError>;

    /// Start playback after `delay`; `stop` before then cancels the start
    fn play_delayed(&mut self, voice: VoiceRef, delay: Duration) -> Result<(), BackendError>;

    fn stop(&mut self, voice: VoiceRef);

    /// Whether the voice is scheduled or still producing audio
    fn is_alive(&self, voice: VoiceRef) -> bool;

    /// Destroy the voice; the reference is dead afterwards
    fn release(&mut self, voice: VoiceRef);

    /// Gain applied to every voice routed to `group`
    fn set_group_volume(&mut self, _group: &str, _volume: f32) {}

    /// Called once per `AudioContext::update` with the elapsed time
    fn update(&mut self, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_ref_display() {
        assert_eq!(VoiceRef(3).to_string(), "voice#3");
    }
}
