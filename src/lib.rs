/// Audoty: audio-player assets and voice pooling
///
/// An [`AudioPlayer`](audio_system::AudioPlayer) is a configured set of clips;
/// playing it returns an [`AudioHandle`](audio_system::AudioHandle) that can be
/// queried and stopped. Voices come from a recycling pool inside an
/// [`AudioContext`](audio_system::AudioContext), which talks to the audio
/// device through a [`VoiceBackend`](backend::VoiceBackend).
pub mod audio_system;
pub mod backend;
pub mod clip;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod messaging;
pub mod persistence;

pub use audio_system::{
    AudioContext, AudioHandle, AudioPlayer, ClipSelector, PlayOptions, PlayerAsset, PlayerSettings,
    TrackedTransform,
};
pub use backend::{DeviceBackend, RecordingBackend, VoiceBackend};
pub use clip::AudioClip;
pub use config::EngineConfig;
pub use error::{PlayerError, SaveKeyConflict};
