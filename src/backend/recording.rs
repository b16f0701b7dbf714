/// Headless voice backend
///
/// Keeps the full parameter state of every voice and a log of every call,
/// without touching an audio device. Delayed starts are resolved against the
/// time passed to `update`, so "did this voice ever become audible" is
/// observable.
use std::sync::Arc;
use std::time::Duration;

use super::{Position, VoiceBackend, VoiceRef};
use crate::clip::AudioClip;
use crate::error::BackendError;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Allocate { voice: VoiceRef, clip: String },
    Rebind { voice: VoiceRef, clip: String },
    SetVolume { voice: VoiceRef, volume: f32 },
    SetPitch { voice: VoiceRef, pitch: f32 },
    SetDistances { voice: VoiceRef, min: f32, max: f32 },
    SetDopplerLevel { voice: VoiceRef, level: f32 },
    SetLoop { voice: VoiceRef, looping: bool },
    SetMixerGroup { voice: VoiceRef, group: Option<String> },
    SetPosition { voice: VoiceRef, position: Position },
    Play { voice: VoiceRef },
    PlayDelayed { voice: VoiceRef, delay: Duration },
    Stop { voice: VoiceRef },
    Release { voice: VoiceRef },
    SetGroupVolume { group: String, volume: f32 },
}

/// Playback state of a recorded voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    #[default]
    Idle,
    Scheduled { remaining: Duration },
    Playing,
    Stopped,
}

/// Everything the backend was told about one voice
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceState {
    pub clip: String,
    pub spatial: bool,
    pub position: Option<Position>,
    pub volume: f32,
    pub pitch: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub doppler_level: f32,
    pub looping: bool,
    pub mixer_group: Option<String>,
    pub playback: Playback,
    pub released: bool,
}

impl VoiceState {
    fn bound_to(clip: &AudioClip, spatial: Option<Position>) -> Self {
        Self {
            clip: clip.name().to_string(),
            spatial: spatial.is_some(),
            position: spatial,
            volume: 1.0,
            pitch: 1.0,
            ..Self::default()
        }
    }
}

/// In-memory backend recording every call
#[derive(Debug, Default)]
pub struct RecordingBackend {
    voices: Vec<VoiceState>,
    calls: Vec<BackendCall>,
    audible_starts: usize,
    failing_starts: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice(&self, voice: VoiceRef) -> Option<&VoiceState> {
        self.voices.get(voice.0 as usize)
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Physical voices ever allocated (reuse does not count)
    pub fn allocated(&self) -> usize {
        self.voices.len()
    }

    /// Times a voice actually started producing sound
    pub fn audible_starts(&self) -> usize {
        self.audible_starts
    }

    /// Voices currently producing sound
    pub fn playing(&self) -> impl Iterator<Item = (VoiceRef, &VoiceState)> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.playback == Playback::Playing)
            .map(|(i, v)| (VoiceRef(i as u64), v))
    }

    /// Make the next `count` play requests fail as if the clip could not be
    /// decoded
    pub fn fail_next_starts(&mut self, count: usize) {
        self.failing_starts = count;
    }

    fn check_start(&mut self, voice: VoiceRef) -> Result<(), BackendError> {
        if self.failing_starts == 0 {
            return Ok(());
        }
        self.failing_starts -= 1;
        let clip = self.voice(voice).map(|v| v.clip.clone()).unwrap_or_default();
        Err(BackendError::DecodeFailed {
            clip,
            source: "unsupported format".into(),
        })
    }

    fn state_mut(&mut self, voice: VoiceRef) -> Option<&mut VoiceState> {
        self.voices
            .get_mut(voice.0 as usize)
            .filter(|v| !v.released)
    }
}

impl VoiceBackend for RecordingBackend {
    fn allocate(
        &mut self,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<VoiceRef, BackendError> {
        let voice = VoiceRef(self.voices.len() as u64);
        self.voices.push(VoiceState::bound_to(clip, spatial));
        self.calls.push(BackendCall::Allocate {
            voice,
            clip: clip.name().to_string(),
        });
        Ok(voice)
    }

    fn rebind(
        &mut self,
        voice: VoiceRef,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<(), BackendError> {
        let state = self
            .state_mut(voice)
            .ok_or(BackendError::UnknownVoice(voice.0))?;
        *state = VoiceState::bound_to(clip, spatial);
        self.calls.push(BackendCall::Rebind {
            voice,
            clip: clip.name().to_string(),
        });
        Ok(())
    }

    fn set_volume(&mut self, voice: VoiceRef, volume: f32) {
        if let Some(state) = self.state_mut(voice) {
            state.volume = volume;
        }
        self.calls.push(BackendCall::SetVolume { voice, volume });
    }

    fn set_pitch(&mut self, voice: VoiceRef, pitch: f32) {
        if let Some(state) = self.state_mut(voice) {
            state.pitch = pitch;
        }
        self.calls.push(BackendCall::SetPitch { voice, pitch });
    }

    fn set_distances(&mut self, voice: VoiceRef, min_distance: f32, max_distance: f32) {
        if let Some(state) = self.state_mut(voice) {
            state.min_distance = min_distance;
            state.max_distance = max_distance;
        }
        self.calls.push(BackendCall::SetDistances {
            voice,
            min: min_distance,
            max: max_distance,
        });
    }

    fn set_doppler_level(&mut self, voice: VoiceRef, level: f32) {
        if let Some(state) = self.state_mut(voice) {
            state.doppler_level = level;
        }
        self.calls.push(BackendCall::SetDopplerLevel { voice, level });
    }

    fn set_loop(&mut self, voice: VoiceRef, looping: bool) {
        if let Some(state) = self.state_mut(voice) {
            state.looping = looping;
        }
        self.calls.push(BackendCall::SetLoop { voice, looping });
    }

    fn set_mixer_group(&mut self, voice: VoiceRef, group: Option<&str>) {
        let group = group.map(str::to_string);
        if let Some(state) = self.state_mut(voice) {
            state.mixer_group = group.clone();
        }
        self.calls.push(BackendCall::SetMixerGroup { voice, group });
    }

    fn set_position(&mut self, voice: VoiceRef, position: Position) {
        if let Some(state) = self.state_mut(voice) {
            state.position = Some(position);
        }
        self.calls.push(BackendCall::SetPosition { voice, position });
    }

    fn play(&mut self, voice: VoiceRef) -> Result<(), BackendError> {
        self.check_start(voice)?;
        let state = self
            .state_mut(voice)
            .ok_or(BackendError::UnknownVoice(voice.0))?;
        state.playback = Playback::Playing;
        self.audible_starts += 1;
        self.calls.push(BackendCall::Play { voice });
        Ok(())
    }

    fn play_delayed(&mut self, voice: VoiceRef, delay: Duration) -> Result<(), BackendError> {
        self.check_start(voice)?;
        let state = self
            .state_mut(voice)
            .ok_or(BackendError::UnknownVoice(voice.0))?;
        state.playback = Playback::Scheduled { remaining: delay };
        self.calls.push(BackendCall::PlayDelayed { voice, delay });
        Ok(())
    }

    fn stop(&mut self, voice: VoiceRef) {
        if let Some(state) = self.state_mut(voice) {
            state.playback = Playback::Stopped;
        }
        self.calls.push(BackendCall::Stop { voice });
    }

    fn is_alive(&self, voice: VoiceRef) -> bool {
        self.voice(voice).is_some_and(|v| {
            !v.released && matches!(v.playback, Playback::Playing | Playback::Scheduled { .. })
        })
    }

    fn release(&mut self, voice: VoiceRef) {
        if let Some(state) = self.state_mut(voice) {
            state.playback = Playback::Stopped;
            state.released = true;
        }
        self.calls.push(BackendCall::Release { voice });
    }

    fn set_group_volume(&mut self, group: &str, volume: f32) {
        self.calls.push(BackendCall::SetGroupVolume {
            group: group.to_string(),
            volume,
        });
    }

    fn update(&mut self, elapsed: Duration) {
        for state in self.voices.iter_mut() {
            if let Playback::Scheduled { remaining } = state.playback {
                if remaining <= elapsed {
                    state.playback = Playback::Playing;
                    self.audible_starts += 1;
                } else {
                    state.playback = Playback::Scheduled {
                        remaining: remaining - elapsed,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> Arc<AudioClip> {
        Arc::new(AudioClip::silent(name, Duration::from_secs(1)))
    }

    #[test]
    fn test_allocate_records_call() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), None).unwrap();

        assert_eq!(backend.allocated(), 1);
        assert_eq!(backend.voice(voice).unwrap().clip, "a");
        assert!(!backend.voice(voice).unwrap().spatial);
        assert_eq!(
            backend.calls(),
            &[BackendCall::Allocate {
                voice,
                clip: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_delayed_start_becomes_audible() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), Some([1.0, 0.0, 0.0])).unwrap();
        backend.play_delayed(voice, Duration::from_millis(100)).unwrap();

        assert!(backend.is_alive(voice));
        assert_eq!(backend.audible_starts(), 0);

        backend.update(Duration::from_millis(50));
        assert_eq!(backend.audible_starts(), 0);

        backend.update(Duration::from_millis(50));
        assert_eq!(backend.audible_starts(), 1);
        assert_eq!(backend.voice(voice).unwrap().playback, Playback::Playing);
    }

    #[test]
    fn test_stop_cancels_delayed_start() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), None).unwrap();
        backend.play_delayed(voice, Duration::from_millis(100)).unwrap();
        backend.stop(voice);
        backend.update(Duration::from_secs(1));

        assert_eq!(backend.audible_starts(), 0);
        assert!(!backend.is_alive(voice));
    }

    #[test]
    fn test_rebind_resets_state() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), Some([0.0; 3])).unwrap();
        backend.set_volume(voice, 0.3);
        backend.set_loop(voice, true);
        backend.rebind(voice, &clip("b"), None).unwrap();

        let state = backend.voice(voice).unwrap();
        assert_eq!(state.clip, "b");
        assert_eq!(state.volume, 1.0);
        assert!(!state.looping);
        assert!(!state.spatial);
    }

    #[test]
    fn test_failing_start() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), None).unwrap();
        backend.fail_next_starts(1);

        assert!(matches!(
            backend.play(voice),
            Err(BackendError::DecodeFailed { ref clip, .. }) if clip == "a"
        ));
        assert!(!backend.is_alive(voice));
        assert!(backend.play(voice).is_ok());
    }

    #[test]
    fn test_released_voice_is_dead() {
        let mut backend = RecordingBackend::new();
        let voice = backend.allocate(&clip("a"), None).unwrap();
        backend.play(voice).unwrap();
        backend.release(voice);

        assert!(!backend.is_alive(voice));
        assert!(backend.play(voice).is_err());
    }
}
