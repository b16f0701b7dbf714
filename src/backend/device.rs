/// Audio-device backend built on rodio
///
/// Each voice owns a rodio sink: a plain `Sink` for 2D voices and a
/// `SpatialSink` for 3D ones. Distance attenuation uses a logarithmic rolloff
/// between min and max distance, clamped at max distance. rodio has no
/// velocity model, so doppler level is stored but has no audible effect.
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sample, Sink, Source, SpatialSink};

use super::{Position, VoiceBackend, VoiceRef};
use crate::clip::AudioClip;
use crate::error::BackendError;

const DEFAULT_EAR_OFFSET: f32 = 0.1;

enum VoiceSink {
    Flat(Sink),
    Spatial(SpatialSink),
}

impl VoiceSink {
    fn set_volume(&self, volume: f32) {
        match self {
            VoiceSink::Flat(sink) => sink.set_volume(volume),
            VoiceSink::Spatial(sink) => sink.set_volume(volume),
        }
    }

    fn set_speed(&self, speed: f32) {
        match self {
            VoiceSink::Flat(sink) => sink.set_speed(speed),
            VoiceSink::Spatial(sink) => sink.set_speed(speed),
        }
    }

    fn stop(&self) {
        match self {
            VoiceSink::Flat(sink) => sink.stop(),
            VoiceSink::Spatial(sink) => sink.stop(),
        }
    }

    fn empty(&self) -> bool {
        match self {
            VoiceSink::Flat(sink) => sink.empty(),
            VoiceSink::Spatial(sink) => sink.empty(),
        }
    }

    fn append<S>(&self, source: S)
    where
        S: Source + Send + 'static,
        S::Item: Sample + Send + std::fmt::Debug,
        f32: rodio::cpal::FromSample<S::Item>,
    {
        match self {
            VoiceSink::Flat(sink) => sink.append(source),
            VoiceSink::Spatial(sink) => sink.append(source),
        }
    }
}

struct DeviceVoice {
    sink: VoiceSink,
    clip: Arc<AudioClip>,
    looping: Arc<AtomicBool>,
    volume: f32,
    min_distance: f32,
    max_distance: f32,
    doppler_level: f32,
    position: Option<Position>,
    group: Option<String>,
}

/// Voice backend playing through the default output device
pub struct DeviceBackend {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    voices: HashMap<u64, DeviceVoice>,
    next_voice: u64,
    group_volumes: HashMap<String, f32>,
    listener: Position,
}

impl DeviceBackend {
    /// Open the default output device
    pub fn open() -> Result<Self, BackendError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| BackendError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Opened default audio output device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            voices: HashMap::new(),
            next_voice: 0,
            group_volumes: HashMap::new(),
            listener: [0.0; 3],
        })
    }

    /// Move the listener; every 3D voice is re-panned and re-attenuated
    pub fn set_listener(&mut self, position: Position) {
        self.listener = position;
        let (left, right) = ears(position);
        let keys: Vec<u64> = self.voices.keys().copied().collect();
        for key in keys {
            if let Some(voice) = self.voices.get(&key) {
                if let VoiceSink::Spatial(sink) = &voice.sink {
                    sink.set_left_ear_position(left);
                    sink.set_right_ear_position(right);
                }
            }
            self.apply_gain(key);
        }
    }

    pub fn listener(&self) -> Position {
        self.listener
    }

    fn new_sink(&self, spatial: Option<Position>) -> Result<VoiceSink, BackendError> {
        let init = |e: rodio::PlayError| BackendError::StreamInitFailed(Box::new(e));
        match spatial {
            None => Ok(VoiceSink::Flat(Sink::try_new(&self.stream_handle).map_err(init)?)),
            Some(emitter) => {
                let (left, right) = ears(self.listener);
                let sink = SpatialSink::try_new(&self.stream_handle, emitter, left, right)
                    .map_err(init)?;
                Ok(VoiceSink::Spatial(sink))
            }
        }
    }

    fn new_voice(
        &self,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<DeviceVoice, BackendError> {
        let sink = self.new_sink(spatial)?;
        sink.set_volume(0.0);
        Ok(DeviceVoice {
            sink,
            clip: Arc::clone(clip),
            looping: Arc::new(AtomicBool::new(false)),
            volume: 1.0,
            min_distance: 1.0,
            max_distance: 500.0,
            doppler_level: 0.0,
            position: spatial,
            group: None,
        })
    }

    /// Push volume × group gain × distance rolloff to the sink
    fn apply_gain(&self, key: u64) {
        let Some(voice) = self.voices.get(&key) else {
            return;
        };
        let group_gain = voice
            .group
            .as_ref()
            .and_then(|g| self.group_volumes.get(g))
            .copied()
            .unwrap_or(1.0);
        let rolloff = voice
            .position
            .map(|p| rolloff(distance(p, self.listener), voice.min_distance, voice.max_distance))
            .unwrap_or(1.0);
        voice.sink.set_volume(voice.volume * group_gain * rolloff);
    }

    fn start(&mut self, voice: VoiceRef, delay: Option<Duration>) -> Result<(), BackendError> {
        let entry = self
            .voices
            .get(&voice.0)
            .ok_or(BackendError::UnknownVoice(voice.0))?;

        let clip = &entry.clip;
        if clip.data().is_empty() {
            return Err(BackendError::NoClipBound { voice: voice.0 });
        }
        let decoder = Decoder::new(Cursor::new(Arc::clone(clip.data()))).map_err(|e| {
            BackendError::DecodeFailed {
                clip: clip.name().to_string(),
                source: Box::new(e),
            }
        })?;

        let source = LoopToggle::new(decoder.buffered(), Arc::clone(&entry.looping));
        match delay {
            Some(delay) => entry.sink.append(source.delay(delay)),
            None => entry.sink.append(source),
        }
        tracing::trace!("{} started `{}` (delay {:?})", voice, clip.name(), delay);
        Ok(())
    }
}

impl VoiceBackend for DeviceBackend {
    fn allocate(
        &mut self,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<VoiceRef, BackendError> {
        let voice = self.new_voice(clip, spatial)?;
        let key = self.next_voice;
        self.next_voice += 1;
        self.voices.insert(key, voice);
        Ok(VoiceRef(key))
    }

    fn rebind(
        &mut self,
        voice: VoiceRef,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<(), BackendError> {
        if !self.voices.contains_key(&voice.0) {
            return Err(BackendError::UnknownVoice(voice.0));
        }
        // A stopped sink cannot be reused, so the sink is replaced; the slot
        // (and its reference) survives.
        let fresh = self.new_voice(clip, spatial)?;
        if let Some(old) = self.voices.insert(voice.0, fresh) {
            old.sink.stop();
        }
        Ok(())
    }

    fn set_volume(&mut self, voice: VoiceRef, volume: f32) {
        if let Some(v) = self.voices.get_mut(&voice.0) {
            v.volume = volume.clamp(0.0, 1.0);
        }
        self.apply_gain(voice.0);
    }

    fn set_pitch(&mut self, voice: VoiceRef, pitch: f32) {
        if let Some(v) = self.voices.get(&voice.0) {
            // rodio cannot play backwards
            v.sink.set_speed(pitch.max(0.01));
        }
    }

    fn set_distances(&mut self, voice: VoiceRef, min_distance: f32, max_distance: f32) {
        if let Some(v) = self.voices.get_mut(&voice.0) {
            v.min_distance = min_distance;
            v.max_distance = max_distance;
        }
        self.apply_gain(voice.0);
    }

    fn set_doppler_level(&mut self, voice: VoiceRef, level: f32) {
        if let Some(v) = self.voices.get_mut(&voice.0) {
            v.doppler_level = level;
            tracing::trace!("{} doppler level {} (no velocity model)", voice, v.doppler_level);
        }
    }

    fn set_loop(&mut self, voice: VoiceRef, looping: bool) {
        if let Some(v) = self.voices.get(&voice.0) {
            v.looping.store(looping, Ordering::Relaxed);
        }
    }

    fn set_mixer_group(&mut self, voice: VoiceRef, group: Option<&str>) {
        if let Some(v) = self.voices.get_mut(&voice.0) {
            v.group = group.map(str::to_string);
        }
        self.apply_gain(voice.0);
    }

    fn set_position(&mut self, voice: VoiceRef, position: Position) {
        if let Some(v) = self.voices.get_mut(&voice.0) {
            if let VoiceSink::Spatial(sink) = &v.sink {
                sink.set_emitter_position(position);
                v.position = Some(position);
            }
        }
        self.apply_gain(voice.0);
    }

    fn play(&mut self, voice: VoiceRef) -> Result<(), BackendError> {
        self.start(voice, None)
    }

    fn play_delayed(&mut self, voice: VoiceRef, delay: Duration) -> Result<(), BackendError> {
        self.start(voice, Some(delay))
    }

    fn stop(&mut self, voice: VoiceRef) {
        if let Some(v) = self.voices.get(&voice.0) {
            v.sink.stop();
        }
    }

    fn is_alive(&self, voice: VoiceRef) -> bool {
        self.voices
            .get(&voice.0)
            .is_some_and(|v| !v.sink.empty())
    }

    fn release(&mut self, voice: VoiceRef) {
        if let Some(v) = self.voices.remove(&voice.0) {
            v.sink.stop();
        }
    }

    fn set_group_volume(&mut self, group: &str, volume: f32) {
        self.group_volumes
            .insert(group.to_string(), volume.clamp(0.0, 1.0));
        let routed: Vec<u64> = self
            .voices
            .iter()
            .filter(|(_, v)| v.group.as_deref() == Some(group))
            .map(|(k, _)| *k)
            .collect();
        for key in routed {
            self.apply_gain(key);
        }
    }
}

/// Source that restarts from a pristine copy while its loop flag is set.
///
/// The flag is shared with the backend so looping can be toggled on a voice
/// that is already playing.
struct LoopToggle<I>
where
    I: Source + Clone,
    I::Item: Sample,
{
    pristine: I,
    current: I,
    looping: Arc<AtomicBool>,
}

impl<I> LoopToggle<I>
where
    I: Source + Clone,
    I::Item: Sample,
{
    fn new(source: I, looping: Arc<AtomicBool>) -> Self {
        Self {
            pristine: source.clone(),
            current: source,
            looping,
        }
    }
}

impl<I> Iterator for LoopToggle<I>
where
    I: Source + Clone,
    I::Item: Sample,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if let Some(sample) = self.current.next() {
            return Some(sample);
        }
        if !self.looping.load(Ordering::Relaxed) {
            return None;
        }
        self.current = self.pristine.clone();
        self.current.next()
    }
}

impl<I> Source for LoopToggle<I>
where
    I: Source + Clone,
    I::Item: Sample,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.current.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.current.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.current.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

fn ears(listener: Position) -> (Position, Position) {
    let [x, y, z] = listener;
    (
        [x - DEFAULT_EAR_OFFSET, y, z],
        [x + DEFAULT_EAR_OFFSET, y, z],
    )
}

fn distance(a: Position, b: Position) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f32>()
        .sqrt()
}

/// Logarithmic rolloff: full volume inside `min`, `min / d` beyond, no
/// further attenuation past `max`
fn rolloff(distance: f32, min: f32, max: f32) -> f32 {
    let min = min.max(f32::EPSILON);
    let max = max.max(min);
    (min / distance.clamp(min, max)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolloff_inside_min_distance() {
        assert_eq!(rolloff(0.5, 1.0, 500.0), 1.0);
        assert_eq!(rolloff(1.0, 1.0, 500.0), 1.0);
    }

    #[test]
    fn test_rolloff_between_distances() {
        assert!((rolloff(4.0, 1.0, 500.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rolloff_clamped_at_max_distance() {
        assert_eq!(rolloff(1_000.0, 1.0, 10.0), rolloff(10.0, 1.0, 10.0));
    }

    #[test]
    fn test_distance() {
        assert!((distance([0.0, 3.0, 0.0], [4.0, 0.0, 0.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_ears_straddle_listener() {
        let (left, right) = ears([1.0, 2.0, 3.0]);
        assert!(left[0] < 1.0 && right[0] > 1.0);
        assert_eq!(left[1], 2.0);
        assert_eq!(right[2], 3.0);
    }

    // Device playback needs real audio hardware; the loop source is checked
    // against an in-memory buffer instead.
    #[test]
    fn test_loop_toggle_repeats_while_flag_set() {
        let buffer = rodio::buffer::SamplesBuffer::new(1, 8_000, vec![1i16, 2, 3]);
        let looping = Arc::new(AtomicBool::new(true));
        let mut source = LoopToggle::new(buffer.buffered(), Arc::clone(&looping));

        let first: Vec<i16> = (&mut source).take(5).collect();
        assert_eq!(first, vec![1, 2, 3, 1, 2]);

        looping.store(false, Ordering::Relaxed);
        let rest: Vec<i16> = source.collect();
        assert_eq!(rest, vec![3]);
    }
}
