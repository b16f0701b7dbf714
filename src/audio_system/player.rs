/// Audio player
///
/// One configured asset: an ordered list of clip slots plus the parameters
/// every play uses. A player hands out a fresh [`AudioHandle`] per play,
/// arbitrates singleton playback, pushes parameter changes to its live voices
/// and optionally persists parameter overrides under its save key.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::anchor::{Anchor, TrackedTransform};
use super::context::AudioContext;
use super::handle::{AudioHandle, HandleKey, PlayerId};
use super::pool::{SpawnRequest, VoiceKey};
use super::settings::{seconds, PlayerSettings};
use crate::backend::{Position, VoiceBackend};
use crate::clip::AudioClip;
use crate::error::{PlayerError, SaveKeyConflict};
use crate::messaging::PlaybackEvent;

/// Which clip a play request wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSelector<'a> {
    Random,
    Index(usize),
    /// Exact, case-sensitive clip name; an empty name picks at random
    Name(&'a str),
}

impl From<usize> for ClipSelector<'_> {
    fn from(index: usize) -> Self {
        ClipSelector::Index(index)
    }
}

impl<'a> From<&'a str> for ClipSelector<'a> {
    fn from(name: &'a str) -> Self {
        ClipSelector::Name(name)
    }
}

/// Optional play arguments
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub position: Option<Position>,
    pub tracking: Option<TrackedTransform>,
    pub delay: Duration,
}

impl PlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Play in 3D at a fixed point
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Play in 3D, following `target`
    pub fn tracking(mut self, target: TrackedTransform) -> Self {
        self.tracking = Some(target);
        self
    }

    /// Start after `delay`; the handle counts as playing meanwhile
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay_secs(self, secs: f32) -> Self {
        self.delay(seconds(secs))
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveVoice {
    key: VoiceKey,
    clip_index: usize,
}

#[derive(Debug)]
pub struct AudioPlayer {
    id: PlayerId,
    name: String,
    clips: Vec<Option<Arc<AudioClip>>>,
    settings: PlayerSettings,
    playing: HashMap<u64, LiveVoice>,
    next_id: u64,
    singleton_handle: Option<AudioHandle>,
    enabled: bool,
}

impl AudioPlayer {
    /// `clips` may contain empty slots; playing one is an error
    pub fn new(name: impl Into<String>, settings: PlayerSettings, clips: Vec<Option<Arc<AudioClip>>>) -> Self {
        Self {
            id: PlayerId::next(),
            name: name.into(),
            clips,
            settings,
            playing: HashMap::new(),
            next_id: 0,
            singleton_handle: None,
            enabled: false,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clips(&self) -> &[Option<Arc<AudioClip>>] {
        &self.clips
    }

    /// Clip names by slot, `None` for empty slots
    pub fn clip_names(&self) -> Vec<Option<&str>> {
        self.clips
            .iter()
            .map(|slot| slot.as_deref().map(AudioClip::name))
            .collect()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Index of the first clip named exactly `name`
    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.clips
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|clip| clip.name() == name))
    }

    /// Play a clip chosen by `selector`
    pub fn play<'a, B: VoiceBackend>(
        &mut self,
        ctx: &mut AudioContext<B>,
        selector: impl Into<ClipSelector<'a>>,
        options: PlayOptions,
    ) -> Result<AudioHandle, PlayerError> {
        if self.clips.is_empty() {
            return Err(PlayerError::NoClips {
                player: self.name.clone(),
            });
        }

        let index = match selector.into() {
            ClipSelector::Index(index) => index,
            ClipSelector::Name(name) if !name.is_empty() => {
                self.find_index(name).ok_or_else(|| PlayerError::ClipNotFound {
                    player: self.name.clone(),
                    clip: name.to_string(),
                })?
            }
            ClipSelector::Random | ClipSelector::Name(_) => ctx.random_index(self.clips.len()),
        };

        self.play_index(ctx, index, options)
    }

    /// Play a uniformly random clip
    pub fn play_random<B: VoiceBackend>(
        &mut self,
        ctx: &mut AudioContext<B>,
        options: PlayOptions,
    ) -> Result<AudioHandle, PlayerError> {
        self.play(ctx, ClipSelector::Random, options)
    }

    /// Play the clip in slot `index`
    pub fn play_index<B: VoiceBackend>(
        &mut self,
        ctx: &mut AudioContext<B>,
        index: usize,
        options: PlayOptions,
    ) -> Result<AudioHandle, PlayerError> {
        let clip = self.clip_at(index)?;

        let mut interrupted = None;
        if self.settings.singleton {
            if let Some(current) = self.singleton_handle {
                if self.is_playing(current.id(), ctx) {
                    if !self.settings.allow_interrupt || current.clip_index() == index {
                        return Ok(current);
                    }
                    interrupted = Some(current);
                }
            }
        }

        self.prune(ctx);

        let handle = AudioHandle::new(self.id, self.next_id, index);
        let delay = options.delay;
        let lifetime = if self.settings.looping {
            None
        } else {
            Some(clip.duration() + delay)
        };
        let key = ctx.spawn_voice(SpawnRequest {
            owner: handle.key(),
            clip: &clip,
            anchor: Anchor::from_options(options.position, options.tracking),
            lifetime,
            delay,
        })?;

        self.configure_voice(ctx, key);
        if let Err(err) = ctx.start_voice(key, delay) {
            ctx.release_voice(key, Duration::ZERO);
            return Err(err.into());
        }

        // The old singleton only goes once its replacement is playing
        if let Some(current) = interrupted {
            self.stop(ctx, current.id(), self.settings.interrupt_fade());
        }
        ctx.fade_in(key, self.settings.volume, self.settings.play_fade(), delay);

        self.next_id += 1;
        self.playing.insert(
            handle.id(),
            LiveVoice {
                key,
                clip_index: index,
            },
        );
        if self.settings.singleton {
            self.singleton_handle = Some(handle);
        }

        tracing::debug!(
            "`{}` playing clip `{}` as {} (delay {:?})",
            self.name,
            clip.name(),
            handle,
            delay
        );
        ctx.publish(PlaybackEvent::Played {
            handle,
            clip: clip.name().to_string(),
            delay,
        });
        Ok(handle)
    }

    /// Stop the playback `id`, fading out over `fade`.
    ///
    /// Returns false (and changes nothing) when `id` is unknown or already
    /// ended. The handle stops counting as playing immediately.
    pub fn stop<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, id: u64, fade: Duration) -> bool {
        let owner = self.handle_key(id);
        let Some(live) = self.playing.get(&id).copied() else {
            return false;
        };
        if !ctx.is_bound(live.key, owner) {
            self.playing.remove(&id);
            return false;
        }

        self.playing.remove(&id);
        ctx.release_voice(live.key, fade);

        tracing::debug!("`{}` stopped {} (fade {:?})", self.name, id, fade);
        ctx.publish(PlaybackEvent::Stopped {
            player: self.id,
            id,
            fade,
        });
        true
    }

    /// Stop the current singleton playback, if any, with the interrupt fade
    pub fn stop_singleton<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) -> bool {
        if !self.settings.singleton {
            return false;
        }
        match self.singleton_handle {
            Some(handle) if self.is_playing(handle.id(), ctx) => {
                self.stop(ctx, handle.id(), self.settings.interrupt_fade())
            }
            _ => false,
        }
    }

    /// Stop every live playback of this player
    pub fn stop_all<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, fade: Duration) -> usize {
        let ids: Vec<u64> = self.playing.keys().copied().collect();
        ids.into_iter().filter(|&id| self.stop(ctx, id, fade)).count()
    }

    /// Whether `id` is still logically playing
    pub fn is_playing<B: VoiceBackend>(&self, id: u64, ctx: &AudioContext<B>) -> bool {
        self.playing
            .get(&id)
            .is_some_and(|live| ctx.is_bound(live.key, self.handle_key(id)))
    }

    /// Handles still playing, oldest first
    pub fn live_handles<B: VoiceBackend>(&self, ctx: &AudioContext<B>) -> Vec<AudioHandle> {
        let mut handles: Vec<AudioHandle> = self
            .playing
            .iter()
            .filter(|(id, live)| ctx.is_bound(live.key, self.handle_key(**id)))
            .map(|(id, live)| AudioHandle::new(self.id, *id, live.clip_index))
            .collect();
        handles.sort_by_key(|h| h.id());
        handles
    }

    /// The current singleton handle, whether or not it still plays
    pub fn singleton_handle(&self) -> Option<AudioHandle> {
        self.singleton_handle
    }

    pub fn interrupt_fade(&self) -> Duration {
        self.settings.interrupt_fade()
    }

    pub fn looping(&self) -> bool {
        self.settings.looping
    }

    pub fn set_loop<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, looping: bool) {
        if self.update_loop(ctx, looping) {
            self.persist_change(ctx);
        }
    }

    pub fn singleton(&self) -> bool {
        self.settings.singleton
    }

    pub fn set_singleton<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, singleton: bool) {
        if self.settings.singleton != singleton {
            self.settings.singleton = singleton;
            self.persist_change(ctx);
        }
    }

    pub fn volume(&self) -> f32 {
        self.settings.volume
    }

    /// Clamped to 0-1
    pub fn set_volume<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, volume: f32) {
        if self.update_volume(ctx, volume) {
            self.persist_change(ctx);
        }
    }

    pub fn min_distance(&self) -> f32 {
        self.settings.min_distance
    }

    pub fn set_min_distance<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, min_distance: f32) {
        let max_distance = self.settings.max_distance;
        if self.update_distances(ctx, min_distance, max_distance) {
            self.persist_change(ctx);
        }
    }

    pub fn max_distance(&self) -> f32 {
        self.settings.max_distance
    }

    pub fn set_max_distance<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, max_distance: f32) {
        let min_distance = self.settings.min_distance;
        if self.update_distances(ctx, min_distance, max_distance) {
            self.persist_change(ctx);
        }
    }

    /// `[min, max]`
    pub fn pitch(&self) -> [f32; 2] {
        self.settings.pitch
    }

    pub fn set_pitch<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, pitch: [f32; 2]) {
        if self.update_pitch(ctx, pitch) {
            self.persist_change(ctx);
        }
    }

    pub fn doppler_level(&self) -> f32 {
        self.settings.doppler_level
    }

    pub fn set_doppler_level<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, level: f32) {
        if self.update_doppler_level(ctx, level) {
            self.persist_change(ctx);
        }
    }

    pub fn allow_interrupt(&self) -> bool {
        self.settings.allow_interrupt
    }

    pub fn set_allow_interrupt(&mut self, allow: bool) {
        self.settings.allow_interrupt = allow;
    }

    /// Seconds
    pub fn play_fade_time(&self) -> f32 {
        self.settings.play_fade_time
    }

    pub fn set_play_fade_time(&mut self, secs: f32) {
        self.settings.play_fade_time = secs.max(0.0);
    }

    /// Seconds
    pub fn interrupt_fade_time(&self) -> f32 {
        self.settings.interrupt_fade_time
    }

    pub fn set_interrupt_fade_time(&mut self, secs: f32) {
        self.settings.interrupt_fade_time = secs.max(0.0);
    }

    pub fn mixer_group(&self) -> Option<&str> {
        self.settings.mixer_group.as_deref()
    }

    /// Reroutes live voices as well
    pub fn set_mixer_group<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, group: Option<&str>) {
        if self.settings.mixer_group.as_deref() == group {
            return;
        }
        self.settings.mixer_group = group.map(str::to_string);
        self.prune(ctx);
        for live in self.playing.values() {
            ctx.apply_mixer_group(live.key, group);
        }
    }

    pub fn save_key(&self) -> i32 {
        self.settings.save_key
    }

    /// Claim the save key and apply persisted overrides. Returns the save-key
    /// conflict resolved on the way, if any.
    pub fn enable<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) -> Option<SaveKeyConflict> {
        if self.enabled {
            return None;
        }

        let mut key = self.settings.save_key;
        let conflict = ctx.claim_save_key(&mut key, self.id, &self.name);
        self.settings.save_key = key;
        self.enabled = true;

        self.load_parameters(ctx);
        tracing::info!("Enabled audio player `{}` (save key {})", self.name, key);
        conflict
    }

    /// Stop and reclaim every voice at once and release the save key
    pub fn disable<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) {
        let stopped = self.stop_all(ctx, Duration::ZERO);
        self.playing.clear();
        self.singleton_handle = None;

        if self.enabled {
            ctx.release_save_key(self.settings.save_key, self.id);
            self.enabled = false;
        }
        tracing::info!("Disabled audio player `{}` ({} voices stopped)", self.name, stopped);
    }

    /// Write every parameter flagged for saving to the preference store
    pub fn save_parameters<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) {
        self.ensure_save_key(ctx);

        let save = self.settings.save;
        if !save.any() {
            return;
        }
        let settings = &self.settings;
        let prefix = settings.save_key;
        let key = |name: &str| format!("{}_{}", prefix, name);
        let prefs = ctx.prefs_mut();

        if save.looping {
            prefs.set_int(&key("loop"), settings.looping as i32);
        }
        if save.singleton {
            prefs.set_int(&key("singleton"), settings.singleton as i32);
        }
        if save.volume {
            prefs.set_float(&key("volume"), settings.volume);
        }
        if save.distances {
            prefs.set_float(&key("minDistance"), settings.min_distance);
            prefs.set_float(&key("maxDistance"), settings.max_distance);
        }
        if save.pitch {
            prefs.set_float(&key("pitchX"), settings.pitch[0]);
            prefs.set_float(&key("pitchY"), settings.pitch[1]);
        }
        if save.doppler_level {
            prefs.set_float(&key("dopplerLevel"), settings.doppler_level);
        }

        ctx.flush_prefs();
    }

    /// Apply every parameter flagged for saving from the preference store.
    /// Missing entries keep the current value; live voices are updated.
    pub fn load_parameters<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) {
        self.ensure_save_key(ctx);

        let save = self.settings.save;
        let prefix = self.settings.save_key;
        let key = |name: &str| format!("{}_{}", prefix, name);

        if save.looping {
            let looping = ctx.prefs().get_int(&key("loop"), self.settings.looping as i32) == 1;
            self.update_loop(ctx, looping);
        }
        if save.singleton {
            self.settings.singleton =
                ctx.prefs().get_int(&key("singleton"), self.settings.singleton as i32) == 1;
        }
        if save.volume {
            let volume = ctx.prefs().get_float(&key("volume"), self.settings.volume);
            self.update_volume(ctx, volume);
        }
        if save.distances {
            let min_distance = ctx.prefs().get_float(&key("minDistance"), self.settings.min_distance);
            let max_distance = ctx.prefs().get_float(&key("maxDistance"), self.settings.max_distance);
            self.update_distances(ctx, min_distance, max_distance);
        }
        if save.pitch {
            let pitch = [
                ctx.prefs().get_float(&key("pitchX"), self.settings.pitch[0]),
                ctx.prefs().get_float(&key("pitchY"), self.settings.pitch[1]),
            ];
            self.update_pitch(ctx, pitch);
        }
        if save.doppler_level {
            let level = ctx.prefs().get_float(&key("dopplerLevel"), self.settings.doppler_level);
            self.update_doppler_level(ctx, level);
        }
    }

    /// Drop bookkeeping for playbacks that ended on their own
    pub fn prune<B: VoiceBackend>(&mut self, ctx: &AudioContext<B>) {
        let player = self.id;
        self.playing
            .retain(|&id, live| ctx.is_bound(live.key, HandleKey { player, id }));
    }

    fn handle_key(&self, id: u64) -> HandleKey {
        HandleKey {
            player: self.id,
            id,
        }
    }

    fn clip_at(&self, index: usize) -> Result<Arc<AudioClip>, PlayerError> {
        if self.clips.is_empty() {
            return Err(PlayerError::NoClips {
                player: self.name.clone(),
            });
        }
        match self.clips.get(index) {
            Some(Some(clip)) => Ok(Arc::clone(clip)),
            Some(None) => Err(PlayerError::ClipNull {
                player: self.name.clone(),
                index,
            }),
            None => Err(PlayerError::ClipIndexOutOfRange {
                player: self.name.clone(),
                index,
                len: self.clips.len(),
            }),
        }
    }

    /// Full parameter set for a freshly spawned voice (volume is set by the
    /// fade-in)
    fn configure_voice<B: VoiceBackend>(&self, ctx: &mut AudioContext<B>, key: VoiceKey) {
        let settings = &self.settings;
        ctx.apply_pitch(key, settings.pitch, None);
        ctx.apply_distances(key, settings.min_distance, settings.max_distance);
        ctx.apply_loop(key, settings.looping);
        ctx.apply_doppler_level(key, settings.doppler_level);
        ctx.apply_mixer_group(key, settings.mixer_group.as_deref());
    }

    fn persist_change<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) {
        if self.settings.persist_on_change {
            self.save_parameters(ctx);
        }
    }

    fn ensure_save_key<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>) {
        let key = self.settings.save_key;
        let held = ctx.save_keys().holder(key) == Some(self.id);
        if key == 0 || (self.enabled && !held) {
            let mut key = key;
            ctx.claim_save_key(&mut key, self.id, &self.name);
            self.settings.save_key = key;
        }
    }

    /// Live voices after dropping ended ones
    fn live_keys<B: VoiceBackend>(&mut self, ctx: &AudioContext<B>) -> Vec<VoiceKey> {
        self.prune(ctx);
        self.playing.values().map(|live| live.key).collect()
    }

    fn update_loop<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, looping: bool) -> bool {
        if self.settings.looping == looping {
            return false;
        }
        self.settings.looping = looping;
        if self.settings.live_link.looping {
            for key in self.live_keys(ctx) {
                ctx.apply_loop(key, looping);
            }
        }
        true
    }

    fn update_volume<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, volume: f32) -> bool {
        let volume = volume.clamp(0.0, 1.0);
        if self.settings.volume == volume {
            return false;
        }
        self.settings.volume = volume;
        if self.settings.live_link.volume {
            for key in self.live_keys(ctx) {
                ctx.apply_volume(key, volume);
            }
        }
        true
    }

    fn update_distances<B: VoiceBackend>(
        &mut self,
        ctx: &mut AudioContext<B>,
        min_distance: f32,
        max_distance: f32,
    ) -> bool {
        let min_distance = min_distance.max(0.0);
        let max_distance = max_distance.max(0.0);
        if self.settings.min_distance == min_distance && self.settings.max_distance == max_distance {
            return false;
        }
        self.settings.min_distance = min_distance;
        self.settings.max_distance = max_distance;
        if self.settings.live_link.distances {
            for key in self.live_keys(ctx) {
                ctx.apply_distances(key, min_distance, max_distance);
            }
        }
        true
    }

    fn update_pitch<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, pitch: [f32; 2]) -> bool {
        if self.settings.pitch == pitch {
            return false;
        }
        self.settings.pitch = pitch;
        if self.settings.live_link.pitch {
            for key in self.live_keys(ctx) {
                ctx.reapply_pitch(key, pitch);
            }
        }
        true
    }

    fn update_doppler_level<B: VoiceBackend>(&mut self, ctx: &mut AudioContext<B>, level: f32) -> bool {
        if self.settings.doppler_level == level {
            return false;
        }
        self.settings.doppler_level = level;
        if self.settings.live_link.doppler_level {
            for key in self.live_keys(ctx) {
                ctx.apply_doppler_level(key, level);
            }
        }
        true
    }
}
