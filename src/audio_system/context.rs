/// Audio context
///
/// Owns everything players share: the backend, the voice pool, running
/// fades, the clock, preferences, save keys, mixer groups and the event bus.
/// Nothing advances on its own; the host calls [`AudioContext::update`] once
/// per frame (or tick) with the elapsed time.
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::fade::{FadeController, FadeKind, FadeOutcome};
use super::handle::{HandleKey, PlayerId};
use super::mixer::MixerGroups;
use super::pool::{Reclaimed, SpawnRequest, VoiceKey, VoicePool};
use super::settings::pitch_in;
use crate::backend::{VoiceBackend, VoiceRef};
use crate::config::EngineConfig;
use crate::error::{BackendError, ConfigError, SaveKeyConflict};
use crate::messaging::{EventBus, PlaybackEvent};
use crate::persistence::{JsonPrefs, MemoryPrefs, PreferenceStore, SaveKeyRegistry};

pub struct AudioContext<B: VoiceBackend> {
    backend: B,
    pool: VoicePool,
    fades: FadeController,
    clock: Duration,
    rng: StdRng,
    prefs: Box<dyn PreferenceStore>,
    save_keys: SaveKeyRegistry,
    mixer: MixerGroups,
    events: EventBus,
}

impl<B: VoiceBackend> AudioContext<B> {
    /// Unbounded pool, in-memory preferences, entropy-seeded randomness
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pool: VoicePool::new(),
            fades: FadeController::new(),
            clock: Duration::ZERO,
            rng: StdRng::from_entropy(),
            prefs: Box::new(MemoryPrefs::new()),
            save_keys: SaveKeyRegistry::new(),
            mixer: MixerGroups::new(),
            events: EventBus::new(),
        }
    }

    /// Build from engine configuration, opening the JSON preference file
    pub fn from_config(backend: B, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let prefs_path = match &config.prefs_path {
            Some(path) => path.clone(),
            None => JsonPrefs::default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        let mut ctx = Self::new(backend).with_prefs(JsonPrefs::open(&prefs_path)?);

        if let Some(max_voices) = config.max_voices {
            ctx.pool = VoicePool::bounded(max_voices);
        }
        for group in &config.mixer_groups {
            ctx.register_mixer_group(&group.name, group.volume);
        }

        tracing::info!(
            "Audio context ready (max voices: {:?}, prefs: {}, {} mixer groups)",
            config.max_voices,
            prefs_path.display(),
            config.mixer_groups.len()
        );
        Ok(ctx)
    }

    /// Deterministic randomness for pitch draws, random clips and save keys
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Bound the pool. Must be called before anything plays.
    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.pool = VoicePool::bounded(max_voices);
        self
    }

    pub fn with_prefs<P: PreferenceStore + 'static>(mut self, prefs: P) -> Self {
        self.prefs = Box::new(prefs);
        self
    }

    /// Time advanced through `update` so far
    pub fn now(&self) -> Duration {
        self.clock
    }

    /// Advance the clock and everything that depends on it: delayed starts,
    /// fades, expiries, tracked positions.
    pub fn update(&mut self, elapsed: Duration) {
        self.clock += elapsed;
        let now = self.clock;

        self.backend.update(elapsed);

        let mut reclaimed = Vec::new();
        for key in self.fades.update(&mut self.backend, now) {
            reclaimed.extend(self.pool.reclaim(key, &mut self.backend, &mut self.fades));
        }
        reclaimed.extend(self.pool.update(&mut self.backend, &mut self.fades, now));

        for voice in reclaimed {
            self.publish_reclaimed(voice);
        }
    }

    /// Stop and destroy every voice and flush preferences
    pub fn shutdown(&mut self) {
        let voices = self.pool.len();
        self.pool.release_all(&mut self.backend, &mut self.fades);
        self.flush_prefs();
        tracing::info!("Audio context shut down ({} voices released)", voices);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn prefs(&self) -> &dyn PreferenceStore {
        self.prefs.as_ref()
    }

    pub fn prefs_mut(&mut self) -> &mut dyn PreferenceStore {
        self.prefs.as_mut()
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn save_keys(&self) -> &SaveKeyRegistry {
        &self.save_keys
    }

    pub fn mixer_groups(&self) -> &MixerGroups {
        &self.mixer
    }

    pub fn register_mixer_group(&mut self, name: &str, volume: f32) {
        let volume = self.mixer.register(name, volume);
        self.backend.set_group_volume(name, volume);
        tracing::debug!("Registered mixer group `{}` at volume {}", name, volume);
    }

    /// Returns false for unknown groups
    pub fn set_group_volume(&mut self, name: &str, volume: f32) -> bool {
        match self.mixer.set_volume(name, volume) {
            Some(volume) => {
                self.backend.set_group_volume(name, volume);
                true
            }
            None => {
                tracing::warn!("Mixer group `{}` is not registered", name);
                false
            }
        }
    }

    /// Voices bound or fading out
    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    /// Write preferences to their backing store, logging failures
    pub fn flush_prefs(&mut self) {
        if let Err(err) = self.prefs.flush() {
            tracing::warn!("Failed to save preferences: {}", err);
        }
    }

    pub(crate) fn spawn_voice(&mut self, request: SpawnRequest<'_>) -> Result<VoiceKey, BackendError> {
        self.pool
            .spawn(&mut self.backend, &mut self.fades, request, self.clock)
    }

    pub(crate) fn is_bound(&self, key: VoiceKey, owner: HandleKey) -> bool {
        self.pool.is_bound(key, owner)
    }

    pub(crate) fn voice(&self, key: VoiceKey) -> Option<VoiceRef> {
        self.pool.voice(key)
    }

    pub(crate) fn start_voice(&mut self, key: VoiceKey, delay: Duration) -> Result<(), BackendError> {
        let voice = self
            .pool
            .voice(key)
            .ok_or(BackendError::NoClipBound { voice: key.index() as u64 })?;
        if delay.is_zero() {
            self.backend.play(voice)
        } else {
            self.backend.play_delayed(voice, delay)
        }
    }

    pub(crate) fn fade_in(&mut self, key: VoiceKey, target: f32, duration: Duration, delay: Duration) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };
        self.pool.note_volume(key, target);
        self.fades
            .fade_in(&mut self.backend, key, voice, target, duration, delay, self.clock);
    }

    /// Hand a voice back: immediately when `fade` is zero or the voice has not
    /// started yet, otherwise after fading out. The handle is unbound at once.
    pub(crate) fn release_voice(&mut self, key: VoiceKey, fade: Duration) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };

        if fade.is_zero() || !self.pool.has_started(key, self.clock) {
            if let Some(reclaimed) = self.pool.reclaim(key, &mut self.backend, &mut self.fades) {
                self.publish_reclaimed(reclaimed);
            }
            return;
        }

        let from = self
            .fades
            .current_volume(key, self.clock)
            .or_else(|| self.pool.volume(key))
            .unwrap_or(0.0);
        self.pool.detach(key);

        let outcome = self
            .fades
            .fade_out(&mut self.backend, key, voice, from, fade, self.clock);
        if outcome == FadeOutcome::Done {
            if let Some(reclaimed) = self.pool.reclaim(key, &mut self.backend, &mut self.fades) {
                self.publish_reclaimed(reclaimed);
            }
        }
    }

    /// Set a voice's target volume, moving a running fade-in instead of
    /// cutting it short
    pub(crate) fn apply_volume(&mut self, key: VoiceKey, volume: f32) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };
        self.pool.note_volume(key, volume);
        match self.fades.kind(key) {
            Some(FadeKind::In) => {
                self.fades.retarget(key, volume);
            }
            Some(FadeKind::Out) => {}
            None => self.backend.set_volume(voice, volume),
        }
    }

    /// Set pitch from a `draw` in [0, 1]; `None` draws a fresh one
    pub(crate) fn apply_pitch(&mut self, key: VoiceKey, range: [f32; 2], draw: Option<f32>) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };
        let draw = match draw {
            Some(draw) => draw,
            None => self.rng.gen_range(0.0..=1.0),
        };
        self.pool.note_pitch_draw(key, draw);
        self.backend.set_pitch(voice, pitch_in(range, draw));
    }

    /// Re-map a live voice's spawn-time pitch draw into a new range
    pub(crate) fn reapply_pitch(&mut self, key: VoiceKey, range: [f32; 2]) {
        if let Some(draw) = self.pool.pitch_draw(key) {
            self.apply_pitch(key, range, Some(draw));
        }
    }

    pub(crate) fn apply_loop(&mut self, key: VoiceKey, looping: bool) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };
        self.backend.set_loop(voice, looping);
        self.pool.set_looping(key, looping, self.clock);
    }

    pub(crate) fn apply_distances(&mut self, key: VoiceKey, min_distance: f32, max_distance: f32) {
        if let Some(voice) = self.pool.voice(key) {
            self.backend.set_distances(voice, min_distance, max_distance);
        }
    }

    pub(crate) fn apply_doppler_level(&mut self, key: VoiceKey, level: f32) {
        if let Some(voice) = self.pool.voice(key) {
            self.backend.set_doppler_level(voice, level);
        }
    }

    /// Route to `group` if it is registered, otherwise to the master output
    pub(crate) fn apply_mixer_group(&mut self, key: VoiceKey, group: Option<&str>) {
        let Some(voice) = self.pool.voice(key) else {
            return;
        };
        if let Some(name) = group.filter(|name| !self.mixer.contains(name)) {
            tracing::debug!("Mixer group `{}` not registered, using master output", name);
        }
        let routed = self.mixer.resolve(group);
        self.backend.set_mixer_group(voice, routed);
    }

    /// Uniform index in `0..len`; `len` must be non-zero
    pub(crate) fn random_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Claim a save key, publishing any conflict
    pub(crate) fn claim_save_key(
        &mut self,
        key: &mut i32,
        player: PlayerId,
        name: &str,
    ) -> Option<SaveKeyConflict> {
        let conflict = self.save_keys.claim(key, player, name, &mut self.rng);
        if let Some(conflict) = &conflict {
            self.events.publish(PlaybackEvent::SaveKeyReassigned {
                player,
                conflict: conflict.clone(),
            });
        }
        conflict
    }

    pub(crate) fn release_save_key(&mut self, key: i32, player: PlayerId) {
        self.save_keys.release(key, player);
    }

    pub(crate) fn publish(&self, event: PlaybackEvent) {
        self.events.publish(event);
    }

    fn publish_reclaimed(&self, reclaimed: Reclaimed) {
        self.events.publish(PlaybackEvent::Reclaimed {
            voice: reclaimed.voice,
            player: reclaimed.player,
            owner: reclaimed.owner,
        });
    }
}

impl<B: VoiceBackend + std::fmt::Debug> std::fmt::Debug for AudioContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("backend", &self.backend)
            .field("clock", &self.clock)
            .field("voices", &self.pool.active_count())
            .field("fades", &self.fades.len())
            .field("save_keys", &self.save_keys.len())
            .field("mixer_groups", &self.mixer.len())
            .finish()
    }
}
