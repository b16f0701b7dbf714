/// Voice pool
///
/// Owns the physical voices and their bookkeeping. A slot is `Free`, `Bound`
/// to one live handle, or `Releasing` (logically stopped, still fading out).
/// Released slots go on a free list and are rebound before any new voice is
/// allocated. Keys carry the slot generation, so a key kept past a reclaim
/// never reaches the slot's next occupant.
use std::sync::Arc;
use std::time::Duration;

use super::anchor::Anchor;
use super::fade::FadeController;
use super::handle::{HandleKey, PlayerId};
use crate::backend::{Position, VoiceBackend, VoiceRef};
use crate::clip::AudioClip;
use crate::error::BackendError;

/// Generation-checked reference to a pool slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceKey {
    index: usize,
    generation: u32,
}

impl VoiceKey {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Bound,
    Releasing,
}

#[derive(Debug)]
struct VoiceSlot {
    voice: VoiceRef,
    generation: u32,
    state: SlotState,
    /// Player that spawned the voice; kept while it fades out
    player: Option<PlayerId>,
    owner: Option<HandleKey>,
    clip_length: Duration,
    starts_at: Duration,
    expires_at: Option<Duration>,
    spawned: u64,
    anchor: Anchor,
    last_position: Option<Position>,
    volume: f32,
    pitch_draw: f32,
}

impl VoiceSlot {
    fn new(voice: VoiceRef) -> Self {
        Self {
            voice,
            generation: 0,
            state: SlotState::Free,
            player: None,
            owner: None,
            clip_length: Duration::ZERO,
            starts_at: Duration::ZERO,
            expires_at: None,
            spawned: 0,
            anchor: Anchor::Flat,
            last_position: None,
            volume: 0.0,
            pitch_draw: 0.0,
        }
    }
}

/// Everything the pool needs to bind a voice
#[derive(Debug)]
pub struct SpawnRequest<'a> {
    pub owner: HandleKey,
    pub clip: &'a Arc<AudioClip>,
    pub anchor: Anchor,
    /// `None` plays until stopped
    pub lifetime: Option<Duration>,
    pub delay: Duration,
}

/// A voice handed back to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimed {
    pub key: VoiceKey,
    pub voice: VoiceRef,
    /// Player that spawned the voice
    pub player: Option<PlayerId>,
    /// Handle still bound at reclaim time; `None` if it was already stopped
    pub owner: Option<HandleKey>,
}

#[derive(Debug, Default)]
pub struct VoicePool {
    slots: Vec<VoiceSlot>,
    free: Vec<usize>,
    /// Slots whose voice was released after a failed rebind
    dead: Vec<usize>,
    capacity: Option<usize>,
    spawn_seq: u64,
}

impl VoicePool {
    /// Pool that grows as needed
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool holding at most `capacity` voices; the oldest voice is stolen
    /// when it is full
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Bind a voice to `request.owner`, ready for parameters and playback
    pub fn spawn<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        fades: &mut FadeController,
        request: SpawnRequest<'_>,
        now: Duration,
    ) -> Result<VoiceKey, BackendError> {
        let spatial = request.anchor.spatial();

        if self.free.is_empty() && self.dead.is_empty() && self.is_full() {
            if let Some(victim) = self.steal_candidate() {
                let slot = &self.slots[victim];
                tracing::warn!(
                    "Voice pool full ({} voices), stealing {} from {:?}",
                    self.slots.len(),
                    slot.voice,
                    slot.owner
                );
                self.reclaim_index(victim, backend, fades);
            }
        }

        let index = match self.free.pop() {
            Some(index) => match backend.rebind(self.slots[index].voice, request.clip, spatial) {
                Ok(()) => index,
                Err(err) => {
                    let voice = self.slots[index].voice;
                    tracing::warn!("Failed to rebind {}, replacing it: {}", voice, err);
                    backend.release(voice);
                    self.dead.push(index);
                    self.allocate_slot(backend, request.clip, spatial)?
                }
            },
            None => self.allocate_slot(backend, request.clip, spatial)?,
        };

        self.spawn_seq += 1;
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = SlotState::Bound;
        slot.player = Some(request.owner.player);
        slot.owner = Some(request.owner);
        slot.clip_length = request.clip.duration();
        slot.starts_at = now + request.delay;
        slot.expires_at = request.lifetime.map(|lifetime| now + lifetime);
        slot.spawned = self.spawn_seq;
        slot.last_position = spatial;
        slot.anchor = request.anchor;
        slot.volume = 0.0;
        slot.pitch_draw = 0.0;

        tracing::debug!(
            "Spawned {} for {:?} (`{}`, lifetime {:?})",
            slot.voice,
            request.owner,
            request.clip.name(),
            request.lifetime
        );
        Ok(VoiceKey::new(index, slot.generation))
    }

    /// New backend voice, refilling a dead slot before growing the pool
    fn allocate_slot<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        clip: &Arc<AudioClip>,
        spatial: Option<Position>,
    ) -> Result<usize, BackendError> {
        let voice = backend.allocate(clip, spatial)?;
        match self.dead.pop() {
            Some(index) => {
                self.slots[index].voice = voice;
                Ok(index)
            }
            None => {
                self.slots.push(VoiceSlot::new(voice));
                Ok(self.slots.len() - 1)
            }
        }
    }

    fn slot(&self, key: VoiceKey) -> Option<&VoiceSlot> {
        self.slots
            .get(key.index)
            .filter(|s| s.generation == key.generation && s.state != SlotState::Free)
    }

    fn slot_mut(&mut self, key: VoiceKey) -> Option<&mut VoiceSlot> {
        self.slots
            .get_mut(key.index)
            .filter(|s| s.generation == key.generation && s.state != SlotState::Free)
    }

    /// Whether `key` is still bound to `owner`
    pub fn is_bound(&self, key: VoiceKey, owner: HandleKey) -> bool {
        self.slot(key)
            .is_some_and(|s| s.state == SlotState::Bound && s.owner == Some(owner))
    }

    pub fn state(&self, key: VoiceKey) -> SlotState {
        self.slot(key).map(|s| s.state).unwrap_or(SlotState::Free)
    }

    pub fn voice(&self, key: VoiceKey) -> Option<VoiceRef> {
        self.slot(key).map(|s| s.voice)
    }

    pub fn has_started(&self, key: VoiceKey, now: Duration) -> bool {
        self.slot(key).is_some_and(|s| now >= s.starts_at)
    }

    /// Last volume the engine configured (not the fade's momentary value)
    pub fn volume(&self, key: VoiceKey) -> Option<f32> {
        self.slot(key).map(|s| s.volume)
    }

    pub fn note_volume(&mut self, key: VoiceKey, volume: f32) {
        if let Some(slot) = self.slot_mut(key) {
            slot.volume = volume;
        }
    }

    /// Spawn-time random draw in [0, 1] used to place pitch inside the range
    pub fn pitch_draw(&self, key: VoiceKey) -> Option<f32> {
        self.slot(key).map(|s| s.pitch_draw)
    }

    pub fn note_pitch_draw(&mut self, key: VoiceKey, draw: f32) {
        if let Some(slot) = self.slot_mut(key) {
            slot.pitch_draw = draw;
        }
    }

    pub fn expires_at(&self, key: VoiceKey) -> Option<Duration> {
        self.slot(key).and_then(|s| s.expires_at)
    }

    /// Switch a live voice between looping and one-shot.
    ///
    /// A one-shot voice expires at the end of the pass it is currently in.
    pub fn set_looping(&mut self, key: VoiceKey, looping: bool, now: Duration) {
        let Some(slot) = self.slot_mut(key) else {
            return;
        };
        if looping {
            slot.expires_at = None;
            return;
        }

        let length = slot.clip_length.as_secs_f64();
        slot.expires_at = Some(if now < slot.starts_at {
            slot.starts_at + slot.clip_length
        } else if length <= 0.0 {
            now
        } else {
            let into_pass = (now - slot.starts_at).as_secs_f64() % length;
            now + Duration::from_secs_f64(length - into_pass)
        });
    }

    /// Unbind the handle while leaving the voice audible (fading out).
    /// Returns false for stale keys.
    pub fn detach(&mut self, key: VoiceKey) -> bool {
        match self.slot_mut(key) {
            Some(slot) => {
                slot.owner = None;
                slot.state = SlotState::Releasing;
                true
            }
            None => false,
        }
    }

    /// Stop the voice and put it on the free list. Stale keys are ignored.
    pub fn reclaim<B: VoiceBackend + ?Sized>(
        &mut self,
        key: VoiceKey,
        backend: &mut B,
        fades: &mut FadeController,
    ) -> Option<Reclaimed> {
        self.slot(key)?;
        Some(self.reclaim_index(key.index, backend, fades))
    }

    fn reclaim_index<B: VoiceBackend + ?Sized>(
        &mut self,
        index: usize,
        backend: &mut B,
        fades: &mut FadeController,
    ) -> Reclaimed {
        let slot = &mut self.slots[index];
        let key = VoiceKey::new(index, slot.generation);

        backend.stop(slot.voice);
        fades.cancel(key);

        let player = slot.player.take();
        let owner = slot.owner.take();
        slot.state = SlotState::Free;
        slot.anchor = Anchor::Flat;
        slot.expires_at = None;
        self.free.push(index);

        tracing::debug!("Reclaimed {} (owner {:?})", slot.voice, owner);
        Reclaimed {
            key,
            voice: slot.voice,
            player,
            owner,
        }
    }

    /// Reclaim expired or finished voices and move tracked voices
    pub fn update<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        fades: &mut FadeController,
        now: Duration,
    ) -> Vec<Reclaimed> {
        let mut reclaimed = Vec::new();

        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            if slot.state == SlotState::Free {
                continue;
            }

            let expired = slot.expires_at.is_some_and(|at| now >= at);
            let finished = now >= slot.starts_at && !backend.is_alive(slot.voice);
            if expired || finished {
                reclaimed.push(self.reclaim_index(index, backend, fades));
                continue;
            }

            if let Anchor::Tracking(target) = &slot.anchor {
                let position = target.position();
                if slot.last_position != Some(position) {
                    backend.set_position(slot.voice, position);
                    slot.last_position = Some(position);
                }
            }
        }

        reclaimed
    }

    /// Reclaim every active voice
    pub fn reclaim_all<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        fades: &mut FadeController,
    ) -> Vec<Reclaimed> {
        (0..self.slots.len())
            .filter(|&i| self.slots[i].state != SlotState::Free)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|i| self.reclaim_index(i, backend, fades))
            .collect()
    }

    /// Destroy every voice; the pool is empty afterwards
    pub fn release_all<B: VoiceBackend + ?Sized>(&mut self, backend: &mut B, fades: &mut FadeController) {
        self.reclaim_all(backend, fades);
        for (index, slot) in self.slots.drain(..).enumerate() {
            if !self.dead.contains(&index) {
                backend.release(slot.voice);
            }
        }
        self.free.clear();
        self.dead.clear();
    }

    /// Bound or releasing voices
    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len() - self.dead.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Physical voices owned, free or not
    pub fn len(&self) -> usize {
        self.slots.len() - self.dead.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.slots.len() >= cap)
    }

    /// Prefer a voice already fading out, then the oldest bound one
    fn steal_candidate(&self) -> Option<usize> {
        let oldest = |state: SlotState| {
            self.slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.state == state)
                .min_by_key(|(_, s)| s.spawned)
                .map(|(i, _)| i)
        };
        oldest(SlotState::Releasing).or_else(|| oldest(SlotState::Bound))
    }
}
