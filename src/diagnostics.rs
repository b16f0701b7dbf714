/// Playback monitor
///
/// Tooling view over the event bus: the last handle each player produced,
/// every save-key conflict seen, and running counters. Polled by its owner,
/// so it can live on any thread.
use std::collections::HashMap;

use crossbeam_channel::Receiver;

use crate::audio_system::{AudioContext, AudioHandle, AudioPlayer, PlayerId};
use crate::backend::VoiceBackend;
use crate::error::SaveKeyConflict;
use crate::messaging::{EventBus, PlaybackEvent, SubscriberId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub played: u64,
    pub stopped: u64,
    /// Voices returned to the pool for any reason
    pub reclaimed: u64,
    /// Reclaimed while their handle was still live (natural end or stolen)
    pub ended: u64,
}

pub struct PlaybackMonitor {
    bus: EventBus,
    subscription: SubscriberId,
    events: Receiver<PlaybackEvent>,
    last_played: HashMap<PlayerId, AudioHandle>,
    conflicts: Vec<(PlayerId, SaveKeyConflict)>,
    stats: MonitorStats,
}

impl PlaybackMonitor {
    pub fn attach(bus: &EventBus) -> Self {
        let (events, subscription) = bus.subscribe();
        Self {
            bus: bus.clone(),
            subscription,
            events,
            last_played: HashMap::new(),
            conflicts: Vec::new(),
            stats: MonitorStats::default(),
        }
    }

    /// Drain pending events. Returns how many were processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events.try_recv() {
            self.record(event);
            processed += 1;
        }
        processed
    }

    fn record(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Played { handle, .. } => {
                self.stats.played += 1;
                self.last_played.insert(handle.player(), handle);
            }
            PlaybackEvent::Stopped { .. } => self.stats.stopped += 1,
            PlaybackEvent::Reclaimed { owner, .. } => {
                self.stats.reclaimed += 1;
                if owner.is_some() {
                    self.stats.ended += 1;
                }
            }
            PlaybackEvent::SaveKeyReassigned { player, conflict } => {
                self.conflicts.push((player, conflict));
            }
        }
    }

    pub fn last_played(&self, player: PlayerId) -> Option<AudioHandle> {
        self.last_played.get(&player).copied()
    }

    /// Stop the most recent playback of `player` if it is still going
    pub fn stop_last_played<B: VoiceBackend>(
        &mut self,
        player: &mut AudioPlayer,
        ctx: &mut AudioContext<B>,
    ) -> bool {
        self.poll();
        match self.last_played(player.id()) {
            Some(handle) if handle.is_playing(player, ctx) => handle.stop(player, ctx),
            _ => false,
        }
    }

    pub fn conflicts(&self) -> &[(PlayerId, SaveKeyConflict)] {
        &self.conflicts
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }
}

impl Drop for PlaybackMonitor {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{PlayOptions, PlayerSettings};
    use crate::backend::RecordingBackend;
    use crate::clip::AudioClip;
    use std::sync::Arc;
    use std::time::Duration;

    fn player() -> AudioPlayer {
        let clip = Arc::new(AudioClip::silent("a", Duration::from_secs(1)));
        AudioPlayer::new("p", PlayerSettings::default(), vec![Some(clip)])
    }

    #[test]
    fn test_tracks_last_played() {
        let mut ctx = AudioContext::new(RecordingBackend::new()).with_seed(1);
        let mut monitor = PlaybackMonitor::attach(ctx.events());
        let mut player = player();

        player.play(&mut ctx, 0usize, PlayOptions::new()).unwrap();
        let second = player.play(&mut ctx, 0usize, PlayOptions::new()).unwrap();

        assert_eq!(monitor.poll(), 2);
        assert_eq!(monitor.last_played(player.id()), Some(second));
        assert_eq!(monitor.stats().played, 2);
    }

    #[test]
    fn test_counts_natural_endings() {
        let mut ctx = AudioContext::new(RecordingBackend::new()).with_seed(1);
        let mut monitor = PlaybackMonitor::attach(ctx.events());
        let mut player = player();

        player.play(&mut ctx, 0usize, PlayOptions::new()).unwrap();
        ctx.update(Duration::from_secs(2));
        monitor.poll();

        assert_eq!(monitor.stats().reclaimed, 1);
        assert_eq!(monitor.stats().ended, 1);
    }

    #[test]
    fn test_stop_last_played() {
        let mut ctx = AudioContext::new(RecordingBackend::new()).with_seed(1);
        let mut monitor = PlaybackMonitor::attach(ctx.events());
        let mut player = player();
        let handle = player.play(&mut ctx, 0usize, PlayOptions::new()).unwrap();

        assert!(monitor.stop_last_played(&mut player, &mut ctx));
        assert!(!handle.is_playing(&player, &ctx));
        assert!(!monitor.stop_last_played(&mut player, &mut ctx));
    }

    #[test]
    fn test_records_conflicts() {
        let mut ctx = AudioContext::new(RecordingBackend::new()).with_seed(1);
        let mut monitor = PlaybackMonitor::attach(ctx.events());
        let settings = PlayerSettings {
            save_key: 5,
            ..PlayerSettings::default()
        };
        let mut a = AudioPlayer::new("a", settings.clone(), Vec::new());
        let mut b = AudioPlayer::new("b", settings, Vec::new());

        a.enable(&mut ctx);
        b.enable(&mut ctx);
        monitor.poll();

        assert_eq!(monitor.conflicts().len(), 1);
        assert_eq!(monitor.conflicts()[0].0, b.id());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let monitor = PlaybackMonitor::attach(&bus);
        assert_eq!(bus.subscriber_count(), 1);
        drop(monitor);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
