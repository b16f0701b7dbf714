/// Playback handles
///
/// A handle is a plain value naming one `play` call. It stays valid to hold
/// after playback ends; it just stops reporting as playing.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::AudioContext;
use super::player::AudioPlayer;
use crate::backend::VoiceBackend;

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one `AudioPlayer` instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub(crate) fn next() -> Self {
        PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Owner and id of a handle, used as the voice binding in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleKey {
    pub player: PlayerId,
    pub id: u64,
}

/// One in-flight play request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle {
    player: PlayerId,
    id: u64,
    clip_index: usize,
}

impl AudioHandle {
    pub(crate) fn new(player: PlayerId, id: u64, clip_index: usize) -> Self {
        Self {
            player,
            id,
            clip_index,
        }
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn clip_index(&self) -> usize {
        self.clip_index
    }

    pub fn key(&self) -> HandleKey {
        HandleKey {
            player: self.player,
            id: self.id,
        }
    }

    /// Whether this handle is still logically playing on `player`.
    ///
    /// False when `player` is not the owner.
    pub fn is_playing<B: VoiceBackend>(&self, player: &AudioPlayer, ctx: &AudioContext<B>) -> bool {
        player.id() == self.player && player.is_playing(self.id, ctx)
    }

    /// Stop with the owner's interrupt fade time. No-op on a foreign player
    /// or a handle that already ended.
    pub fn stop<B: VoiceBackend>(&self, player: &mut AudioPlayer, ctx: &mut AudioContext<B>) -> bool {
        if player.id() != self.player {
            return false;
        }
        let fade = player.interrupt_fade();
        player.stop(ctx, self.id, fade)
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (clip {})", self.player, self.id, self.clip_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_ids_are_unique() {
        let a = PlayerId::next();
        let b = PlayerId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_handle_accessors() {
        let handle = AudioHandle::new(PlayerId(4), 9, 2);
        assert_eq!(handle.player(), PlayerId(4));
        assert_eq!(handle.id(), 9);
        assert_eq!(handle.clip_index(), 2);
        assert_eq!(
            handle.key(),
            HandleKey {
                player: PlayerId(4),
                id: 9
            }
        );
        assert_eq!(handle.to_string(), "player#4/9 (clip 2)");
    }
}
